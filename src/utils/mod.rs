pub mod rtt;

pub use rtt::{format_us, RttEstimator, RttSnapshot};
