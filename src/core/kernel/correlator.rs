use crate::core::errors::OmmError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Identifies one outstanding request on a connection.
pub type SequenceId = u32;

/// Cancelled ids remembered so their late responses can be dropped quietly.
const MAX_REMEMBERED_CANCELLATIONS: usize = 1024;

struct PendingRequest<T> {
    expected: &'static str,
    tx: oneshot::Sender<Result<T, OmmError>>,
    submitted: Instant,
}

struct PendingTable<T> {
    next_seq: SequenceId,
    pending: HashMap<SequenceId, PendingRequest<T>>,
    cancelled: HashSet<SequenceId>,
    closed: Option<String>,
}

impl<T> PendingTable<T> {
    fn allocate(&mut self) -> SequenceId {
        loop {
            let seq = self.next_seq;
            self.next_seq = self.next_seq.wrapping_add(1).max(1);
            if !self.pending.contains_key(&seq) {
                self.cancelled.remove(&seq);
                return seq;
            }
        }
    }
}

/// What happened to an inbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Handed to the waiting caller
    Delivered(SequenceId),
    /// The request had been cancelled; dropped silently
    Discarded(SequenceId),
    /// No pending request matched; dropped with a warning
    Unmatched,
}

/// Matches inbound responses to the requests that solicited them.
///
/// All table mutations (insert on send, removal on resolution or
/// cancellation, and the sweep on disconnect) happen under one lock.
pub struct Correlator<T> {
    table: Mutex<PendingTable<T>>,
}

impl<T> Correlator<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            table: Mutex::new(PendingTable {
                next_seq: 1,
                pending: HashMap::new(),
                cancelled: HashSet::new(),
                closed: None,
            }),
        })
    }

    /// Allocate a sequence id and register a pending request expecting `expected`.
    pub fn register(
        self: &Arc<Self>,
        expected: &'static str,
    ) -> Result<ResponseHandle<T>, OmmError> {
        let (tx, rx) = oneshot::channel();
        let submitted = Instant::now();

        let seq = {
            let mut table = self.table.lock();
            if let Some(reason) = &table.closed {
                return Err(OmmError::ConnectionLost(reason.clone()));
            }
            let seq = table.allocate();
            table.pending.insert(
                seq,
                PendingRequest {
                    expected,
                    tx,
                    submitted,
                },
            );
            seq
        };

        trace!(seq, expected, "registered pending request");
        Ok(ResponseHandle {
            seq,
            submitted,
            rx,
            correlator: Arc::clone(self),
            done: false,
        })
    }

    /// Route a response to its pending request.
    ///
    /// Responses carrying no sequence id go to the oldest pending request
    /// expecting the same tag. A successful result whose tag differs from the
    /// one the request expects is delivered as
    /// [`OmmError::UnexpectedResponse`].
    pub fn resolve(
        &self,
        seq: Option<SequenceId>,
        tag: &str,
        result: Result<T, OmmError>,
    ) -> Resolution {
        let mut table = self.table.lock();

        let seq = match seq {
            Some(seq) => seq,
            None => {
                let oldest = table
                    .pending
                    .iter()
                    .filter(|(_, pending)| pending.expected == tag)
                    .min_by_key(|(_, pending)| pending.submitted)
                    .map(|(seq, _)| *seq);
                match oldest {
                    Some(seq) => seq,
                    None => {
                        drop(table);
                        warn!(tag, "response without sequence id matches no pending request");
                        return Resolution::Unmatched;
                    }
                }
            }
        };

        if let Some(pending) = table.pending.remove(&seq) {
            drop(table);
            let result = match result {
                Ok(_) if pending.expected != tag => {
                    warn!(
                        seq,
                        expected = pending.expected,
                        tag,
                        "response tag does not match its request"
                    );
                    Err(OmmError::UnexpectedResponse {
                        expected: pending.expected,
                        actual: tag.to_string(),
                    })
                }
                other => other,
            };
            trace!(
                seq,
                tag,
                elapsed_us = pending.submitted.elapsed().as_micros() as u64,
                "resolved pending request"
            );
            if pending.tx.send(result).is_err() {
                debug!(seq, "caller went away before its response arrived");
            }
            return Resolution::Delivered(seq);
        }

        if table.cancelled.remove(&seq) {
            drop(table);
            debug!(seq, tag, "dropping late response for cancelled request");
            return Resolution::Discarded(seq);
        }

        drop(table);
        warn!(seq, tag, "dropping response for unknown or already resolved sequence id");
        Resolution::Unmatched
    }

    /// Remove a pending request without touching the connection.
    ///
    /// A caller still waiting on the request receives [`OmmError::Cancelled`].
    pub fn cancel(&self, seq: SequenceId) -> bool {
        let pending = {
            let mut table = self.table.lock();
            let Some(pending) = table.pending.remove(&seq) else {
                return false;
            };
            if table.cancelled.len() >= MAX_REMEMBERED_CANCELLATIONS {
                table.cancelled.clear();
            }
            table.cancelled.insert(seq);
            pending
        };
        let _ = pending.tx.send(Err(OmmError::Cancelled));
        true
    }

    /// Fail every pending request and refuse new ones until `reopen`.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = {
            let mut table = self.table.lock();
            table.closed = Some(reason.to_string());
            table.cancelled.clear();
            table.pending.drain().collect()
        };

        let count = drained.len();
        for (seq, pending) in drained {
            trace!(seq, "failing pending request");
            let _ = pending
                .tx
                .send(Err(OmmError::ConnectionLost(reason.to_string())));
        }
        if count > 0 {
            debug!(count, reason, "failed all pending requests");
        }
        count
    }

    /// Accept registrations again after a fresh transport is attached.
    pub fn reopen(&self) {
        self.table.lock().closed = None;
    }

    pub fn pending_count(&self) -> usize {
        self.table.lock().pending.len()
    }
}

/// Resolves to the response for one request.
///
/// Dropping the handle before it resolves cancels the request, so wrapping it
/// in `tokio::time::timeout` gives deadline-triggered cancellation.
pub struct ResponseHandle<T> {
    seq: SequenceId,
    submitted: Instant,
    rx: oneshot::Receiver<Result<T, OmmError>>,
    correlator: Arc<Correlator<T>>,
    done: bool,
}

impl<T> ResponseHandle<T> {
    pub fn seq(&self) -> SequenceId {
        self.seq
    }

    pub fn submitted(&self) -> Instant {
        self.submitted
    }

    /// Abandon the request; a late response is discarded.
    ///
    /// Awaiting the handle afterwards yields [`OmmError::Cancelled`].
    pub fn cancel(&self) {
        if self.correlator.cancel(self.seq) {
            debug!(seq = self.seq, "request cancelled by caller");
        }
    }
}

impl<T> Future for ResponseHandle<T> {
    type Output = Result<T, OmmError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(received) => {
                this.done = true;
                Poll::Ready(received.unwrap_or_else(|_| {
                    Err(OmmError::ConnectionLost(
                        "pending request dropped".to_string(),
                    ))
                }))
            }
        }
    }
}

impl<T> Drop for ResponseHandle<T> {
    fn drop(&mut self) {
        if !self.done && self.correlator.cancel(self.seq) {
            debug!(seq = self.seq, "request abandoned before its response arrived");
        }
    }
}
