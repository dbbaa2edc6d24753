use crate::core::errors::OmmError;
use crate::core::kernel::codec::{Element, WireElement};
use crate::core::kernel::correlator::Correlator;
use crate::core::kernel::framer::FrameReader;
use crate::core::kernel::router::EventRouter;
use crate::core::kernel::session::{ServerIdentity, Session, SessionState};
use crate::core::kernel::transport::{BoxedStream, ConnectionConfig, Connector, DOCUMENT_TERMINATOR};
use crate::messages::response::SEQ_ATTR;
use crate::messages::{Event, Open, OpenResp, Ping, PingResp, Request, Response};
use crate::utils::rtt::{RttEstimator, RttSnapshot};
use parking_lot::Mutex;
use std::future::{pending, Future};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Default)]
struct Tasks {
    reader: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(keepalive) = self.keepalive.take() {
            keepalive.abort();
        }
    }
}

/// The connection engine: one stream, one read loop, serialized writes.
///
/// The read loop owns the inbound half and feeds documents to the correlator
/// or the event router. Callers share the outbound half through an async
/// mutex so each document reaches the wire whole.
pub struct Connection {
    config: ConnectionConfig,
    session: Arc<Session>,
    correlator: Arc<Correlator<Response>>,
    router: Arc<EventRouter<Event>>,
    writer: tokio::sync::Mutex<Option<WriteHalf<BoxedStream>>>,
    tasks: Mutex<Tasks>,
    rtt: Mutex<RttEstimator>,
    endpoint: Mutex<String>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            session: Arc::new(Session::new()),
            correlator: Correlator::new(),
            router: Arc::new(EventRouter::new()),
            writer: tokio::sync::Mutex::new(None),
            tasks: Mutex::new(Tasks::default()),
            rtt: Mutex::new(RttEstimator::new()),
            endpoint: Mutex::new(String::new()),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn router(&self) -> &EventRouter<Event> {
        &self.router
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn endpoint(&self) -> String {
        self.endpoint.lock().clone()
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    pub fn rtt(&self) -> Option<RttSnapshot> {
        self.rtt.lock().snapshot()
    }

    /// Open a transport through `connector` and start reading from it.
    #[instrument(skip(self, connector), fields(endpoint = %connector.endpoint()))]
    pub async fn connect(self: &Arc<Self>, connector: &dyn Connector) -> Result<(), OmmError> {
        self.session.begin()?;
        let stream = match connector.connect().await {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "transport connect failed");
                self.session.fault(e.to_string());
                return Err(e);
            }
        };
        self.start(stream, connector.endpoint()).await
    }

    /// Run over an already established stream.
    pub async fn attach(
        self: &Arc<Self>,
        stream: BoxedStream,
        endpoint: impl Into<String>,
    ) -> Result<(), OmmError> {
        self.session.begin()?;
        self.start(stream, endpoint.into()).await
    }

    async fn start(self: &Arc<Self>, stream: BoxedStream, endpoint: String) -> Result<(), OmmError> {
        self.tasks.lock().abort_all();
        self.correlator.reopen();
        self.rtt.lock().reset();

        let (reader, writer) = tokio::io::split(stream);
        *self.writer.lock().await = Some(writer);

        let reader_task = tokio::spawn(read_loop(
            reader,
            self.config.max_document_bytes,
            Arc::clone(&self.session),
            Arc::clone(&self.correlator),
            Arc::clone(&self.router),
        ));
        self.tasks.lock().reader = Some(reader_task);

        self.session.transition(SessionState::AwaitingAuth, "connect")?;
        info!(endpoint = %endpoint, "connected to controller");
        *self.endpoint.lock() = endpoint;
        Ok(())
    }

    /// Send the login request and record the server identity.
    ///
    /// A rejection faults the session and surfaces as [`OmmError::LoginFailed`].
    #[instrument(skip(self, open), fields(username = %open.username))]
    pub async fn handshake(self: &Arc<Self>, open: &Open) -> Result<OpenResp, OmmError> {
        self.session.require(SessionState::AwaitingAuth, "login")?;

        let result = self
            .round_trip(open, self.config.request_timeout(), pending())
            .await
            .and_then(Response::into_message::<OpenResp>);

        match result {
            Ok(resp) => {
                self.session.authenticate(ServerIdentity::from(resp.clone()))?;
                self.start_keepalive();
                Ok(resp)
            }
            Err(OmmError::ProtocolError { code, info }) => {
                warn!(code = %code, "login rejected by controller");
                let reason = format!("login rejected: {}", code);
                self.session.fault(reason.as_str());
                self.release(&reason).await;
                Err(OmmError::LoginFailed { code, info })
            }
            Err(e) => {
                if e.is_fatal() {
                    self.session.fault(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Send an authenticated request and wait for its response.
    pub async fn call<R: Request>(&self, request: &R) -> Result<R::Response, OmmError> {
        self.call_with_timeout(request, self.config.request_timeout())
            .await
    }

    #[instrument(skip(self, request), fields(request = R::TAG))]
    pub async fn call_with_timeout<R: Request>(
        &self,
        request: &R,
        timeout: Duration,
    ) -> Result<R::Response, OmmError> {
        self.session.require(SessionState::Authenticated, R::TAG)?;
        self.round_trip(request, timeout, pending()).await?.into_message()
    }

    /// Like [`call`](Self::call), but gives up with [`OmmError::Cancelled`]
    /// as soon as `cancel` completes. A late response is discarded.
    #[instrument(skip(self, request, cancel), fields(request = R::TAG))]
    pub async fn call_until<R, C>(&self, request: &R, cancel: C) -> Result<R::Response, OmmError>
    where
        R: Request,
        C: Future<Output = ()>,
    {
        self.session.require(SessionState::Authenticated, R::TAG)?;
        self.round_trip(request, self.config.request_timeout(), cancel)
            .await?
            .into_message()
    }

    async fn round_trip<R: Request>(
        &self,
        request: &R,
        timeout: Duration,
        cancel: impl Future<Output = ()>,
    ) -> Result<Response, OmmError> {
        let expected = <R::Response as WireElement>::TAG;
        let mut handle = self.correlator.register(expected)?;
        let seq = handle.seq();

        let mut element = request.to_element();
        element.set_attr(SEQ_ATTR, seq.to_string());
        let document = element.to_xml()?;

        trace!(seq, tag = R::TAG, "sending request");
        self.write_document(&document).await?;

        tokio::select! {
            outcome = tokio::time::timeout(timeout, &mut handle) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    warn!(seq, expected, ?timeout, "request timed out");
                    Err(OmmError::Timeout(timeout))
                }
            },
            () = cancel => {
                handle.cancel();
                handle.await
            }
        }
    }

    async fn write_document(&self, document: &str) -> Result<(), OmmError> {
        let mut frame = Vec::with_capacity(document.len() + 1);
        frame.extend_from_slice(document.as_bytes());
        frame.push(DOCUMENT_TERMINATOR);

        let mut writer = self.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            return Err(OmmError::ConnectionLost("not connected".to_string()));
        };

        let written = async {
            stream.write_all(&frame).await?;
            stream.flush().await
        }
        .await;

        if let Err(e) = written {
            error!(error = %e, "write to controller failed");
            let reason = format!("write failed: {}", e);
            self.session.fault(reason.as_str());
            self.correlator.fail_all(&reason);
            writer.take();
            return Err(OmmError::NetworkError(reason));
        }
        Ok(())
    }

    /// Liveness check; returns the measured round trip.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<Duration, OmmError> {
        let started = Instant::now();
        let _: PingResp = self.call(&Ping::now()).await?;
        let elapsed = started.elapsed();

        let smoothed = self.rtt.lock().record(elapsed);
        self.session.record_rtt(smoothed);
        debug!(?elapsed, ?smoothed, "ping answered");
        Ok(elapsed)
    }

    fn start_keepalive(self: &Arc<Self>) {
        let Some(interval) = self.config.keepalive_interval() else {
            return;
        };
        let connection = Arc::downgrade(self);
        let task = tokio::spawn(keepalive_loop(connection, interval));
        if let Some(previous) = self.tasks.lock().keepalive.replace(task) {
            previous.abort();
        }
    }

    /// Release the transport and fail every pending request.
    ///
    /// Calling it again, or on a connection that never opened, is a no-op.
    #[instrument(skip(self), fields(endpoint = %self.endpoint()))]
    pub async fn close(&self) -> Result<(), OmmError> {
        match self.session.state() {
            SessionState::Disconnected | SessionState::Closing => return Ok(()),
            SessionState::Faulted => {
                self.release("connection closed").await;
                return Ok(());
            }
            _ => {}
        }

        if let Err(e) = self.session.transition(SessionState::Closing, "close") {
            return match self.session.state() {
                SessionState::Closing | SessionState::Disconnected | SessionState::Faulted => Ok(()),
                _ => Err(e),
            };
        }

        self.release("connection closed").await;
        self.session.transition(SessionState::Disconnected, "close")?;
        info!("connection closed");
        Ok(())
    }

    async fn release(&self, reason: &str) {
        self.tasks.lock().abort_all();
        let failed = self.correlator.fail_all(reason);
        if failed > 0 {
            debug!(failed, "failed pending requests on close");
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "transport shutdown failed");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.tasks.get_mut().abort_all();
    }
}

async fn keepalive_loop(connection: Weak<Connection>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(connection) = connection.upgrade() else {
            break;
        };
        if !connection.session.is_authenticated() {
            break;
        }
        if let Err(e) = connection.ping().await {
            warn!(error = %e, "keepalive ping failed");
            if e.is_fatal() {
                break;
            }
        }
    }
    trace!("keepalive stopped");
}

async fn read_loop(
    reader: ReadHalf<BoxedStream>,
    max_document_bytes: usize,
    session: Arc<Session>,
    correlator: Arc<Correlator<Response>>,
    router: Arc<EventRouter<Event>>,
) {
    let mut frames = FrameReader::new(reader, max_document_bytes);

    while let Some(next) = frames.next_document().await {
        match next {
            Ok(document) => dispatch_document(&document, &correlator, &router),
            Err(e) => {
                error!(error = %e, "connection read failed");
                let reason = e.to_string();
                session.fault(reason.as_str());
                correlator.fail_all(&reason);
                return;
            }
        }
    }

    match session.state() {
        SessionState::Closing | SessionState::Disconnected => {
            debug!("read loop finished");
        }
        _ => {
            warn!("controller closed the connection");
            session.fault("connection closed by controller");
        }
    }
    correlator.fail_all("connection closed by controller");
}

/// Route one inbound document to the event router or its pending request.
fn dispatch_document(
    document: &str,
    correlator: &Correlator<Response>,
    router: &EventRouter<Event>,
) {
    let element = match Element::parse(document) {
        Ok(element) => element,
        Err(e) => {
            match Response::peek_header(document) {
                Some((tag, seq)) if !Event::is_event_tag(tag) => {
                    warn!(?seq, tag, error = %e, "response does not parse");
                    correlator.resolve(seq, tag, Err(e.into()));
                }
                _ => warn!(error = %e, "discarding unparseable document"),
            }
            return;
        }
    };

    if Event::is_event_tag(&element.name) {
        match Event::decode(&element) {
            Ok(event) => {
                let delivered = router.dispatch(&event);
                trace!(tag = event.tag(), delivered, "event dispatched");
            }
            Err(e) => warn!(tag = %element.name, error = %e, "dropping event"),
        }
        return;
    }

    let seq = match Response::sequence_id(&element) {
        Ok(seq) => seq,
        Err(e) => {
            warn!(tag = %element.name, error = %e, "discarding response with invalid sequence id");
            return;
        }
    };
    let tag = Response::payload_tag(&element);
    let result = Response::decode_document(&element);
    if let Err(OmmError::DecodeError(e)) = &result {
        warn!(?seq, tag, error = %e, "response failed to decode");
    }
    trace!(?seq, tag, "response received");
    correlator.resolve(seq, tag, result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::DecodeError;
    use crate::core::kernel::router::RoutedEvent;
    use crate::core::types::EventType;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispatch_routes_events_and_responses() {
        let correlator = Correlator::<Response>::new();
        let router = EventRouter::<Event>::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        router.subscribe(EventType::DectSubscriptionMode, move |event: &Event| {
            assert_eq!(event.kind(), EventType::DectSubscriptionMode);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let handle = correlator.register("PingResp").unwrap();
        let seq = handle.seq();

        dispatch_document(
            r#"<EventDECTSubscriptionMode mode="Wildcard"/>"#,
            &correlator,
            &router,
        );
        dispatch_document(&format!(r#"<PingResp seq="{}"/>"#, seq), &correlator, &router);

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(matches!(
            handle.now_or_never(),
            Some(Ok(Response::Ping(PingResp { time_stamp: None })))
        ));
    }

    #[test]
    fn test_dispatch_survives_garbage() {
        let correlator = Correlator::<Response>::new();
        let router = EventRouter::<Event>::new();
        dispatch_document("<EventNobodyKnows/>", &correlator, &router);
        dispatch_document(r#"<PingResp seq="banana"/>"#, &correlator, &router);
        dispatch_document(r#"<PingResp seq="77"/>"#, &correlator, &router);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_unparseable_response_fails_its_request() {
        let correlator = Correlator::<Response>::new();
        let router = EventRouter::<Event>::new();
        let handle = correlator.register("PingResp").unwrap();

        let document = format!(r#"<PingResp seq="{}" timeStamp=5 />"#, handle.seq());
        dispatch_document(&document, &correlator, &router);

        assert_eq!(correlator.pending_count(), 0);
        assert!(matches!(
            handle.now_or_never(),
            Some(Err(OmmError::DecodeError(DecodeError::Malformed(_))))
        ));
    }

    #[tokio::test]
    async fn test_requests_are_gated_on_login() {
        let connection = Connection::new(ConnectionConfig::default());
        let err = connection.call(&Ping::default()).await.unwrap_err();
        assert!(matches!(
            err,
            OmmError::InvalidState {
                operation: "Ping",
                state: SessionState::Disconnected
            }
        ));
        let err = connection.handshake(&Open::new("omm", "omm")).await.unwrap_err();
        assert!(matches!(err, OmmError::InvalidState { operation: "login", .. }));
        assert!(connection.close().await.is_ok());
    }
}
