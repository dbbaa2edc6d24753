use super::OmmClient;
use crate::core::errors::OmmError;
use crate::core::kernel::router::HandlerId;
use crate::core::types::EventType;
use crate::messages::{Event, EventMessage, Subscribe, SubscribeCmd, SubscribeResp};
use tokio::sync::mpsc;
use tracing::instrument;

impl OmmClient {
    /// Send a `Subscribe` carrying one or more commands.
    ///
    /// Filters such as `ppn="-1"` or `trigger="*"` go to the controller as
    /// given.
    #[instrument(skip(self, subscribe), fields(commands = subscribe.commands.len()))]
    pub async fn subscribe(&self, subscribe: &Subscribe) -> Result<SubscribeResp, OmmError> {
        self.send(subscribe).await
    }

    pub async fn subscribe_event(&self, event_type: EventType) -> Result<SubscribeResp, OmmError> {
        self.subscribe(&SubscribeCmd::on(event_type).into()).await
    }

    pub async fn unsubscribe_event(&self, event_type: EventType) -> Result<SubscribeResp, OmmError> {
        self.subscribe(&SubscribeCmd::off(event_type).into()).await
    }

    /// Register a handler for one concrete event type.
    ///
    /// Handlers run on the read loop in registration order; an error or a
    /// panic is logged and does not reach later handlers.
    pub fn on_event<E, F>(&self, handler: F) -> HandlerId
    where
        E: EventMessage,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.connection
            .router()
            .subscribe(E::KIND, move |event: &Event| match E::from_event(event) {
                Some(event) => handler(event),
                None => Ok(()),
            })
    }

    /// Register a handler receiving the event union for one kind.
    pub fn on_event_kind<F>(&self, kind: EventType, handler: F) -> HandlerId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.connection.router().subscribe(kind, handler)
    }

    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.connection.router().unsubscribe(id)
    }

    /// Events of one kind as a channel.
    ///
    /// The subscription ends when the receiver is dropped. Events that find
    /// the channel full are dropped with a warning.
    pub fn event_stream(&self, kind: EventType) -> mpsc::Receiver<Event> {
        let capacity = self.connection.config().event_channel_capacity;
        let (_, receiver) = self.connection.router().channel(kind, capacity);
        receiver
    }
}
