//! The seam between the request engine and whatever moves bytes.
//!
//! A [`TransportConnector`] performs one hop. It receives a [`HopRequest`]
//! and reports progress through an [`EventSink`]: timing checkpoints, the
//! response head, then either the complete raw body or a failure. The
//! engine runs each exchange as its own task inside an [`ActiveConnection`],
//! so tearing a hop down is a matter of dropping that connection.

use crate::base::neterror::NetError;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::response::ResponseHead;
use crate::http::timing::{now_ms, Checkpoint};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::Method;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Everything a transport needs to issue one hop.
#[derive(Debug, Clone)]
pub struct HopRequest {
    pub method: Method,
    pub url: Url,
    pub headers: OrderedHeaderMap,
    pub payload: Option<Bytes>,
}

/// Progress reported by a transport while it performs a hop.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A timing checkpoint, in milliseconds since the Unix epoch.
    Checkpoint(Checkpoint, f64),
    /// Status line and headers arrived.
    Headers(ResponseHead),
    /// The whole raw (still encoded) body arrived. Terminal.
    Complete(Bytes),
    /// The exchange failed. Terminal.
    Failed(NetError),
}

impl TransportEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Complete(_) | TransportEvent::Failed(_))
    }
}

/// Sending half of a hop's event channel.
///
/// Emitting after the engine has dropped the connection is a silent no-op.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl EventSink {
    /// A sink and the receiver it feeds.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn checkpoint(&self, checkpoint: Checkpoint) {
        self.emit(TransportEvent::Checkpoint(checkpoint, now_ms()));
    }

    pub fn headers(&self, head: ResponseHead) {
        self.emit(TransportEvent::Headers(head));
    }

    pub fn complete(&self, body: Bytes) {
        self.emit(TransportEvent::Complete(body));
    }

    pub fn fail(&self, error: NetError) {
        self.emit(TransportEvent::Failed(error));
    }

    pub fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(event);
    }
}

/// Performs the physical exchange of a hop.
///
/// Implementations must report through `events` in the order checkpoints,
/// headers, then exactly one of complete or failed. The returned future is
/// spawned by the engine and may be aborted at any await point.
pub trait TransportConnector: Send + Sync {
    fn exchange(&self, hop: HopRequest, events: EventSink) -> BoxFuture<'static, ()>;
}

/// The transport of the hop in flight, owned by exactly one hop.
pub struct ActiveConnection {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    task: Option<JoinHandle<()>>,
}

impl ActiveConnection {
    /// Start `hop` on `connector` in a task of its own.
    pub fn open(connector: &dyn TransportConnector, hop: HopRequest) -> Self {
        let (sink, rx) = EventSink::channel();
        let exchange = connector.exchange(hop, sink);
        Self {
            events: rx,
            task: Some(tokio::spawn(exchange)),
        }
    }

    /// Next event, or `None` once the transport went away without a
    /// terminal event.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Detach from the transport and drop its socket. Safe to call twice.
    pub fn destroy(&mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.destroy();
    }
}
