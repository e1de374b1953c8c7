//! The engine↔transport contract (spec.md §6): pure-data events the
//! adapter feeds in, and the pure-data results the engine hands back. The
//! adapter owns the socket, the timer, and the promise/future glue to
//! whatever async runtime it's embedded in; none of that lives here.

use bytes::Bytes;

use crate::error::ValidationError;
use crate::packet::internal::Packet;

/// A lifecycle event the transport reports to the engine.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// A fresh transport connection was established; `establishment_timeout_millis`
    /// bounds how long the engine waits for Connack before halting with
    /// [`crate::error::ErrorKind::Timeout`].
    ConnectionOpened {
        establishment_timeout_millis: u64,
    },
    ConnectionClosed,
    IncomingData(Bytes),
    WriteCompletion,
}

/// A user-submitted operation. Each carries the sink that receives its
/// eventual outcome, plus an optional timeout: when set, the operation is
/// inserted into the engine's timeout min-heap and fails with a timeout
/// error if it is still unresolved `timeout_millis` after submission
/// (spec.md §4.E).
pub enum UserEvent {
    Publish(Packet, ResultSink, Option<u64>),
    Subscribe(Packet, ResultSink, Option<u64>),
    Unsubscribe(Packet, ResultSink, Option<u64>),
    Disconnect(Packet, ResultSink, Option<u64>),
}

/// Called exactly once with the operation's outcome: the ack packet on
/// success (`None` for QoS 0 publishes and Disconnect, which carry no
/// ack), or the validation/timeout error that failed it. A plain `FnOnce`
/// stands in for the source contract's `{onSuccess, onFailure}` callback
/// pair — the engine is single-threaded and cooperative, so no `Send`
/// bound is needed.
pub type ResultSink = Box<dyn FnOnce(Result<Option<Packet>, ValidationError>)>;

/// The result of one `service` call: how many bytes of `buf` were filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceResult {
    pub bytes_written: usize,
}

/// A single-shot halt latch event, emitted once and never cleared until
/// the transport reopens and the engine is reset.
#[derive(Debug, Clone)]
pub struct Halted {
    pub kind: crate::error::ErrorKind,
    pub reason: String,
}
