//! An [`Operation`] is the engine's unit of work (spec.md §3): one
//! submitted packet, tracked from submission through completion or
//! failure. `OfflineQueuePolicy` governs what survives a disconnect.

use crate::contract::ResultSink;
use crate::packet::internal::{Packet, PacketType};
use crate::types::Pid;

/// What happens to a not-yet-acked operation when the transport closes
/// (spec.md §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfflineQueuePolicy {
    PreserveNothing,
    FailNonQos1PublishOnDisconnect,
    /// Default. `PreserveAcknowledged` in the distilled spec names the same
    /// behavior; we don't carry a separate variant for it.
    #[default]
    FailQos0PublishOnDisconnect,
    PreserveAll,
}

impl OfflineQueuePolicy {
    /// Whether a QoS 0 publish that hasn't left the engine yet survives a
    /// disconnect.
    pub fn keeps_qos0_publish(self) -> bool {
        matches!(self, OfflineQueuePolicy::PreserveAll)
    }

    /// Whether a QoS ≥ 1 publish that hasn't left the engine yet survives.
    pub fn keeps_qos_ge1_publish(self) -> bool {
        !matches!(self, OfflineQueuePolicy::PreserveNothing)
    }

    /// Whether a Subscribe/Unsubscribe that hasn't left the engine yet
    /// survives.
    pub fn keeps_subscribe(self) -> bool {
        !matches!(
            self,
            OfflineQueuePolicy::PreserveNothing | OfflineQueuePolicy::FailNonQos1PublishOnDisconnect
        )
    }
}

/// The engine's unit of work: one submitted operation, from queueing
/// through completion.
pub struct Operation {
    pub op_id: u64,
    pub packet_type: PacketType,
    pub packet: Packet,
    pub pid: Option<Pid>,
    pub num_attempts: u32,
    pub flush_timepoint: Option<u64>,
    pub timeout_at: Option<u64>,
    pub sink: Option<ResultSink>,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("op_id", &self.op_id)
            .field("packet_type", &self.packet_type)
            .field("pid", &self.pid)
            .field("num_attempts", &self.num_attempts)
            .finish()
    }
}

impl Operation {
    pub fn new(op_id: u64, packet: Packet, sink: Option<ResultSink>) -> Self {
        Operation {
            op_id,
            packet_type: packet.packet_type(),
            packet,
            pid: None,
            num_attempts: 0,
            flush_timepoint: None,
            timeout_at: None,
            sink,
        }
    }

    /// Complete this operation, consuming it: calls the sink if one was
    /// registered (resubmitted/synthesized operations like an
    /// engine-issued Puback have none).
    pub fn complete(self, result: Result<Option<Packet>, crate::error::ValidationError>) {
        if let Some(sink) = self.sink {
            sink(result);
        }
    }

    pub fn mark_duplicate(&mut self) {
        if let Packet::Publish(p) = &mut self.packet {
            p.dup = true;
        }
    }
}
