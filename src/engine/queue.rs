//! The three operation queues (spec.md §4.E) and their service priority:
//! high-priority > resubmit > user.

use std::collections::VecDeque;

use crate::operation::Operation;

#[derive(Debug, Default)]
pub struct OperationQueues {
    pub high_priority: VecDeque<Operation>,
    pub resubmit: VecDeque<Operation>,
    pub user: VecDeque<Operation>,
}

impl OperationQueues {
    pub fn new() -> Self {
        OperationQueues::default()
    }

    /// After a session-resuming reconnect, submission order must be
    /// preserved across retransmission (spec.md §4.E/§5).
    pub fn sort_resumed_queues_by_op_id(&mut self) {
        sort_by_op_id(&mut self.resubmit);
        sort_by_op_id(&mut self.user);
    }

    pub fn is_empty(&self) -> bool {
        self.high_priority.is_empty() && self.resubmit.is_empty() && self.user.is_empty()
    }
}

fn sort_by_op_id(queue: &mut VecDeque<Operation>) {
    let mut items: Vec<Operation> = queue.drain(..).collect();
    items.sort_by_key(|op| op.op_id);
    queue.extend(items);
}
