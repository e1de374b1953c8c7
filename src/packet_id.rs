//! Packet-id allocation (spec.md §4.E): a rotating counter over
//! `1..=65535` that skips ids currently bound to an operation. Exhaustion
//! is a fatal, engine-halting condition, not an `Option::None` a caller
//! can route around — it means all 65535 ids are simultaneously in
//! flight, an invariant breach (spec.md §3 invariant 4).

use std::collections::HashSet;

use crate::error::Error;
use crate::types::Pid;

#[derive(Debug, Default)]
pub struct PacketIdAllocator {
    bound: HashSet<u16>,
    next: u16,
}

impl PacketIdAllocator {
    pub fn new() -> Self {
        PacketIdAllocator {
            bound: HashSet::new(),
            next: 0,
        }
    }

    /// Allocate and bind the next free id. Errors only when every id in
    /// `1..=65535` is already bound.
    pub fn allocate(&mut self) -> Result<Pid, Error> {
        if self.bound.len() >= u16::MAX as usize {
            return Err(Error::PacketIdsExhausted);
        }
        loop {
            self.next = self.next.wrapping_add(1);
            if self.next == 0 {
                self.next = 1;
            }
            if self.bound.insert(self.next) {
                return Pid::try_from(self.next);
            }
        }
    }

    pub fn bind(&mut self, pid: Pid) {
        self.bound.insert(pid.value());
    }

    pub fn release(&mut self, pid: Pid) {
        self.bound.remove(&pid.value());
    }

    pub fn is_bound(&self, pid: Pid) -> bool {
        self.bound.contains(&pid.value())
    }

    pub fn clear(&mut self) {
        self.bound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_skipping_bound_ids() {
        let mut alloc = PacketIdAllocator::new();
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        assert_ne!(a, b);
        alloc.release(a);
        let c = alloc.allocate().unwrap();
        assert_ne!(c, b);
    }

    #[test]
    fn exhaustion_is_an_error() {
        let mut alloc = PacketIdAllocator::new();
        for _ in 0..u16::MAX {
            alloc.allocate().unwrap();
        }
        assert!(alloc.allocate().is_err());
    }
}
