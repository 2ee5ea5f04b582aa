//! Deferred log ring.
//!
//! Handlers must not block, so log lines are staged into a fixed-capacity
//! ring and drained later — at most one line per [`service`](LogRing::service)
//! call — through a non-blocking [`AsyncBus`] writer.  When the ring is
//! full, new lines are dropped and counted rather than stalling the
//! control loop.
//!
//! ```text
//!  handlers ──push──▶ [ line ring (LINES × LINE bytes) ] ──service──▶ UART
//! ```

use crate::hal::AsyncBus;

/// Fixed-capacity line ring drained through an [`AsyncBus`].
///
/// `LINE` is the maximum line length in bytes; longer lines are truncated
/// on a character boundary.  `LINES` is the ring depth.
pub struct LogRing<const LINE: usize, const LINES: usize> {
    lines: [heapless::String<LINE>; LINES],
    write_idx: usize,
    read_idx: usize,
    count: usize,
    dropped: u32,
}

impl<const LINE: usize, const LINES: usize> LogRing<LINE, LINES> {
    pub const fn new() -> Self {
        Self {
            lines: [const { heapless::String::new() }; LINES],
            write_idx: 0,
            read_idx: 0,
            count: 0,
            dropped: 0,
        }
    }

    /// Stage one line.  Truncates to `LINE` bytes; drops (and counts) when
    /// the ring is full.  Never blocks.
    pub fn push(&mut self, text: &str) {
        if self.count == LINES {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        let line = &mut self.lines[self.write_idx];
        line.clear();
        for c in text.chars() {
            if line.push(c).is_err() {
                break;
            }
        }
        self.write_idx = (self.write_idx + 1) % LINES;
        self.count += 1;
    }

    /// Drain at most one line through `bus`.  Call once per loop iteration.
    ///
    /// Does nothing while a previous write is still in flight.  If the bus
    /// refuses a write, the line stays queued and the write is aborted so
    /// the next call can retry cleanly.
    pub fn service(&mut self, bus: &mut impl AsyncBus) {
        if self.count == 0 || !bus.write_done() {
            return;
        }
        let line = &self.lines[self.read_idx];
        if bus.start_write(line.as_bytes()) {
            self.read_idx = (self.read_idx + 1) % LINES;
            self.count -= 1;
        } else {
            bus.abort_write();
        }
    }

    /// Lines currently queued.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Lines dropped because the ring was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<const LINE: usize, const LINES: usize> Default for LogRing<LINE, LINES> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Recording bus with controllable readiness.
    #[derive(Default)]
    struct MockBus {
        writes: Vec<Vec<u8>>,
        busy: bool,
        refuse: bool,
        aborts: usize,
    }

    impl AsyncBus for MockBus {
        fn write_done(&self) -> bool {
            !self.busy
        }

        fn start_write(&mut self, data: &[u8]) -> bool {
            if self.refuse {
                return false;
            }
            self.writes.push(data.to_vec());
            true
        }

        fn abort_write(&mut self) {
            self.aborts += 1;
        }
    }

    #[test]
    fn drains_one_line_per_service_in_fifo_order() {
        let mut ring = LogRing::<16, 4>::new();
        let mut bus = MockBus::default();
        ring.push("first");
        ring.push("second");

        ring.service(&mut bus);
        ring.service(&mut bus);
        ring.service(&mut bus); // empty — no-op

        assert_eq!(bus.writes.len(), 2);
        assert_eq!(bus.writes[0], b"first");
        assert_eq!(bus.writes[1], b"second");
        assert!(ring.is_empty());
    }

    #[test]
    fn busy_bus_defers_the_line() {
        let mut ring = LogRing::<16, 4>::new();
        let mut bus = MockBus {
            busy: true,
            ..Default::default()
        };
        ring.push("later");
        ring.service(&mut bus);
        assert!(bus.writes.is_empty());
        assert_eq!(ring.len(), 1);

        bus.busy = false;
        ring.service(&mut bus);
        assert_eq!(bus.writes.len(), 1);
    }

    #[test]
    fn refused_write_keeps_the_line_and_aborts() {
        let mut ring = LogRing::<16, 4>::new();
        let mut bus = MockBus {
            refuse: true,
            ..Default::default()
        };
        ring.push("sticky");
        ring.service(&mut bus);
        assert_eq!(ring.len(), 1);
        assert_eq!(bus.aborts, 1);

        bus.refuse = false;
        ring.service(&mut bus);
        assert_eq!(bus.writes[0], b"sticky");
        assert!(ring.is_empty());
    }

    #[test]
    fn overflow_drops_and_counts() {
        let mut ring = LogRing::<8, 2>::new();
        ring.push("one");
        ring.push("two");
        ring.push("three");
        ring.push("four");
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.dropped(), 2);
    }

    #[test]
    fn long_lines_truncate_on_char_boundary() {
        let mut ring = LogRing::<8, 2>::new();
        let mut bus = MockBus::default();
        ring.push("0123456789abcdef");
        ring.service(&mut bus);
        assert_eq!(bus.writes[0], b"01234567");

        // A multi-byte char that would straddle the limit is dropped whole.
        ring.push("1234567°");
        ring.service(&mut bus);
        assert_eq!(bus.writes[1], b"1234567");
    }

    #[test]
    fn ring_wraps_cleanly() {
        let mut ring = LogRing::<8, 2>::new();
        let mut bus = MockBus::default();
        for i in 0..6 {
            ring.push(&format!("l{i}"));
            ring.service(&mut bus);
        }
        let drained: Vec<&[u8]> = bus.writes.iter().map(|w| w.as_slice()).collect();
        let expected: Vec<&[u8]> = vec![b"l0", b"l1", b"l2", b"l3", b"l4", b"l5"];
        assert_eq!(drained, expected);
    }
}
