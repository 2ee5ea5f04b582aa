//! Link supervisor — a derived machine over the [`fsm`](crate::fsm) engine.
//!
//! Sequences a transport session as an explicit state machine:
//!
//! ```text
//!  IDLE ──[Connect]──▶ CONNECTING ──[Data(Ack)]──▶ CONNECTED
//!                          │                           │
//!                   [Timeout: deadline]        [Timeout: heartbeat]
//!                          ▼                           ▼
//!                        FAULTED ◀──────[Fail]── any state
//! ```
//!
//! `Timeout` and `Data` are polled: every [`poll`](LinkMachine::poll) scans
//! the deadline/heartbeat window against the loop-supplied timestamp and
//! pops at most one inbound frame per scan.  Collaborator failures arrive
//! as the ordinary [`Fail`](LinkEvent::Fail) event, so fault handling
//! lives in the transition table like everything else.  Pairs without a
//! handler — stray data while idle, a connect request mid-session — fall
//! through to the fallback and are counted, not errored.

use heapless::Deque;
use log::{info, warn};

use crate::config::LinkConfig;
use crate::fsm::{Control, Dispatch, Fsm, Holds, Machine};

/// Inbound frame queue depth.
const INBOUND_CAP: usize = 8;
/// Frame payload capacity in bytes.
pub const FRAME_PAYLOAD_CAP: usize = 24;

crate::states! {
    /// Control-flow phases of a supervised link.
    pub enum LinkState {
        /// No session; waiting for a connect request.
        Idle,
        /// Connect sent; awaiting the peer's acknowledge before the
        /// configured deadline.
        Connecting,
        /// Session established; peer traffic feeds the heartbeat window.
        Connected,
        /// Absorbing failure state; only a reset leaves it.
        Faulted,
    }
}

/// Frame classification on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Peer acknowledged the session.
    Ack,
    /// Application payload.
    Telemetry,
}

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub seq: u8,
    pub payload: heapless::Vec<u8, FRAME_PAYLOAD_CAP>,
}

impl Frame {
    /// An acknowledge frame (no payload).
    pub fn ack(seq: u8) -> Self {
        Self {
            kind: FrameKind::Ack,
            seq,
            payload: heapless::Vec::new(),
        }
    }

    /// A telemetry frame carrying `payload` (truncated to capacity).
    pub fn telemetry(seq: u8, payload: &[u8]) -> Self {
        let mut buf = heapless::Vec::new();
        let take = payload.len().min(FRAME_PAYLOAD_CAP);
        // Capacity is checked above, extend cannot fail.
        let _ = buf.extend_from_slice(&payload[..take]);
        Self {
            kind: FrameKind::Telemetry,
            seq,
            payload: buf,
        }
    }
}

/// A collaborator failure, translated into an ordinary event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFault {
    /// The transport reported an unrecoverable I/O failure.
    Transport,
    /// The peer reset the session.
    PeerReset,
}

impl core::fmt::Display for LinkFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport failure"),
            Self::PeerReset => write!(f, "peer reset"),
        }
    }
}

crate::events! {
    /// Triggers the link machine reacts to.
    pub enum LinkEvent kinds LinkEventKind {
        /// Upper layer requested a session.
        Connect,
        /// A phase deadline or the heartbeat window elapsed.
        Timeout,
        /// An inbound frame is ready.
        Data(Frame),
        /// A collaborator failure.
        Fail(LinkFault),
        /// Upper layer tore the session down (also leaves `Faulted`).
        Reset,
    }
}

/// Diagnostic counters, readable at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Telemetry frames consumed while connected.
    pub frames_rx: u32,
    /// Acknowledge frames consumed.
    pub acks_rx: u32,
    /// Deadline/heartbeat expiries.
    pub timeouts: u32,
    /// Collaborator faults absorbed.
    pub faults: u32,
    /// Events that reached the fallback.
    pub unhandled_events: u32,
    /// Inbound frames dropped because the queue was full.
    pub dropped_frames: u32,
}

/// Machine logic: transition table, poll checks, fallback counter.
pub struct LinkLogic {
    config: LinkConfig,
    /// Timestamp supplied by the driver loop for the current poll pass.
    now_ms: u32,
    /// When the current phase (connecting/connected) started or last saw
    /// peer traffic.
    phase_since_ms: u32,
    inbound: Deque<Frame, INBOUND_CAP>,
    stats: LinkStats,
}

impl LinkLogic {
    fn new(config: LinkConfig) -> Self {
        Self {
            config,
            now_ms: 0,
            phase_since_ms: 0,
            inbound: Deque::new(),
            stats: LinkStats::default(),
        }
    }

    fn timeout_window(&self, state: &LinkState) -> Option<u32> {
        match state {
            LinkState::Connecting(_) => Some(self.config.connect_deadline_ms),
            LinkState::Connected(_) => Some(self.config.heartbeat_window_ms),
            _ => None,
        }
    }
}

impl Machine for LinkLogic {
    type State = LinkState;
    type Event = LinkEvent;

    // Deadlines are checked before queued data, so a frame that arrived
    // after the window closed cannot resurrect the session.
    const POLL: &'static [LinkEventKind] = &[LinkEventKind::Timeout, LinkEventKind::Data];

    fn on_event(&mut self, ctl: &mut Control<'_, LinkState>, event: &LinkEvent) -> Dispatch {
        let state = *ctl.state();
        match (state, event) {
            (LinkState::Idle(_), LinkEvent::Connect) => {
                self.phase_since_ms = self.now_ms;
                info!(
                    "link: connecting, {}ms deadline",
                    self.config.connect_deadline_ms
                );
                ctl.set_state::<Connecting>();
                Dispatch::Handled
            }

            (LinkState::Connecting(_), LinkEvent::Data(frame))
                if frame.kind == FrameKind::Ack =>
            {
                self.stats.acks_rx += 1;
                self.phase_since_ms = self.now_ms;
                info!("link: connected (ack seq={})", frame.seq);
                ctl.set_state::<Connected>();
                Dispatch::Handled
            }

            (LinkState::Connecting(_), LinkEvent::Timeout) => {
                self.stats.timeouts += 1;
                warn!(
                    "link: no ack within {}ms, faulting",
                    self.config.connect_deadline_ms
                );
                ctl.set_state::<Faulted>();
                Dispatch::Handled
            }

            (LinkState::Connected(_), LinkEvent::Data(frame)) => {
                // Any peer traffic (telemetry or a duplicate ack) feeds the
                // heartbeat window.
                match frame.kind {
                    FrameKind::Telemetry => self.stats.frames_rx += 1,
                    FrameKind::Ack => self.stats.acks_rx += 1,
                }
                self.phase_since_ms = self.now_ms;
                Dispatch::Handled
            }

            (LinkState::Connected(_), LinkEvent::Timeout) => {
                self.stats.timeouts += 1;
                warn!(
                    "link: peer silent for {}ms, faulting",
                    self.config.heartbeat_window_ms
                );
                ctl.set_state::<Faulted>();
                Dispatch::Handled
            }

            (_, LinkEvent::Fail(fault)) => {
                self.stats.faults += 1;
                warn!("link: fault: {fault}");
                ctl.set_state::<Faulted>();
                Dispatch::Handled
            }

            (LinkState::Connecting(_) | LinkState::Connected(_) | LinkState::Faulted(_), LinkEvent::Reset) => {
                self.inbound.clear();
                info!("link: reset to idle");
                ctl.set_state::<Idle>();
                Dispatch::Handled
            }

            // Sparse table: everything else (stray data while idle, a
            // connect mid-session, timeouts with no window armed) is
            // absorbed by the fallback.
            _ => Dispatch::Unhandled,
        }
    }

    fn check_event(&mut self, state: &LinkState, kind: LinkEventKind) -> Option<LinkEvent> {
        match kind {
            LinkEventKind::Timeout => {
                let window = self.timeout_window(state)?;
                if self.now_ms.wrapping_sub(self.phase_since_ms) >= window {
                    Some(LinkEvent::Timeout)
                } else {
                    None
                }
            }
            LinkEventKind::Data => self.inbound.pop_front().map(LinkEvent::Data),
            _ => None,
        }
    }

    fn on_unhandled(&mut self, _state: &LinkState, _event: &LinkEvent) {
        self.stats.unhandled_events += 1;
    }
}

/// The composed link supervisor: engine + logic + driving interface.
pub struct LinkMachine {
    fsm: Fsm<LinkLogic>,
}

impl LinkMachine {
    /// Build a supervisor in `Idle` with the given tunables.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            fsm: Fsm::new(LinkLogic::new(config), LinkState::from(Idle)),
        }
    }

    /// Driving entry point — call once per control-loop iteration with the
    /// current monotonic timestamp.
    pub fn poll(&mut self, now_ms: u32) {
        self.fsm.logic_mut().now_ms = now_ms;
        self.fsm.check_events();
    }

    /// Request a session.  Only acted on while idle; otherwise counted as
    /// unhandled.
    pub fn request_connect(&mut self, now_ms: u32) {
        self.fsm.logic_mut().now_ms = now_ms;
        self.fsm.process_event(LinkEvent::Connect);
    }

    /// Tear the session down (also the way out of `Faulted`).
    pub fn reset(&mut self) {
        self.fsm.process_event(LinkEvent::Reset);
    }

    /// Report a collaborator failure.
    pub fn report_fault(&mut self, fault: LinkFault) {
        self.fsm.process_event(LinkEvent::Fail(fault));
    }

    /// Feed an inbound frame from the transport side.  Returns `false`
    /// and counts the drop when the queue is full; the frame is consumed
    /// by the `Data` poll check on a later [`poll`](Self::poll).
    pub fn push_frame(&mut self, frame: Frame) -> bool {
        let logic = self.fsm.logic_mut();
        match logic.inbound.push_back(frame) {
            Ok(()) => true,
            Err(_) => {
                logic.stats.dropped_frames += 1;
                false
            }
        }
    }

    /// The active state.
    pub fn state(&self) -> &LinkState {
        self.fsm.state()
    }

    /// O(1) membership test, e.g. `machine.is_in::<Connected>()`.
    pub fn is_in<T>(&self) -> bool
    where
        LinkState: Holds<T>,
    {
        self.fsm.is_in::<T>()
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> LinkStats {
        self.fsm.logic().stats
    }

    /// Frames waiting in the inbound queue.
    pub fn inbound_len(&self) -> usize {
        self.fsm.logic().inbound.len()
    }
}
