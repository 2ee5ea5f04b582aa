//! fsmkit — typed finite-state-machine dispatch core for embedded control
//! logic, plus the hardware-facing scaffolding to build real machines on it.
//!
//! The heart of the crate is [`fsm`]: a closed set of state marker types and
//! a closed set of trigger events, double-dispatched without heap allocation
//! or `dyn`.  Everything else is a collaborator a derived machine may drive
//! from its handlers: an SSD1306 command/data driver, a deferred log ring,
//! and the HAL port traits that keep hardware behind seams.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  driver loop (one iteration)                               │
//! │        │                                                   │
//! │        ▼                                                   │
//! │  machine.poll() ──▶ Fsm::check_events()                    │
//! │                        │  per poll-set kind, in order      │
//! │                        ▼                                   │
//! │                    check_event(state, kind)                │
//! │                        │ Some(event)                       │
//! │                        ▼                                   │
//! │                    Fsm::process_event(event)               │
//! │                        │                                   │
//! │                        ▼                                   │
//! │                    on_event(ctl, event) ── set_state ──┐   │
//! │                        │ Unhandled                     │   │
//! │                        ▼                               ▼   │
//! │                    on_unhandled(state, event)   active slot│
//! └────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod hal;
pub mod link;
pub mod logging;
