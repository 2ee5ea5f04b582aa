//! Typed finite-state-machine dispatch engine.
//!
//! Classic embedded double-dispatch pattern expressed in safe Rust:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Fsm<M>                                                   │
//! │  ┌─────────────────┐      ┌────────────────────────────┐  │
//! │  │ active-state    │      │ M: Machine                 │  │
//! │  │ slot (enum)     │◀────▶│   on_event(ctl, event)     │  │
//! │  └─────────────────┘      │   check_event(state, kind) │  │
//! │       owns, exclusive     │   on_unhandled(state, ev)  │  │
//! │                           │   POLL: ordered kind list  │  │
//! │                           └────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Resolution is purely by the static (state variant, event variant) pair:
//! the derived machine's `on_event` is one exhaustive `match` whose
//! catch-all arm returns [`Dispatch::Unhandled`], at which point the engine
//! invokes the fallback exactly once.  Missing pairs are a supported
//! outcome, not an error — transition tables stay sparse.
//!
//! The engine is single-threaded and run-to-completion: `process_event`
//! and `check_events` never suspend, and a check routine's event is
//! dispatched synchronously before the next poll-set kind is scanned, so a
//! mid-scan transition is visible to the remainder of the same scan.

mod set;

pub use set::{EventSet, Holds, StateSet};

use log::trace;

/// Outcome of a single dispatch, reported by [`Machine::on_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler for the (state, event) pair existed and ran.
    Handled,
    /// No handler for the pair; the engine runs the fallback.
    Unhandled,
}

/// Handler-side handle on the active-state slot.
///
/// Passed to [`Machine::on_event`] for the duration of one dispatch.  All
/// writes go through [`set_state`](Self::set_state), so the slot can never
/// be left empty; calling it more than once in a handler is legal and the
/// last call wins.
pub struct Control<'a, S: StateSet> {
    slot: &'a mut S,
    changed: bool,
}

impl<'a, S: StateSet> Control<'a, S> {
    fn new(slot: &'a mut S) -> Self {
        Self {
            slot,
            changed: false,
        }
    }

    /// The active state value, with its concrete variant.
    pub fn state(&self) -> &S {
        self.slot
    }

    /// Unconditionally replace the active state with a default-constructed
    /// `T`.  Always succeeds; guards are the caller's conditional logic.
    pub fn set_state<T>(&mut self)
    where
        T: Default + Into<S>,
    {
        *self.slot = T::default().into();
        self.changed = true;
    }

    /// O(1) membership test: is the active state a `T`?
    pub fn is_current_state<T>(&self) -> bool
    where
        S: Holds<T>,
    {
        <S as Holds<T>>::holds(self.slot)
    }

    fn finish(self) -> bool {
        self.changed
    }
}

/// Capability contract a derived machine supplies to the engine.
///
/// One implementation covers the whole closed state×event space: `on_event`
/// branches on the exact pair, `check_event` answers "has this polled event
/// occurred right now", and `on_unhandled` is the single global fallback.
pub trait Machine {
    /// Closed state set, declared with [`states!`](crate::states).
    type State: StateSet;
    /// Closed event set, declared with [`events!`](crate::events).
    type Event: EventSet;

    /// Ordered poll set scanned by [`Fsm::check_events`].  Order is part of
    /// the contract.  Kinds are drawn from the event set's discriminants,
    /// so the poll set cannot name an undeclared event.
    const POLL: &'static [<Self::Event as EventSet>::Kind] = &[];

    /// Handle one (state, event) pair.  Return [`Dispatch::Unhandled`] from
    /// the catch-all arm for pairs without a handler.
    fn on_event(&mut self, ctl: &mut Control<'_, Self::State>, event: &Self::Event) -> Dispatch;

    /// Decide whether the polled event `kind` has occurred — elapsed time,
    /// hardware flags, queued data — and if so construct it.  Must not
    /// block.
    fn check_event(
        &mut self,
        _state: &Self::State,
        _kind: <Self::Event as EventSet>::Kind,
    ) -> Option<Self::Event> {
        None
    }

    /// Global fallback for pairs without a handler.  Default: no-op.
    /// Override once to count or log unhandled events.
    fn on_unhandled(&mut self, _state: &Self::State, _event: &Self::Event) {}
}

/// The dispatch engine.  Owns the active-state slot exclusively and holds
/// the derived machine logic by value.
pub struct Fsm<M: Machine> {
    logic: M,
    state: M::State,
}

impl<M: Machine> Fsm<M> {
    /// Construct the engine in the caller-supplied initial state.
    pub fn new(logic: M, initial: M::State) -> Self {
        Self {
            logic,
            state: initial,
        }
    }

    /// The active state value.
    pub fn state(&self) -> &M::State {
        &self.state
    }

    /// O(1) membership test: is the active state a `T`?
    pub fn is_in<T>(&self) -> bool
    where
        M::State: Holds<T>,
    {
        <M::State as Holds<T>>::holds(&self.state)
    }

    /// The derived machine logic.
    pub fn logic(&self) -> &M {
        &self.logic
    }

    /// Mutable access to the derived machine logic, e.g. to feed inbound
    /// queues from the transport side.
    pub fn logic_mut(&mut self) -> &mut M {
        &mut self.logic
    }

    /// Dispatch one concrete event against the active state.
    ///
    /// Runs the handler for the (state, event) pair if the derived machine
    /// has one; otherwise runs the fallback exactly once and leaves the
    /// state unchanged.  Synchronous, run-to-completion.
    pub fn process_event(&mut self, event: M::Event) {
        let before = self.state;
        let mut ctl = Control::new(&mut self.state);
        let outcome = self.logic.on_event(&mut ctl, &event);
        let changed = ctl.finish();

        match outcome {
            Dispatch::Handled => {
                if changed {
                    trace!(
                        "fsm: {:?} --{:?}--> {:?}",
                        before,
                        event.kind(),
                        self.state
                    );
                }
            }
            Dispatch::Unhandled => {
                trace!("fsm: {:?} unhandled in {:?}", event.kind(), before);
                self.logic.on_unhandled(&self.state, &event);
            }
        }
    }

    /// Scan the poll set once.  Call once per driver-loop iteration.
    ///
    /// Visits every kind in [`Machine::POLL`], in declared order, asking
    /// the derived machine whether that event has occurred; a returned
    /// event is dispatched synchronously before the next kind is scanned.
    /// All kinds are always visited — a transition caused by an earlier
    /// check does not short-circuit the scan, and later checks observe the
    /// new state.
    pub fn check_events(&mut self) {
        for &kind in M::POLL {
            if let Some(event) = self.logic.check_event(&self.state, kind) {
                self.process_event(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::states! {
        enum Lamp {
            Red,
            Amber,
            Green,
        }
    }

    crate::events! {
        enum LampEvent kinds LampEventKind {
            Advance,
            Reset,
            Blackout,
            Skip,
        }
    }

    /// Recording machine: Advance steps Red→Amber→Green→Red, Reset returns
    /// to Red from the lit phases, Skip exercises repeated set_state, and
    /// Blackout has no handler anywhere.
    #[derive(Default)]
    struct Cycler {
        handled: usize,
        fallbacks: usize,
        /// (kind, state observed) per check invocation, in order.
        checks: Vec<(LampEventKind, Lamp)>,
        fire_advance: bool,
        fire_reset: bool,
        fire_blackout: bool,
    }

    impl Machine for Cycler {
        type State = Lamp;
        type Event = LampEvent;

        const POLL: &'static [LampEventKind] = &[
            LampEventKind::Advance,
            LampEventKind::Reset,
            LampEventKind::Blackout,
        ];

        fn on_event(&mut self, ctl: &mut Control<'_, Lamp>, event: &LampEvent) -> Dispatch {
            let state = *ctl.state();
            match (state, event) {
                (Lamp::Red(_), LampEvent::Advance) => {
                    self.handled += 1;
                    ctl.set_state::<Amber>();
                    Dispatch::Handled
                }
                (Lamp::Amber(_), LampEvent::Advance) => {
                    self.handled += 1;
                    ctl.set_state::<Green>();
                    Dispatch::Handled
                }
                (Lamp::Green(_), LampEvent::Advance) => {
                    self.handled += 1;
                    ctl.set_state::<Red>();
                    Dispatch::Handled
                }
                (Lamp::Amber(_) | Lamp::Green(_), LampEvent::Reset) => {
                    self.handled += 1;
                    ctl.set_state::<Red>();
                    Dispatch::Handled
                }
                (_, LampEvent::Skip) => {
                    // Two writes in one handler: the last one wins.
                    ctl.set_state::<Amber>();
                    assert!(ctl.is_current_state::<Amber>());
                    ctl.set_state::<Green>();
                    self.handled += 1;
                    Dispatch::Handled
                }
                _ => Dispatch::Unhandled,
            }
        }

        fn check_event(&mut self, state: &Lamp, kind: LampEventKind) -> Option<LampEvent> {
            self.checks.push((kind, *state));
            match kind {
                LampEventKind::Advance if self.fire_advance => Some(LampEvent::Advance),
                LampEventKind::Reset if self.fire_reset => Some(LampEvent::Reset),
                LampEventKind::Blackout if self.fire_blackout => Some(LampEvent::Blackout),
                _ => None,
            }
        }

        fn on_unhandled(&mut self, _state: &Lamp, _event: &LampEvent) {
            self.fallbacks += 1;
        }
    }

    fn red_fsm() -> Fsm<Cycler> {
        Fsm::new(Cycler::default(), Lamp::from(Red))
    }

    fn assert_exactly_one_active(fsm: &Fsm<Cycler>) {
        let memberships = [
            fsm.is_in::<Red>(),
            fsm.is_in::<Amber>(),
            fsm.is_in::<Green>(),
        ];
        assert_eq!(memberships.iter().filter(|m| **m).count(), 1);
    }

    #[test]
    fn starts_in_caller_supplied_state() {
        let fsm = Fsm::new(Cycler::default(), Lamp::from(Green));
        assert!(fsm.is_in::<Green>());
        assert_exactly_one_active(&fsm);
    }

    #[test]
    fn handled_pair_transitions_and_runs_handler_once() {
        let mut fsm = red_fsm();
        fsm.process_event(LampEvent::Advance);
        assert!(fsm.is_in::<Amber>());
        assert_eq!(fsm.logic().handled, 1);
        assert_eq!(fsm.logic().fallbacks, 0);
        assert_exactly_one_active(&fsm);
    }

    #[test]
    fn unhandled_pair_leaves_state_and_hits_fallback_once() {
        let mut fsm = red_fsm();
        fsm.process_event(LampEvent::Blackout);
        assert!(fsm.is_in::<Red>());
        assert_eq!(fsm.logic().handled, 0);
        assert_eq!(fsm.logic().fallbacks, 1);
    }

    #[test]
    fn reset_is_unhandled_in_red() {
        // Sparse table: (Red, Reset) has no arm.
        let mut fsm = red_fsm();
        fsm.process_event(LampEvent::Reset);
        assert!(fsm.is_in::<Red>());
        assert_eq!(fsm.logic().fallbacks, 1);
    }

    #[test]
    fn last_set_state_wins() {
        let mut fsm = red_fsm();
        fsm.process_event(LampEvent::Skip);
        assert!(fsm.is_in::<Green>());
        assert_exactly_one_active(&fsm);
    }

    #[test]
    fn scan_visits_every_kind_in_declared_order() {
        let mut fsm = red_fsm();
        fsm.check_events();
        let kinds: Vec<_> = fsm.logic().checks.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                LampEventKind::Advance,
                LampEventKind::Reset,
                LampEventKind::Blackout,
            ]
        );
    }

    #[test]
    fn scan_does_not_stop_after_a_transition() {
        let mut fsm = red_fsm();
        fsm.logic_mut().fire_advance = true;
        fsm.check_events();
        // Advance fired and transitioned Red→Amber, yet Reset and Blackout
        // were still scanned.
        assert_eq!(fsm.logic().checks.len(), 3);
        assert!(fsm.is_in::<Amber>());
    }

    #[test]
    fn mid_scan_transition_is_visible_to_later_checks() {
        let mut fsm = red_fsm();
        fsm.logic_mut().fire_advance = true;
        fsm.check_events();
        let checks = &fsm.logic().checks;
        assert!(matches!(checks[0], (LampEventKind::Advance, Lamp::Red(_))));
        assert!(matches!(checks[1], (LampEventKind::Reset, Lamp::Amber(_))));
        assert!(matches!(
            checks[2],
            (LampEventKind::Blackout, Lamp::Amber(_))
        ));
    }

    #[test]
    fn chained_poll_transitions_in_one_scan() {
        // Advance moves Red→Amber, then Reset (checked later in the same
        // scan) observes Amber and moves back to Red.
        let mut fsm = red_fsm();
        fsm.logic_mut().fire_advance = true;
        fsm.logic_mut().fire_reset = true;
        fsm.check_events();
        assert!(fsm.is_in::<Red>());
        assert_eq!(fsm.logic().handled, 2);
    }

    #[test]
    fn polled_unhandled_event_runs_fallback_without_transition() {
        let mut fsm = red_fsm();
        fsm.logic_mut().fire_blackout = true;
        fsm.check_events();
        assert!(fsm.is_in::<Red>());
        assert_eq!(fsm.logic().fallbacks, 1);
    }

    #[test]
    fn empty_poll_set_scan_is_a_noop() {
        struct Inert;
        impl Machine for Inert {
            type State = Lamp;
            type Event = LampEvent;

            fn on_event(&mut self, _ctl: &mut Control<'_, Lamp>, _ev: &LampEvent) -> Dispatch {
                Dispatch::Unhandled
            }
        }

        let mut fsm = Fsm::new(Inert, Lamp::from(Red));
        fsm.check_events();
        assert!(fsm.is_in::<Red>());
    }

    #[test]
    fn invariant_holds_across_a_long_event_mix() {
        let mut fsm = red_fsm();
        let script = [
            LampEvent::Advance,
            LampEvent::Blackout,
            LampEvent::Advance,
            LampEvent::Reset,
            LampEvent::Skip,
            LampEvent::Advance,
            LampEvent::Reset,
        ];
        for event in script {
            fsm.process_event(event);
            assert_exactly_one_active(&fsm);
        }
        assert!(fsm.is_in::<Red>());
    }
}
