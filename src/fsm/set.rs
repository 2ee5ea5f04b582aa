//! Closed state and event sets.
//!
//! A machine's states and events are fixed at compile time: each set is a
//! tagged-union enum over distinct marker/value types, declared once with
//! [`states!`] or [`events!`].  The macros generate the enum, the marker
//! structs, the `From` conversions used by
//! [`Control::set_state`](super::Control::set_state), and the per-marker
//! membership predicates behind
//! [`Control::is_current_state`](super::Control::is_current_state).

use core::fmt;

/// A closed, compile-time-fixed set of mutually exclusive states.
///
/// Implemented by the enum that [`states!`] generates.  The enum makes an
/// "empty" active-state slot unrepresentable: a value of the set is always
/// exactly one of its variants.
pub trait StateSet: fmt::Debug + Copy {
    /// Number of states in the set.
    const COUNT: usize;
}

/// A closed, compile-time-fixed set of trigger events.
///
/// Implemented by the enum that [`events!`] generates.  Variants may carry
/// payload data; [`Self::kind`] strips the payload down to the
/// discriminant used to declare poll sets.
pub trait EventSet: fmt::Debug {
    /// Payload-free discriminant type for this event set.
    type Kind: fmt::Debug + Copy + PartialEq + 'static;

    /// The discriminant of this event value.
    fn kind(&self) -> Self::Kind;
}

/// Membership test for one marker type of a [`StateSet`].
///
/// `S: Holds<T>` means the set `S` has a variant wrapping the marker `T`;
/// `holds` is true iff that variant is the active one.
pub trait Holds<T> {
    /// True iff the active variant wraps a `T`.
    fn holds(&self) -> bool;
}

/// Declare a closed state set.
///
/// Generates one unit marker struct per state, the tagged-union enum over
/// them, `From<Marker>` conversions, [`Holds`] impls, and the [`StateSet`]
/// impl.
///
/// # Example
///
/// ```
/// fsmkit::states! {
///     /// Phases of a pump controller.
///     pub enum PumpState {
///         Stopped,
///         Priming,
///         Running,
///     }
/// }
///
/// let s = PumpState::from(Priming);
/// assert!(matches!(s, PumpState::Priming(_)));
/// ```
#[macro_export]
macro_rules! states {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(
            $(#[$vmeta])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
            $vis struct $variant;
        )*

        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant($variant)
            ),*
        }

        $(
            impl ::core::convert::From<$variant> for $name {
                fn from(marker: $variant) -> Self {
                    Self::$variant(marker)
                }
            }

            impl $crate::fsm::Holds<$variant> for $name {
                fn holds(&self) -> bool {
                    matches!(self, Self::$variant(_))
                }
            }
        )*

        impl $crate::fsm::StateSet for $name {
            const COUNT: usize = [$(stringify!($variant)),*].len();
        }
    };
}

/// Declare a closed event set.
///
/// Generates the event enum (variants may carry payloads), a payload-free
/// discriminant enum named by the `kinds` clause, and the [`EventSet`]
/// impl mapping each variant to its discriminant.
///
/// # Example
///
/// ```
/// fsmkit::events! {
///     pub enum PumpEvent kinds PumpEventKind {
///         Start,
///         Stop,
///         FlowSample(u16),
///     }
/// }
///
/// use fsmkit::fsm::EventSet;
/// assert_eq!(PumpEvent::FlowSample(420).kind(), PumpEventKind::FlowSample);
/// ```
#[macro_export]
macro_rules! events {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident kinds $kind:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident $( ( $($payload:ty),+ $(,)? ) )?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant $( ( $($payload),+ ) )?
            ),*
        }

        #[doc = concat!("Payload-free discriminants of [`", stringify!($name), "`], used to declare poll sets.")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $kind {
            $( $variant ),*
        }

        impl $crate::fsm::EventSet for $name {
            type Kind = $kind;

            fn kind(&self) -> $kind {
                match self {
                    $( Self::$variant { .. } => $kind::$variant ),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::fsm::{EventSet, Holds, StateSet};

    crate::states! {
        enum Gate {
            Closed,
            Opening,
            Open,
        }
    }

    crate::events! {
        enum GateEvent kinds GateEventKind {
            Toggle,
            Position(u8),
        }
    }

    #[test]
    fn state_count_matches_declaration() {
        assert_eq!(Gate::COUNT, 3);
    }

    #[test]
    fn markers_convert_into_the_set() {
        assert!(matches!(Gate::from(Closed), Gate::Closed(_)));
        assert!(matches!(Gate::from(Open), Gate::Open(_)));
    }

    #[test]
    fn membership_is_exclusive() {
        let g = Gate::from(Opening);
        assert!(<Gate as Holds<Opening>>::holds(&g));
        assert!(!<Gate as Holds<Closed>>::holds(&g));
        assert!(!<Gate as Holds<Open>>::holds(&g));
    }

    #[test]
    fn kinds_strip_payloads() {
        assert_eq!(GateEvent::Toggle.kind(), GateEventKind::Toggle);
        assert_eq!(GateEvent::Position(17).kind(), GateEventKind::Position);
    }
}
