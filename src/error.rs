//! Unified error types.
//!
//! Follows embedded practice: a single `Error` enum every subsystem can
//! convert into, keeping a driver loop's error handling uniform.  All
//! variants are `Copy` so they can be passed around without allocation.
//!
//! Note that the engine itself raises no errors — "unhandled event" is a
//! first-class outcome, and collaborator failures are translated into
//! ordinary events (e.g. [`LinkEvent::Fail`](crate::link::LinkEvent::Fail))
//! so failure handling lives in the transition table, not a side channel.

use core::fmt;

use crate::config::ConfigError;
use crate::hal::FlashError;
use crate::link::LinkFault;

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A flash memory operation failed.
    Flash(FlashError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A link collaborator reported a fault.
    Link(LinkFault),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flash(e) => write!(f, "flash: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
        }
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<LinkFault> for Error {
    fn from(e: LinkFault) -> Self {
        Self::Link(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
