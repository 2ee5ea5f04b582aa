//! Link supervisor configuration.
//!
//! Tunable parameters for the [`link`](crate::link) machine.  Persisted to
//! flash as a length-prefixed postcard blob; values are range-checked
//! before persisting and after loading — invalid values are rejected, not
//! silently clamped.

use core::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::hal::{FlashError, FlashMemory};

/// Length-prefix header in front of the stored blob.
const LEN_PREFIX: usize = 2;
/// Upper bound on the serialized blob, header included.
const MAX_BLOB: usize = 64;

/// Errors from configuration load/save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No stored configuration at the given address (erased flash).
    NotFound,
    /// Stored blob failed deserialization.
    Corrupted,
    /// A field failed range validation; the message names the field.
    ValidationFailed(&'static str),
    /// Underlying flash operation failed.
    Flash(FlashError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no stored config"),
            Self::Corrupted => write!(f, "stored config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Flash(e) => write!(f, "flash: {e}"),
        }
    }
}

impl From<FlashError> for ConfigError {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

/// Tunable parameters for the link supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Deadline for the connecting phase (milliseconds).
    pub connect_deadline_ms: u32,
    /// Silence window after which a connected peer is considered lost
    /// (milliseconds).
    pub heartbeat_window_ms: u32,
    /// Expected driver-loop poll interval (milliseconds).  Informational
    /// for the loop owner; timeouts are measured against the clock, not
    /// counted in polls.
    pub poll_interval_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_deadline_ms: 5_000,
            heartbeat_window_ms: 15_000,
            poll_interval_ms: 100,
        }
    }
}

impl LinkConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_deadline_ms == 0 {
            return Err(ConfigError::ValidationFailed("connect_deadline_ms is zero"));
        }
        if self.heartbeat_window_ms == 0 {
            return Err(ConfigError::ValidationFailed("heartbeat_window_ms is zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll_interval_ms is zero"));
        }
        if self.heartbeat_window_ms <= self.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "heartbeat_window_ms must exceed poll_interval_ms",
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration blob from `addr`.
    pub fn load(flash: &impl FlashMemory, addr: usize) -> Result<Self, ConfigError> {
        let mut prefix = [0u8; LEN_PREFIX];
        flash.read(addr, &mut prefix)?;
        let len = usize::from(u16::from_le_bytes(prefix));
        if len == usize::from(u16::MAX) {
            // Erased flash reads back all-ones.
            return Err(ConfigError::NotFound);
        }
        if len == 0 || len > MAX_BLOB - LEN_PREFIX {
            return Err(ConfigError::Corrupted);
        }

        let mut blob = [0u8; MAX_BLOB];
        flash.read(addr + LEN_PREFIX, &mut blob[..len])?;
        let config: Self = postcard::from_bytes(&blob[..len]).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate and persist as a length-prefixed blob at `addr`.
    pub fn save(&self, flash: &mut impl FlashMemory, addr: usize) -> Result<(), ConfigError> {
        self.validate()?;
        let blob = postcard::to_allocvec(self).map_err(|_| ConfigError::Corrupted)?;
        if blob.len() > MAX_BLOB - LEN_PREFIX {
            return Err(ConfigError::Corrupted);
        }

        flash.erase(addr, MAX_BLOB)?;
        let prefix = (blob.len() as u16).to_le_bytes();
        flash.write(addr, &prefix)?;
        flash.write(addr + LEN_PREFIX, &blob)?;
        info!("config: saved {} byte blob", blob.len());
        Ok(())
    }
}
