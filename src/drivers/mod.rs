//! Device drivers.
//!
//! Pure protocol logic over the HAL seams — no target-specific code.  A
//! derived machine drives these from its handlers; the drivers themselves
//! contain no dispatch logic.

pub mod ssd1306;

pub use ssd1306::Ssd1306;
