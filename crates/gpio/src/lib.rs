#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! GPIO interrupt service.
//!
//! Many GPIO lines share one interrupt vector per core. The service keeps a
//! table of per-line callbacks for every installed core and demultiplexes the
//! vector into them.
//!
//! The raw status of a line latches on its trigger even while the line is
//! disabled. Dispatch is therefore gated on the software enable mask, never on
//! the hardware enable bit, and a stale status bit is discarded whenever a
//! line is (re-)enabled.
//!
//! ```ignore
//! static SERVICE: GpioIsrService<Esp8684Gpio> = GpioIsrService::new(Esp8684Gpio);
//!
//! SERVICE.install(VectorFlags::LEVEL1)?;
//! SERVICE.add(GpioNum(4), &BUTTON, TriggerKind::FallingEdge)?;
//! ```

extern crate alloc;

mod allocator;
mod critical;
mod dispatch;
pub mod line;
mod registry;
pub mod service;

pub use line::{CallbackHandler, GpioNum, LineHandler};
pub use pinirq_hal::{CoreId, HalError, TriggerKind, VectorFlags};
pub use service::GpioIsrService;

use pinirq_error::define_error;
use pinirq_utils::LineMask;

/// Most lines a dispatch table can hold.
pub const MAX_LINES: usize = LineMask::CAPACITY as usize;

define_error! {
    /// Errors returned by [`GpioIsrService`] operations.
    pub enum IsrError(0x02) {
        /// Wrong lifecycle state for the operation
        InvalidState = 0x01 => "Service not installed or line not registered",
        InvalidArg = 0x02 => "Invalid GPIO line",
        NoMemory = 0x03 => "No memory for dispatch table",
        Hal(HalError) = 0x04 => "Interrupt hardware rejected the request",
    }
}

impl From<HalError> for IsrError {
    fn from(e: HalError) -> Self {
        IsrError::Hal(e)
    }
}
