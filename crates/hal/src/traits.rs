//! Seams between the GPIO interrupt service and the hardware it drives.

use bitflags::bitflags;
use pinirq_error::define_error;
use pinirq_utils::LineMask;

use crate::cpu::CoreId;

/// What input activity on a line latches its raw status bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Never latches.
    #[default]
    Disabled,
    RisingEdge,
    FallingEdge,
    AnyEdge,
    /// Latched for as long as the input is low.
    LowLevel,
    /// Latched for as long as the input is high.
    HighLevel,
}

impl TriggerKind {
    pub const fn is_edge(self) -> bool {
        matches!(self, Self::RisingEdge | Self::FallingEdge | Self::AnyEdge)
    }

    /// Whether the input changing from `from` to `to` latches an edge.
    pub const fn latches_edge(self, from: bool, to: bool) -> bool {
        match self {
            Self::RisingEdge => !from && to,
            Self::FallingEdge => from && !to,
            Self::AnyEdge => from != to,
            Self::Disabled | Self::LowLevel | Self::HighLevel => false,
        }
    }

    /// Whether a steady input `level` holds the line asserted.
    pub const fn level_asserted(self, level: bool) -> bool {
        match self {
            Self::LowLevel => !level,
            Self::HighLevel => level,
            Self::Disabled | Self::RisingEdge | Self::FallingEdge | Self::AnyEdge => false,
        }
    }
}

bitflags! {
    /// Allocation flags for binding the shared vector.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct VectorFlags: u32 {
        const LEVEL1 = 1 << 1;
        const LEVEL2 = 1 << 2;
        const LEVEL3 = 1 << 3;
        /// Vector may be shared with other drivers.
        const SHARED = 1 << 8;
        /// Handler is resident in fast memory and safe while flash is busy.
        const IRAM = 1 << 10;
    }
}

define_error! {
    /// Errors reported by the interrupt hardware.
    pub enum HalError(0x01) {
        /// Every vector of the core is already taken
        NoFreeVector = 0x01 => "No free interrupt vector on core",
        InvalidCore = 0x02 => "Core id out of range",
    }
}

/// Register-level access to the GPIO interrupt block and its vector.
///
/// Every method is one short hardware transaction and may be called with
/// interrupts masked. Line arguments are already validated by the caller.
pub trait GpioInterruptHw: Sync {
    /// Number of line slots in the block, including reserved ones.
    fn line_count(&self) -> u32;

    /// Lines that exist and may be used.
    fn valid_lines(&self) -> LineMask;

    fn set_trigger(&self, line: u32, kind: TriggerKind);

    /// Sets the line's enable bit and routes it to `core`'s vector.
    fn enable_interrupt(&self, line: u32, core: CoreId);

    fn disable_interrupt(&self, line: u32);

    /// Aggregate raw status of all lines, read in one transaction.
    ///
    /// A line's bit latches on its trigger even while its enable bit is
    /// clear.
    fn raw_status(&self) -> LineMask;

    /// Write-one-to-clear for the lines in `lines`.
    fn clear_status(&self, lines: LineMask);

    fn bind_vector(&self, core: CoreId, flags: VectorFlags) -> Result<(), HalError>;

    fn unbind_vector(&self, core: CoreId);

    /// Masks or unmasks `core`'s vector; returns whether it was masked.
    fn set_vector_masked(&self, core: CoreId, masked: bool) -> bool;
}

impl<T: GpioInterruptHw + ?Sized> GpioInterruptHw for &T {
    fn line_count(&self) -> u32 {
        (**self).line_count()
    }

    fn valid_lines(&self) -> LineMask {
        (**self).valid_lines()
    }

    fn set_trigger(&self, line: u32, kind: TriggerKind) {
        (**self).set_trigger(line, kind);
    }

    fn enable_interrupt(&self, line: u32, core: CoreId) {
        (**self).enable_interrupt(line, core);
    }

    fn disable_interrupt(&self, line: u32) {
        (**self).disable_interrupt(line);
    }

    fn raw_status(&self) -> LineMask {
        (**self).raw_status()
    }

    fn clear_status(&self, lines: LineMask) {
        (**self).clear_status(lines);
    }

    fn bind_vector(&self, core: CoreId, flags: VectorFlags) -> Result<(), HalError> {
        (**self).bind_vector(core, flags)
    }

    fn unbind_vector(&self, core: CoreId) {
        (**self).unbind_vector(core);
    }

    fn set_vector_masked(&self, core: CoreId, masked: bool) -> bool {
        (**self).set_vector_masked(core, masked)
    }
}

/// Routine bound to a core's shared vector.
pub trait VectorHandler: Sync {
    /// Called from interrupt context once per assertion of `core`'s vector.
    fn on_vector(&self, core: CoreId);
}
