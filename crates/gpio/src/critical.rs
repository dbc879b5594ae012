//! Critical section around dispatch table writes.

use pinirq_hal::{CoreId, GpioInterruptHw};

/// Masks one core's shared vector until dropped.
///
/// Taken around table writes so that the core's handler never observes a
/// half-written entry. Restores the previous mask state, so guards nest.
pub(crate) struct VectorMaskGuard<'a, H: GpioInterruptHw> {
    hw: &'a H,
    core: CoreId,
    was_masked: bool,
}

impl<'a, H: GpioInterruptHw> VectorMaskGuard<'a, H> {
    pub fn new(hw: &'a H, core: CoreId) -> Self {
        let was_masked = hw.set_vector_masked(core, true);
        Self {
            hw,
            core,
            was_masked,
        }
    }
}

impl<H: GpioInterruptHw> Drop for VectorMaskGuard<'_, H> {
    fn drop(&mut self) {
        if !self.was_masked {
            self.hw.set_vector_masked(self.core, false);
        }
    }
}
