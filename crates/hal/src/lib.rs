#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Hardware collaborators of the pinirq GPIO interrupt service.
//!
//! The root holds [`IrqSafeLock`]; local interrupt masking, core identity and
//! the hardware traits live in submodules. The host simulator in [`sim`] is
//! only built for tests and with the `std` feature.

pub mod cpu;
pub mod interrupts;
#[cfg(any(test, feature = "std"))]
pub mod sim;
pub mod traits;

pub use cpu::{CoreId, MAX_CORES, current_core};
pub use traits::{GpioInterruptHw, HalError, TriggerKind, VectorFlags, VectorHandler};

use core::mem::ManuallyDrop;
use pinirq_utils::{Mutex, MutexGuard};

/// Spin lock that masks local interrupts while held.
///
/// Interrupts are masked before the lock is taken and restored after it is
/// released, so an interrupt on the same core can never spin on a lock its
/// own task holds.
pub struct IrqSafeLock<T> {
    inner: Mutex<T>,
}

impl<T> IrqSafeLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            inner: Mutex::new(data),
        }
    }

    pub fn lock(&self) -> IrqSafeLockGuard<'_, T> {
        let state = interrupts::disable();
        let guard = self.inner.lock();
        IrqSafeLockGuard {
            guard: ManuallyDrop::new(guard),
            state,
        }
    }

    /// Returns `None` without spinning if the lock is held.
    pub fn try_lock(&self) -> Option<IrqSafeLockGuard<'_, T>> {
        let state = interrupts::disable();
        if let Some(guard) = self.inner.try_lock() {
            Some(IrqSafeLockGuard {
                guard: ManuallyDrop::new(guard),
                state,
            })
        } else {
            interrupts::restore(state);
            None
        }
    }
}

pub struct IrqSafeLockGuard<'a, T> {
    guard: ManuallyDrop<MutexGuard<'a, T>>,
    state: usize,
}

impl<T> core::ops::Deref for IrqSafeLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> core::ops::DerefMut for IrqSafeLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for IrqSafeLockGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: guard is only dropped once, here, before interrupts come back
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        interrupts::restore(self.state);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
