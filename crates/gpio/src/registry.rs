//! Per-core table of line callbacks.
//!
//! The dispatch path reads the masks lock-free and then the handler slot of
//! each line it dispatches. Slots are only written by the owning core while
//! its vector is masked and the service's control lock is held, so no read
//! can overlap a write.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use pinirq_hal::CoreId;
use pinirq_utils::{AtomicLineMask, LineMask};

use crate::MAX_LINES;
use crate::line::LineHandler;

struct Slot {
    handler: UnsafeCell<Option<&'static dyn LineHandler>>,
    dispatched: AtomicUsize,
}

impl Slot {
    const fn new() -> Self {
        Self {
            handler: UnsafeCell::new(None),
            dispatched: AtomicUsize::new(0),
        }
    }
}

/// Callbacks and enable state for every line routed to one core.
///
/// A line's handler is `Some` exactly when its bit is set in `registered`.
/// `soft_enabled` is a subset of `registered` and is what dispatch obeys.
pub(crate) struct DispatchTable {
    owner: CoreId,
    slots: [Slot; MAX_LINES],
    soft_enabled: AtomicLineMask,
    registered: AtomicLineMask,
    clear_on_entry: AtomicLineMask,
}

// SAFETY: slot handlers are written only under the discipline described in the
// module docs; everything else is atomic.
unsafe impl Sync for DispatchTable {}

impl DispatchTable {
    pub const fn new(owner: CoreId) -> Self {
        Self {
            owner,
            slots: [const { Slot::new() }; MAX_LINES],
            soft_enabled: AtomicLineMask::new(),
            registered: AtomicLineMask::new(),
            clear_on_entry: AtomicLineMask::new(),
        }
    }

    pub const fn owner(&self) -> CoreId {
        self.owner
    }

    /// Installs `handler` for `line`, soft-enabled, with its dispatch count
    /// reset. Replaces any previous handler.
    ///
    /// # Safety
    /// Must run on the owning core with its vector masked and the control
    /// lock held. `line` must be below `MAX_LINES`.
    pub unsafe fn register(&self, line: u32, handler: &'static dyn LineHandler, clear_on_entry: bool) {
        let slot = &self.slots[line as usize];
        // SAFETY: the caller excludes every other access to this slot
        unsafe { *slot.handler.get() = Some(handler) };
        slot.dispatched.store(0, Ordering::Relaxed);
        self.clear_on_entry.assign(line, clear_on_entry);
        self.registered.set(line);
        self.soft_enabled.set(line);
    }

    /// Clears every trace of `line`.
    ///
    /// # Safety
    /// Same contract as [`register`](Self::register).
    pub unsafe fn unregister(&self, line: u32) {
        self.soft_enabled.clear(line);
        self.registered.clear(line);
        self.clear_on_entry.clear(line);
        // SAFETY: the caller excludes every other access to this slot
        unsafe { *self.slots[line as usize].handler.get() = None };
    }

    pub fn handler(&self, line: u32) -> Option<&'static dyn LineHandler> {
        let slot = self.slots.get(line as usize)?;
        // SAFETY: writes only happen while this core's vector is masked, and
        // readers are either that vector's handler or hold the control lock.
        unsafe { *slot.handler.get() }
    }

    pub fn is_registered(&self, line: u32) -> bool {
        self.registered.contains(line)
    }

    pub fn registered(&self) -> LineMask {
        self.registered.load()
    }

    pub fn soft_enabled(&self) -> LineMask {
        self.soft_enabled.load()
    }

    pub fn is_soft_enabled(&self, line: u32) -> bool {
        self.soft_enabled.contains(line)
    }

    /// Sets or clears the soft-enable bit of a registered line. Returns
    /// `false` if the line is not registered.
    pub fn set_soft_enabled(&self, line: u32, enabled: bool) -> bool {
        if !self.is_registered(line) {
            return false;
        }
        self.soft_enabled.assign(line, enabled);
        true
    }

    /// Sets a soft-enable bit with no handler behind it.
    #[cfg(test)]
    pub fn corrupt_soft_enabled(&self, line: u32) {
        self.soft_enabled.set(line);
    }

    pub fn clears_on_entry(&self, line: u32) -> bool {
        self.clear_on_entry.contains(line)
    }

    pub fn set_clear_on_entry(&self, line: u32, clear_on_entry: bool) {
        if self.is_registered(line) {
            self.clear_on_entry.assign(line, clear_on_entry);
        }
    }

    pub fn record_dispatch(&self, line: u32) {
        if let Some(slot) = self.slots.get(line as usize) {
            slot.dispatched.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dispatch_count(&self, line: u32) -> Option<usize> {
        if !self.is_registered(line) {
            return None;
        }
        self.slots
            .get(line as usize)
            .map(|slot| slot.dispatched.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::GpioNum;

    fn noop(_line: GpioNum) {}

    static NOOP: fn(GpioNum) = noop;

    #[test]
    fn test_register_sets_all_masks() {
        let table = DispatchTable::new(CoreId::BOOT);
        unsafe { table.register(4, &NOOP, true) };

        assert!(table.handler(4).is_some());
        assert!(table.is_registered(4));
        assert!(table.is_soft_enabled(4));
        assert!(table.clears_on_entry(4));
        assert_eq!(table.dispatch_count(4), Some(0));
        assert_eq!(table.owner(), CoreId::BOOT);
    }

    #[test]
    fn test_unregister_clears_everything() {
        let table = DispatchTable::new(CoreId::BOOT);
        unsafe {
            table.register(4, &NOOP, true);
            table.unregister(4);
        }

        assert!(table.handler(4).is_none());
        assert!(table.registered().is_empty());
        assert!(table.soft_enabled().is_empty());
        assert!(!table.clears_on_entry(4));
        assert_eq!(table.dispatch_count(4), None);
    }

    #[test]
    fn test_soft_enable_requires_registration() {
        let table = DispatchTable::new(CoreId::BOOT);
        assert!(!table.set_soft_enabled(2, true));
        assert!(!table.is_soft_enabled(2));

        unsafe { table.register(2, &NOOP, false) };
        assert!(table.set_soft_enabled(2, false));
        assert!(table.is_registered(2));
        assert!(!table.is_soft_enabled(2));
    }

    #[test]
    fn test_reregister_resets_count() {
        let table = DispatchTable::new(CoreId::BOOT);
        unsafe { table.register(1, &NOOP, true) };
        table.record_dispatch(1);
        table.record_dispatch(1);
        assert_eq!(table.dispatch_count(1), Some(2));

        unsafe { table.register(1, &NOOP, false) };
        assert_eq!(table.dispatch_count(1), Some(0));
        assert!(!table.clears_on_entry(1));
    }

    #[test]
    fn test_out_of_range_lookup() {
        let table = DispatchTable::new(CoreId::BOOT);
        assert!(table.handler(64).is_none());
        assert_eq!(table.dispatch_count(64), None);
    }
}
