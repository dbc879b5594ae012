//! Core identity.
//!
//! Host builds keep the current core in a thread-local so tests can run code
//! "on" a given core with [`run_on_core`].

use core::fmt;

/// Number of cores that can each own a dispatch table.
pub const MAX_CORES: usize = 2;

/// Index of an execution core, always `< MAX_CORES`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoreId(u8);

impl CoreId {
    /// The core that boots first.
    pub const BOOT: Self = Self(0);

    #[must_use]
    pub const fn new(index: usize) -> Option<Self> {
        if index < MAX_CORES {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// All cores in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..MAX_CORES as u8).map(CoreId)
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core{}", self.0)
    }
}

#[cfg(any(test, feature = "std"))]
mod mock {
    use super::CoreId;
    use std::cell::Cell;
    thread_local! {
        pub static CURRENT: Cell<CoreId> = const { Cell::new(CoreId::BOOT) };
    }
}

/// Core the caller is running on.
#[inline]
pub fn current_core() -> CoreId {
    #[cfg(any(test, feature = "std"))]
    {
        mock::CURRENT.with(core::cell::Cell::get)
    }
    #[cfg(all(not(any(test, feature = "std")), target_arch = "riscv32"))]
    {
        let hart: usize;
        // SAFETY: mhartid is a read-only CSR
        unsafe { core::arch::asm!("csrr {}, mhartid", out(reg) hart) };
        CoreId::new(hart).unwrap_or(CoreId::BOOT)
    }
    #[cfg(all(not(any(test, feature = "std")), not(target_arch = "riscv32")))]
    {
        CoreId::BOOT
    }
}

/// Runs `f` with [`current_core`] reporting `core` on this thread.
///
/// The previous core is restored when `f` returns or unwinds.
#[cfg(any(test, feature = "std"))]
pub fn run_on_core<R>(core: CoreId, f: impl FnOnce() -> R) -> R {
    struct Restore(CoreId);
    impl Drop for Restore {
        fn drop(&mut self) {
            mock::CURRENT.with(|c| c.set(self.0));
        }
    }

    let _restore = Restore(mock::CURRENT.with(|c| c.replace(core)));
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_id_bounds() {
        assert_eq!(CoreId::new(0), Some(CoreId::BOOT));
        assert!(CoreId::new(MAX_CORES - 1).is_some());
        assert!(CoreId::new(MAX_CORES).is_none());
        assert_eq!(CoreId::all().count(), MAX_CORES);
        assert_eq!(CoreId::all().last().map(CoreId::index), Some(MAX_CORES - 1));
    }

    #[test]
    fn test_run_on_core_restores_previous() {
        let second = CoreId::new(1).unwrap();
        assert_eq!(current_core(), CoreId::BOOT);
        let seen = run_on_core(second, current_core);
        assert_eq!(seen, second);
        assert_eq!(current_core(), CoreId::BOOT);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CoreId::new(1).unwrap()), "core1");
    }
}
