//! Local interrupt masking for the calling core.
//!
//! On RISC-V this is the `MIE` bit of `mstatus`. Host builds (tests and the
//! `std` feature) keep a per-thread flag instead, one thread standing in for
//! one core.

#[cfg(any(test, feature = "std"))]
mod mock {
    use std::cell::Cell;
    thread_local! {
        pub static ENABLED: Cell<bool> = const { Cell::new(true) };
    }

    pub fn disable() -> usize {
        ENABLED.with(|e| usize::from(e.replace(false)))
    }

    pub fn restore(state: usize) {
        ENABLED.with(|e| e.set(state != 0));
    }

    pub fn is_enabled() -> bool {
        ENABLED.with(Cell::get)
    }
}

#[cfg(all(not(any(test, feature = "std")), target_arch = "riscv32"))]
mod riscv {
    const MSTATUS_MIE: usize = 1 << 3;

    #[inline(always)]
    pub fn disable() -> usize {
        let prev: usize;
        // SAFETY: clearing MIE only masks interrupts on this hart
        unsafe { core::arch::asm!("csrrci {}, mstatus, 8", out(reg) prev) };
        prev & MSTATUS_MIE
    }

    #[inline(always)]
    pub fn restore(state: usize) {
        if state & MSTATUS_MIE != 0 {
            // SAFETY: MIE was set when the matching disable() ran
            unsafe { core::arch::asm!("csrsi mstatus, 8") };
        }
    }

    #[inline(always)]
    pub fn is_enabled() -> bool {
        let status: usize;
        // SAFETY: reading mstatus has no side effects
        unsafe { core::arch::asm!("csrr {}, mstatus", out(reg) status) };
        status & MSTATUS_MIE != 0
    }
}

// Stub for no-std targets without a port
#[cfg(all(not(any(test, feature = "std")), not(target_arch = "riscv32")))]
mod stub {
    pub fn disable() -> usize {
        0
    }

    pub fn restore(_state: usize) {}

    pub fn is_enabled() -> bool {
        true
    }
}

#[cfg(any(test, feature = "std"))]
use mock as imp;
#[cfg(all(not(any(test, feature = "std")), target_arch = "riscv32"))]
use riscv as imp;
#[cfg(all(not(any(test, feature = "std")), not(target_arch = "riscv32")))]
use stub as imp;

/// Disables interrupts on the calling core and returns the previous state.
#[inline(always)]
pub fn disable() -> usize {
    imp::disable()
}

/// Restores a state returned by [`disable`].
#[inline(always)]
pub fn restore(state: usize) {
    imp::restore(state);
}

#[inline(always)]
pub fn is_enabled() -> bool {
    imp::is_enabled()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disable_restore_cycle() {
        assert!(is_enabled());
        let outer = disable();
        assert!(!is_enabled());

        let inner = disable();
        assert!(!is_enabled());
        restore(inner);
        assert!(!is_enabled());

        restore(outer);
        assert!(is_enabled());
    }

    #[test]
    fn test_state_is_per_thread() {
        let state = disable();
        let other = std::thread::spawn(is_enabled).join().unwrap();
        assert!(other);
        restore(state);
    }
}
