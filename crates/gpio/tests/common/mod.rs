//! Shared fixtures for the service integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use pinirq::{CoreId, GpioNum, LineHandler};
use pinirq_hal::current_core;

pub const NO_CORE: usize = usize::MAX;

/// Handler that counts its calls and remembers where the last one ran.
pub struct Counter {
    hits: AtomicUsize,
    registrations: AtomicUsize,
    last_core: AtomicUsize,
}

impl Counter {
    pub fn leaked() -> &'static Self {
        Box::leak(Box::new(Self {
            hits: AtomicUsize::new(0),
            registrations: AtomicUsize::new(0),
            last_core: AtomicUsize::new(NO_CORE),
        }))
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn last_core(&self) -> Option<CoreId> {
        CoreId::new(self.last_core.load(Ordering::SeqCst))
    }
}

impl LineHandler for Counter {
    fn handle(&self, _line: GpioNum) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.last_core.store(current_core().index(), Ordering::SeqCst);
    }

    fn on_register(&self, _line: GpioNum) {
        self.registrations.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn core1() -> CoreId {
    CoreId::new(1).unwrap()
}

/// Leaks `value` so it can be registered as a handler.
pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}
