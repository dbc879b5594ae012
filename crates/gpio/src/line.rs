//! Line identifiers and the callbacks bound to them.

use core::fmt;

/// GPIO line number.
///
/// Any value can be named; the service checks it against the hardware
/// before use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpioNum(pub u32);

impl GpioNum {
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for GpioNum {
    fn from(line: u32) -> Self {
        Self(line)
    }
}

impl fmt::Display for GpioNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Callback for one line's interrupts.
///
/// The handler object is the callback's context. It is borrowed for
/// `'static`, so it outlives every registration it is used for.
pub trait LineHandler: Sync {
    /// Called in interrupt context for each dispatched event.
    ///
    /// Must not block or allocate.
    fn handle(&self, line: GpioNum);

    /// Called from task context once the line is registered.
    fn on_register(&self, _line: GpioNum) {}
}

impl<F: Fn(GpioNum) + Sync> LineHandler for F {
    fn handle(&self, line: GpioNum) {
        self(line);
    }
}

/// Plain function plus the context it is called with.
pub struct CallbackHandler<C> {
    callback: fn(GpioNum, &C),
    context: C,
}

impl<C> CallbackHandler<C> {
    pub const fn new(callback: fn(GpioNum, &C), context: C) -> Self {
        Self { callback, context }
    }

    pub const fn context(&self) -> &C {
        &self.context
    }
}

impl<C: Sync> LineHandler for CallbackHandler<C> {
    fn handle(&self, line: GpioNum) {
        (self.callback)(line, &self.context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    fn record(line: GpioNum, last: &AtomicU32) {
        last.store(line.get(), Ordering::SeqCst);
    }

    #[test]
    fn test_callback_receives_its_context() {
        let handler = CallbackHandler::new(record, AtomicU32::new(0));
        handler.handle(GpioNum(9));
        assert_eq!(handler.context().load(Ordering::SeqCst), 9);
    }

    #[test]
    fn test_closure_is_a_handler() {
        static LAST: AtomicU32 = AtomicU32::new(0);
        let handler: &dyn LineHandler = &|line: GpioNum| LAST.store(line.get(), Ordering::SeqCst);
        handler.handle(GpioNum(3));
        handler.on_register(GpioNum(4));
        assert_eq!(LAST.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", GpioNum::from(12)), "GPIO12");
    }
}
