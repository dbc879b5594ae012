//! Install/uninstall and per-line operations from task context.

use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicBool, AtomicPtr, Ordering, fence};

use pinirq_hal::{
    CoreId, GpioInterruptHw, IrqSafeLock, IrqSafeLockGuard, MAX_CORES, TriggerKind, VectorFlags,
    VectorHandler, current_core,
};
use pinirq_utils::LineMask;

use crate::allocator::TableAllocator;
use crate::critical::VectorMaskGuard;
use crate::line::{GpioNum, LineHandler};
use crate::registry::DispatchTable;
use crate::{IsrError, MAX_LINES, dispatch};

type ControlGuard<'a> = IrqSafeLockGuard<'a, TableAllocator>;

/// Logs from task context only; callbacks calling back into the service run
/// in interrupt context and stay silent.
macro_rules! task_log {
    ($svc:expr, $level:ident, $($arg:tt)+) => {
        if !$svc.in_interrupt() {
            log::$level!($($arg)+);
        }
    };
}

/// GPIO interrupt service: one dispatch table and one bound vector per
/// installed core.
///
/// Every operation except [`enable`](Self::enable) and
/// [`disable`](Self::disable) acts on the calling core. Writers serialize on
/// one interrupt-safe control lock; the vector handler takes no lock.
pub struct GpioIsrService<H: GpioInterruptHw> {
    hw: H,
    tables: [AtomicPtr<DispatchTable>; MAX_CORES],
    in_dispatch: [AtomicBool; MAX_CORES],
    control: IrqSafeLock<TableAllocator>,
}

impl<H: GpioInterruptHw> GpioIsrService<H> {
    /// Service with no core installed.
    pub const fn new(hw: H) -> Self {
        Self {
            hw,
            tables: [const { AtomicPtr::new(ptr::null_mut()) }; MAX_CORES],
            in_dispatch: [const { AtomicBool::new(false) }; MAX_CORES],
            control: IrqSafeLock::new(TableAllocator::new()),
        }
    }

    /// Installs the service on the calling core: allocates its dispatch
    /// table and binds the shared vector with `flags`.
    ///
    /// Installing an installed core does nothing.
    pub fn install(&self, flags: VectorFlags) -> Result<(), IsrError> {
        let core = current_core();
        let mut control = self.control.lock();
        if self.table(&control, core).is_some() {
            return Ok(());
        }

        let table = control.allocate(core).inspect_err(|_| {
            task_log!(self, warn, "[GPIO] {core}: no memory for dispatch table");
        })?;
        if let Err(e) = self.hw.bind_vector(core, flags) {
            // SAFETY: never published, so nothing else can reference it
            unsafe { control.release(table) };
            task_log!(self, warn, "[GPIO] {core}: cannot bind vector: {e}");
            return Err(IsrError::Hal(e));
        }
        self.tables[core.index()].store(table.as_ptr(), Ordering::Release);

        task_log!(self, info, "[GPIO] ISR service installed on {core} ({flags:?})");
        Ok(())
    }

    /// Uninstalls the service from the calling core. Registered lines are
    /// disabled in hardware and forgotten.
    ///
    /// Does nothing when called from a callback running on the same core,
    /// since that pass is still reading the table.
    pub fn uninstall(&self) {
        let core = current_core();
        if self.in_interrupt() {
            return;
        }
        let mut control = self.control.lock();
        if self.teardown(&mut control, core) {
            task_log!(self, info, "[GPIO] ISR service uninstalled from {core}");
        }
    }

    /// Registers `handler` for `line` on the calling core and enables it.
    ///
    /// Adding a line that is already registered on this core replaces its
    /// handler. A line can only be registered on one core at a time.
    pub fn add(
        &self,
        line: GpioNum,
        handler: &'static dyn LineHandler,
        trigger: TriggerKind,
    ) -> Result<(), IsrError> {
        let line = self.validate(line)?;
        let core = current_core();
        {
            let control = self.control.lock();
            let Some(table) = self.table(&control, core) else {
                task_log!(self, warn, "[GPIO] add {}: not installed on {core}", GpioNum(line));
                return Err(IsrError::InvalidState);
            };
            let foreign = self.owner(&control, line).filter(|&(owner, _)| owner != core);
            if let Some((owner, _)) = foreign {
                task_log!(self, warn, "[GPIO] add {}: registered on {owner}", GpioNum(line));
                return Err(IsrError::InvalidState);
            }

            // A line that is already live keeps its pending status.
            let was_live = table.is_soft_enabled(line);
            self.hw.set_trigger(line, trigger);
            {
                let _masked = VectorMaskGuard::new(&self.hw, core);
                if !was_live {
                    self.hw.clear_status(LineMask::single(line));
                }
                // SAFETY: on the owning core, vector masked, control lock held
                unsafe { table.register(line, handler, trigger.is_edge()) };
            }
            self.hw.enable_interrupt(line, core);
        }

        task_log!(self, debug, "[GPIO] {core}: added {} ({trigger:?})", GpioNum(line));
        handler.on_register(GpioNum(line));
        Ok(())
    }

    /// Unregisters `line` from the calling core's table.
    pub fn remove(&self, line: GpioNum) -> Result<(), IsrError> {
        let line = self.validate(line)?;
        let core = current_core();
        let control = self.control.lock();
        let Some(table) = self.table(&control, core) else {
            task_log!(self, warn, "[GPIO] remove {}: not installed on {core}", GpioNum(line));
            return Err(IsrError::InvalidState);
        };
        if !table.is_registered(line) {
            task_log!(self, warn, "[GPIO] remove {}: not registered on {core}", GpioNum(line));
            return Err(IsrError::InvalidState);
        }

        self.hw.disable_interrupt(line);
        {
            let _masked = VectorMaskGuard::new(&self.hw, core);
            // SAFETY: on the owning core, vector masked, control lock held
            unsafe { table.unregister(line) };
        }

        task_log!(self, debug, "[GPIO] {core}: removed {}", GpioNum(line));
        Ok(())
    }

    /// Re-enables a registered line on whichever core owns it.
    ///
    /// A status bit latched while the line was disabled is discarded first.
    /// Enabling a line that is already enabled leaves its status alone.
    pub fn enable(&self, line: GpioNum) -> Result<(), IsrError> {
        let line = self.validate(line)?;
        let control = self.control.lock();
        let Some((owner, table)) = self.owner(&control, line) else {
            task_log!(self, warn, "[GPIO] enable {}: no handler registered", GpioNum(line));
            return Err(IsrError::InvalidState);
        };

        if !table.is_soft_enabled(line) {
            self.hw.clear_status(LineMask::single(line));
            table.set_soft_enabled(line, true);
        }
        self.hw.enable_interrupt(line, owner);

        task_log!(self, debug, "[GPIO] {owner}: enabled {}", GpioNum(line));
        Ok(())
    }

    /// Stops dispatch of `line` before returning, even for a status bit that
    /// is already latched.
    ///
    /// From task context this also waits for a vector pass already running
    /// on the owning core, which may have checked the line before the bit was
    /// cleared. A callback disabling a line of another core does not wait,
    /// so that two cores disabling each other's lines cannot deadlock.
    ///
    /// An unregistered line only has its hardware bit cleared, which needs
    /// the calling core to be installed.
    pub fn disable(&self, line: GpioNum) -> Result<(), IsrError> {
        let line = self.validate(line)?;
        let core = current_core();
        let control = self.control.lock();
        let owner = match self.owner(&control, line) {
            Some((owner, table)) => {
                table.set_soft_enabled(line, false);
                self.hw.disable_interrupt(line);
                task_log!(self, debug, "[GPIO] {owner}: disabled {}", GpioNum(line));
                Some(owner)
            }
            None if self.table(&control, core).is_some() => {
                self.hw.disable_interrupt(line);
                None
            }
            None => {
                task_log!(self, warn, "[GPIO] disable {}: not installed on {core}", GpioNum(line));
                return Err(IsrError::InvalidState);
            }
        };
        drop(control);

        if let Some(owner) = owner.filter(|_| !self.in_interrupt()) {
            self.wait_for_pass(owner);
        }
        Ok(())
    }

    /// Programs the hardware trigger of `line` without touching its
    /// registration. Works in any service state.
    pub fn set_trigger(&self, line: GpioNum, trigger: TriggerKind) -> Result<(), IsrError> {
        let line = self.validate(line)?;
        let control = self.control.lock();
        self.hw.set_trigger(line, trigger);
        if let Some((_, table)) = self.owner(&control, line) {
            table.set_clear_on_entry(line, trigger.is_edge());
        }
        Ok(())
    }

    /// Callbacks run for `line` since it was last added, or `None` if it is
    /// not registered.
    pub fn dispatch_count(&self, line: GpioNum) -> Option<usize> {
        let control = self.control.lock();
        let (_, table) = self.owner(&control, line.get())?;
        table.dispatch_count(line.get())
    }

    pub fn is_installed(&self) -> bool {
        self.is_installed_on(current_core())
    }

    pub fn is_installed_on(&self, core: CoreId) -> bool {
        !self.tables[core.index()].load(Ordering::Acquire).is_null()
    }

    /// Bytes currently held by dispatch tables.
    pub fn table_bytes(&self) -> usize {
        self.control.lock().bytes_in_use()
    }

    /// Caps the bytes dispatch tables may hold; installs beyond it fail with
    /// [`IsrError::NoMemory`].
    pub fn set_table_budget(&self, budget: Option<usize>) {
        self.control.lock().set_budget(budget);
    }

    /// Runs one pass of `core`'s shared vector. Returns the number of
    /// callbacks run; zero if the core is not installed.
    pub fn handle_vector(&self, core: CoreId) -> usize {
        let table = self.tables[core.index()].load(Ordering::Acquire);
        // SAFETY: a table is only freed by its own core with the vector
        // unbound and interrupts masked, so it outlives this pass.
        let Some(table) = (unsafe { table.as_ref() }) else {
            return 0;
        };

        let in_dispatch = &self.in_dispatch[core.index()];
        in_dispatch.store(true, Ordering::SeqCst);
        // Pairs with the fence in wait_for_pass: either disable sees this
        // pass running or the pass sees the cleared soft bit.
        fence(Ordering::SeqCst);
        let dispatched = dispatch::run(table, &self.hw);
        in_dispatch.store(false, Ordering::SeqCst);
        dispatched
    }

    fn in_interrupt(&self) -> bool {
        self.in_dispatch[current_core().index()].load(Ordering::Relaxed)
    }

    /// Spins until no vector pass is running on `core`.
    fn wait_for_pass(&self, core: CoreId) {
        fence(Ordering::SeqCst);
        while self.in_dispatch[core.index()].load(Ordering::SeqCst) {
            core::hint::spin_loop();
        }
    }

    fn validate(&self, line: GpioNum) -> Result<u32, IsrError> {
        let n = line.get();
        let valid = (n as usize) < MAX_LINES
            && n < self.hw.line_count()
            && self.hw.valid_lines().contains(n);
        if valid {
            Ok(n)
        } else {
            task_log!(self, warn, "[GPIO] {line} is not a valid line");
            Err(IsrError::InvalidArg)
        }
    }

    /// `core`'s table, valid for as long as the control lock is held.
    fn table<'a>(
        &'a self,
        _control: &'a ControlGuard<'_>,
        core: CoreId,
    ) -> Option<&'a DispatchTable> {
        let table = self.tables[core.index()].load(Ordering::Acquire);
        // SAFETY: tables are only freed under the control lock
        unsafe { table.as_ref() }
    }

    /// The core whose table has `line` registered.
    fn owner<'a>(
        &'a self,
        control: &'a ControlGuard<'_>,
        line: u32,
    ) -> Option<(CoreId, &'a DispatchTable)> {
        CoreId::all().find_map(|core| {
            self.table(control, core)
                .filter(|table| table.is_registered(line))
                .map(|table| (core, table))
        })
    }

    /// Disables, unbinds and frees `core`'s table. Returns whether there was
    /// one.
    fn teardown(&self, control: &mut ControlGuard<'_>, core: CoreId) -> bool {
        let Some(table) = NonNull::new(self.tables[core.index()].load(Ordering::Acquire)) else {
            return false;
        };

        self.hw.set_vector_masked(core, true);
        // SAFETY: still published; freed only below
        for line in unsafe { table.as_ref() }.registered() {
            self.hw.disable_interrupt(line);
        }
        self.hw.unbind_vector(core);
        self.tables[core.index()].store(ptr::null_mut(), Ordering::Release);

        // SAFETY: unpublished with the vector unbound, under the control lock
        unsafe { control.release(table) };
        true
    }
}

impl<H: GpioInterruptHw> VectorHandler for GpioIsrService<H> {
    fn on_vector(&self, core: CoreId) {
        self.handle_vector(core);
    }
}

impl<H: GpioInterruptHw> Drop for GpioIsrService<H> {
    fn drop(&mut self) {
        let mut control = self.control.lock();
        for core in CoreId::all() {
            self.teardown(&mut control, core);
        }
    }
}
