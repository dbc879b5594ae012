//! Host model of a GPIO interrupt block with one shared vector per core.
//!
//! `SimGpio` keeps, per line, the input level, trigger kind, enable bit and
//! core routing, plus the aggregate raw status latch. The latch follows the
//! silicon: it sets on a trigger whether or not the line's enable bit is set,
//! and a level line that is still asserted re-latches as soon as it is
//! cleared.
//!
//! Vector delivery is explicit. [`SimGpio::run_interrupts`] calls the bound
//! handler while the core's vector is asserted, with
//! [`current_core`](crate::cpu::current_core) reporting that core.

use std::vec::Vec;

use pinirq_utils::{LineMask, Mutex};

use crate::cpu::{self, CoreId, MAX_CORES};
use crate::traits::{GpioInterruptHw, HalError, TriggerKind, VectorFlags, VectorHandler};

/// Most vector deliveries a single `run_*` call makes to one core.
///
/// A line that is still asserted after this many deliveries is a storm.
pub const STORM_LIMIT: usize = 64;

#[derive(Clone, Copy, Debug, Default)]
struct SimLine {
    level: bool,
    trigger: TriggerKind,
    enabled: bool,
    route: Option<CoreId>,
    wired_to: Option<u32>,
}

#[derive(Clone, Copy, Debug)]
struct SimVector {
    bound: bool,
    masked: bool,
    flags: VectorFlags,
    free: u32,
    delivered: usize,
}

impl SimVector {
    const fn new() -> Self {
        Self {
            bound: false,
            masked: false,
            flags: VectorFlags::empty(),
            free: 1,
            delivered: 0,
        }
    }
}

struct SimState {
    lines: Vec<SimLine>,
    raw: LineMask,
    vectors: [SimVector; MAX_CORES],
}

impl SimState {
    fn line_mut(&mut self, line: u32) -> Option<&mut SimLine> {
        self.lines.get_mut(line as usize)
    }

    fn drive(&mut self, line: u32, level: bool) {
        let Some(l) = self.line_mut(line) else {
            return;
        };
        let prev = l.level;
        l.level = level;
        let latch = l.trigger.latches_edge(prev, level) || l.trigger.level_asserted(level);
        if latch {
            self.raw.insert(line);
        }
    }

    fn pending(&self, core: CoreId) -> LineMask {
        self.raw
            .iter()
            .filter(|&line| {
                self.lines
                    .get(line as usize)
                    .is_some_and(|l| l.enabled && l.route == Some(core))
            })
            .collect()
    }

    fn asserted(&self, core: CoreId) -> bool {
        let vector = &self.vectors[core.index()];
        vector.bound && !vector.masked && !self.pending(core).is_empty()
    }
}

/// Simulated GPIO interrupt block.
pub struct SimGpio {
    line_count: u32,
    valid: LineMask,
    cores: usize,
    state: Mutex<SimState>,
}

impl SimGpio {
    /// Block with `line_count` lines, of which `valid` may be used.
    pub fn new(line_count: u32, valid: LineMask) -> Self {
        let line_count = line_count.min(LineMask::CAPACITY);
        Self {
            line_count,
            valid: valid & LineMask::first(line_count),
            cores: MAX_CORES,
            state: Mutex::new(SimState {
                lines: vec![SimLine::default(); line_count as usize],
                raw: LineMask::EMPTY,
                vectors: [SimVector::new(); MAX_CORES],
            }),
        }
    }

    /// A 21-line block with line 19 reserved.
    pub fn esp8684() -> Self {
        let mut valid = LineMask::first(21);
        valid.remove(19);
        Self::new(21, valid)
    }

    /// Limits the block to the first `cores` cores; binding a vector on any
    /// other core fails with [`HalError::InvalidCore`].
    #[must_use]
    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores.clamp(1, MAX_CORES);
        self
    }

    /// Sets how many more vectors `core` can bind.
    pub fn set_free_vectors(&self, core: CoreId, free: u32) {
        self.state.lock().vectors[core.index()].free = free;
    }

    /// Connects line `from`'s level to line `to`, like a jumper between an
    /// output and an input. `to` takes `from`'s current level immediately.
    pub fn wire(&self, from: u32, to: u32) {
        let mut state = self.state.lock();
        let Some(level) = state.lines.get(from as usize).map(|l| l.level) else {
            return;
        };
        if let Some(l) = state.line_mut(from) {
            l.wired_to = Some(to);
        }
        state.drive(to, level);
    }

    /// Drives the input level of `line` and of the line wired to it.
    pub fn set_level(&self, line: u32, level: bool) {
        let mut state = self.state.lock();
        let wired = state.lines.get(line as usize).and_then(|l| l.wired_to);
        state.drive(line, level);
        if let Some(to) = wired {
            state.drive(to, level);
        }
    }

    pub fn level(&self, line: u32) -> bool {
        self.state.lock().lines.get(line as usize).is_some_and(|l| l.level)
    }

    pub fn trigger(&self, line: u32) -> TriggerKind {
        self.state
            .lock()
            .lines
            .get(line as usize)
            .map_or(TriggerKind::Disabled, |l| l.trigger)
    }

    pub fn interrupt_enabled(&self, line: u32) -> bool {
        self.state.lock().lines.get(line as usize).is_some_and(|l| l.enabled)
    }

    /// Core the line was last routed to.
    pub fn route(&self, line: u32) -> Option<CoreId> {
        self.state.lock().lines.get(line as usize).and_then(|l| l.route)
    }

    pub fn is_latched(&self, line: u32) -> bool {
        self.state.lock().raw.contains(line)
    }

    pub fn is_vector_bound(&self, core: CoreId) -> bool {
        self.state.lock().vectors[core.index()].bound
    }

    pub fn is_vector_masked(&self, core: CoreId) -> bool {
        self.state.lock().vectors[core.index()].masked
    }

    pub fn vector_flags(&self, core: CoreId) -> VectorFlags {
        self.state.lock().vectors[core.index()].flags
    }

    /// Total vector deliveries made to `core`.
    pub fn delivered(&self, core: CoreId) -> usize {
        self.state.lock().vectors[core.index()].delivered
    }

    /// Latched, enabled lines routed to `core`.
    pub fn pending(&self, core: CoreId) -> LineMask {
        self.state.lock().pending(core)
    }

    /// Whether `core`'s vector is currently asserted.
    pub fn asserted(&self, core: CoreId) -> bool {
        self.state.lock().asserted(core)
    }

    /// Delivers `core`'s vector to `handler` until it deasserts, at most
    /// [`STORM_LIMIT`] times. Returns the number of deliveries.
    pub fn run_interrupts(&self, core: CoreId, handler: &dyn VectorHandler) -> usize {
        self.deliver(core, handler, STORM_LIMIT)
    }

    /// Delivers on every core until none is asserted, at most
    /// [`STORM_LIMIT`] times per core. A callback on one core may assert
    /// another core's vector, so cores are revisited until all are quiet.
    pub fn run_all(&self, handler: &dyn VectorHandler) -> usize {
        let mut budget = [STORM_LIMIT; MAX_CORES];
        let mut total = 0;
        loop {
            let mut round = 0;
            for core in CoreId::all() {
                let n = self.deliver(core, handler, budget[core.index()]);
                budget[core.index()] -= n;
                round += n;
            }
            if round == 0 {
                return total;
            }
            total += round;
        }
    }

    fn deliver(&self, core: CoreId, handler: &dyn VectorHandler, budget: usize) -> usize {
        let mut count = 0;
        while count < budget && self.asserted(core) {
            self.state.lock().vectors[core.index()].delivered += 1;
            cpu::run_on_core(core, || handler.on_vector(core));
            count += 1;
        }
        count
    }

    /// Drives `line` and delivers whatever that asserts.
    pub fn drive(&self, line: u32, level: bool, handler: &dyn VectorHandler) -> usize {
        self.set_level(line, level);
        self.run_all(handler)
    }
}

impl GpioInterruptHw for SimGpio {
    fn line_count(&self) -> u32 {
        self.line_count
    }

    fn valid_lines(&self) -> LineMask {
        self.valid
    }

    fn set_trigger(&self, line: u32, kind: TriggerKind) {
        let mut state = self.state.lock();
        let Some(l) = state.line_mut(line) else {
            return;
        };
        l.trigger = kind;
        let level = l.level;
        if kind.level_asserted(level) {
            state.raw.insert(line);
        }
    }

    fn enable_interrupt(&self, line: u32, core: CoreId) {
        if let Some(l) = self.state.lock().line_mut(line) {
            l.enabled = true;
            l.route = Some(core);
        }
    }

    fn disable_interrupt(&self, line: u32) {
        if let Some(l) = self.state.lock().line_mut(line) {
            l.enabled = false;
        }
    }

    fn raw_status(&self) -> LineMask {
        self.state.lock().raw
    }

    fn clear_status(&self, lines: LineMask) {
        let mut state = self.state.lock();
        state.raw &= !lines;
        // Still-asserted level lines latch again right away.
        let rearmed: LineMask = lines
            .iter()
            .filter(|&line| {
                state
                    .lines
                    .get(line as usize)
                    .is_some_and(|l| l.trigger.level_asserted(l.level))
            })
            .collect();
        state.raw |= rearmed;
    }

    fn bind_vector(&self, core: CoreId, flags: VectorFlags) -> Result<(), HalError> {
        if core.index() >= self.cores {
            return Err(HalError::InvalidCore);
        }
        let mut state = self.state.lock();
        let vector = &mut state.vectors[core.index()];
        if vector.bound {
            return Ok(());
        }
        if vector.free == 0 {
            return Err(HalError::NoFreeVector);
        }
        vector.free -= 1;
        vector.bound = true;
        vector.masked = false;
        vector.flags = flags;
        Ok(())
    }

    fn unbind_vector(&self, core: CoreId) {
        let mut state = self.state.lock();
        let vector = &mut state.vectors[core.index()];
        if vector.bound {
            vector.bound = false;
            vector.masked = false;
            vector.flags = VectorFlags::empty();
            vector.free += 1;
        }
    }

    fn set_vector_masked(&self, core: CoreId, masked: bool) -> bool {
        let mut state = self.state.lock();
        core::mem::replace(&mut state.vectors[core.index()].masked, masked)
    }
}
