//! The shared vector pass.
//!
//! Runs in interrupt context: no locks, no allocation, no logging on the
//! normal path.

use pinirq_hal::GpioInterruptHw;
use pinirq_utils::LineMask;

use crate::line::GpioNum;
use crate::registry::DispatchTable;

/// Dispatches every latched, soft-enabled line of `table` once, in ascending
/// line order. Returns the number of callbacks run.
///
/// Lines whose raw status latched while soft-disabled are left latched and
/// never dispatched. Edge lines are cleared before their callback so an edge
/// raised during it latches again; level lines are cleared after, so a
/// callback that removes the condition does not re-fire.
#[allow(clippy::panic)]
pub(crate) fn run<H: GpioInterruptHw>(table: &DispatchTable, hw: &H) -> usize {
    let active = hw.raw_status() & table.soft_enabled();
    let mut dispatched = 0;

    for line in active {
        // An earlier callback of this pass may have disabled it.
        if !table.is_soft_enabled(line) {
            continue;
        }
        let Some(handler) = table.handler(line) else {
            log::error!(
                "[GPIO] {}: line {} soft-enabled with no handler",
                table.owner(),
                line
            );
            panic!("GPIO dispatch table corrupted");
        };

        let status = LineMask::single(line);
        let clear_on_entry = table.clears_on_entry(line);
        if clear_on_entry {
            hw.clear_status(status);
        }
        table.record_dispatch(line);
        handler.handle(GpioNum(line));
        if !clear_on_entry {
            hw.clear_status(status);
        }
        dispatched += 1;
    }

    dispatched
}
