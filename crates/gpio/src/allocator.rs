//! Storage for dispatch tables.
//!
//! A table is allocated once per install and freed once per uninstall; it is
//! never resized. Allocation is fallible and byte-accounted, with an optional
//! budget that makes it fail early.

use alloc::alloc::{Layout, alloc, dealloc};
use core::ptr::{self, NonNull};

use pinirq_hal::CoreId;

use crate::IsrError;
use crate::registry::DispatchTable;

pub(crate) struct TableAllocator {
    in_use: usize,
    budget: Option<usize>,
}

impl TableAllocator {
    const LAYOUT: Layout = Layout::new::<DispatchTable>();

    pub const fn new() -> Self {
        Self {
            in_use: 0,
            budget: None,
        }
    }

    pub const fn bytes_in_use(&self) -> usize {
        self.in_use
    }

    pub fn set_budget(&mut self, budget: Option<usize>) {
        self.budget = budget;
    }

    /// Allocates an empty table owned by `owner`.
    pub fn allocate(&mut self, owner: CoreId) -> Result<NonNull<DispatchTable>, IsrError> {
        let size = Self::LAYOUT.size();
        if self.budget.is_some_and(|budget| self.in_use + size > budget) {
            return Err(IsrError::NoMemory);
        }

        // SAFETY: the layout has non-zero size
        let raw = unsafe { alloc(Self::LAYOUT) }.cast::<DispatchTable>();
        let table = NonNull::new(raw).ok_or(IsrError::NoMemory)?;
        // SAFETY: freshly allocated with the layout of DispatchTable
        unsafe { table.as_ptr().write(DispatchTable::new(owner)) };

        self.in_use += size;
        Ok(table)
    }

    /// Frees a table returned by [`allocate`](Self::allocate).
    ///
    /// # Safety
    /// `table` must come from this allocator, must not be freed twice, and no
    /// reference to it may be alive.
    pub unsafe fn release(&mut self, table: NonNull<DispatchTable>) {
        // SAFETY: guaranteed by the caller
        unsafe {
            ptr::drop_in_place(table.as_ptr());
            dealloc(table.as_ptr().cast(), Self::LAYOUT);
        }
        self.in_use = self.in_use.saturating_sub(Self::LAYOUT.size());
    }
}
