use std::alloc::{self, Layout};
use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{array_layout, ArrayAlloc, Backend};
use crate::chunk::ChunkClass;
use crate::error::AllocError;

/// Alignment of the arena's own buffer.
const ARENA_ALIGN: usize = 4096;

struct Arena {
    base: NonNull<u8>,
    capacity: usize,
    /// Bytes handed out so far, measured from `base`.
    offset: AtomicUsize,
}

// The buffer is only reached through `offset`, which is atomic.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        let base = if capacity == 0 {
            NonNull::<u8>::dangling()
        } else {
            let layout = Self::layout(capacity)?;
            let ptr = unsafe { alloc::alloc(layout) };
            NonNull::new(ptr).ok_or(AllocError::OutOfMemory {
                bytes: capacity,
                alignment: ARENA_ALIGN,
            })?
        };

        Ok(Self {
            base,
            capacity,
            offset: AtomicUsize::new(0),
        })
    }

    fn layout(capacity: usize) -> Result<Layout, AllocError> {
        Layout::from_size_align(capacity, ARENA_ALIGN).map_err(|_| AllocError::CapacityOverflow {
            bytes: capacity,
            alignment: ARENA_ALIGN,
        })
    }

    fn bump(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let out_of_memory = AllocError::OutOfMemory {
            bytes: layout.size(),
            alignment: layout.align(),
        };
        let base_addr = self.base.as_ptr() as usize;

        let mut current = self.offset.load(Ordering::Relaxed);
        loop {
            let start = base_addr
                .checked_add(current)
                .and_then(|addr| addr.checked_next_multiple_of(layout.align()))
                .ok_or(out_of_memory)?;
            let start_offset = start - base_addr;
            let end_offset = start_offset
                .checked_add(layout.size())
                .filter(|end| *end <= self.capacity)
                .ok_or(out_of_memory)?;

            match self.offset.compare_exchange_weak(
                current,
                end_offset,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    let ptr = unsafe { self.base.as_ptr().add(start_offset) };
                    return NonNull::new(ptr).ok_or(out_of_memory);
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Rolls the bump offset back if `[ptr, ptr + size)` is the most recent
    /// block. Anything else stays allocated until the arena is dropped.
    fn release(&self, ptr: NonNull<u8>, size: usize) {
        let start_offset = (ptr.as_ptr() as usize).wrapping_sub(self.base.as_ptr() as usize);
        let end_offset = start_offset.wrapping_add(size);
        let _ = self.offset.compare_exchange(
            end_offset,
            start_offset,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(layout) = Self::layout(self.capacity) {
            unsafe { alloc::dealloc(self.base.as_ptr(), layout) }
        }
    }
}

/// Fixed-capacity bump arena shared by every clone of the handle.
///
/// Allocation advances a shared offset with a CAS loop; deallocation only
/// reclaims space when it frees the most recently allocated block. The buffer
/// is returned to the system when the last handle is dropped.
#[derive(Clone)]
pub struct ArenaAlloc {
    arena: Arc<Arena>,
}

impl ArenaAlloc {
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        Ok(Self {
            arena: Arc::new(Arena::with_capacity(capacity)?),
        })
    }

    pub fn capacity(&self) -> usize {
        self.arena.capacity
    }

    /// Bytes consumed so far, including alignment padding.
    pub fn used(&self) -> usize {
        self.arena.offset.load(Ordering::Acquire)
    }

    pub fn remaining(&self) -> usize {
        self.capacity().saturating_sub(self.used())
    }
}

impl PartialEq for ArenaAlloc {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.arena, &other.arena)
    }
}

impl std::fmt::Debug for ArenaAlloc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaAlloc")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}

unsafe impl<T> ArrayAlloc<T> for ArenaAlloc {
    fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let layout = array_layout::<T>(n)?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        self.arena.bump(layout).map(NonNull::cast)
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        let size = n.saturating_mul(size_of::<T>());
        debug_assert_eq!(ptr.as_ptr() as usize % align_of::<T>(), 0);
        if size == 0 {
            return;
        }
        self.arena.release(ptr.cast(), size);
    }
}

impl Backend for ArenaAlloc {
    type Rebound<C: ChunkClass> = ArenaAlloc;

    fn rebind<C: ChunkClass>(&self) -> ArenaAlloc {
        self.clone()
    }
}
