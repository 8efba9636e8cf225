//! Block allocators that a [`ResourceAdaptor`](crate::ResourceAdaptor) can wrap.
//!
//! A backend hands out arrays of a single element type. The adaptor never asks
//! it for bytes directly: it rebinds the backend to a [`ChunkClass`] and asks
//! for whole chunks, which is how one byte-oriented backend serves every
//! alignment.

use std::alloc::{self, Layout};
use std::mem::{align_of, size_of};
use std::ptr::NonNull;

use crate::chunk::ChunkClass;
use crate::error::AllocError;

mod arena;
mod tracking;

pub use arena::ArenaAlloc;
pub use tracking::{BlockRecord, TrackingAlloc, TrackingStats};

/// Allocates and frees arrays of `T`.
///
/// # Safety
///
/// A successful `allocate(n)` must return memory valid for reads and writes
/// of `n * size_of::<T>()` bytes, aligned to `align_of::<T>()`, that does not
/// overlap any other live allocation. A zero-sized request may return a
/// dangling, well-aligned pointer.
pub unsafe trait ArrayAlloc<T> {
    fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocError>;

    /// # Safety
    ///
    /// `ptr` must come from `allocate(n)` on this allocator or one equal to
    /// it, with the same `n`.
    unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize);
}

/// A byte-oriented backend that can be re-targeted at any chunk class.
///
/// `rebind` must share state with `self`: memory allocated through one
/// rebound handle may be freed through another rebound handle for the same
/// class, and two backends that compare equal may free each other's memory.
pub trait Backend: Clone + PartialEq + Send + Sync + 'static {
    type Rebound<C: ChunkClass>: ArrayAlloc<C>;

    fn rebind<C: ChunkClass>(&self) -> Self::Rebound<C>;
}

/// Layout of `[T; n]`, or the overflow it would cause.
pub(crate) fn array_layout<T>(n: usize) -> Result<Layout, AllocError> {
    Layout::array::<T>(n).map_err(|_| AllocError::CapacityOverflow {
        bytes: n.saturating_mul(size_of::<T>()),
        alignment: align_of::<T>(),
    })
}

/// Stateless backend on top of the global allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SystemAlloc;

unsafe impl<T> ArrayAlloc<T> for SystemAlloc {
    fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let layout = array_layout::<T>(n)?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }

        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr.cast::<T>()).ok_or(AllocError::OutOfMemory {
            bytes: layout.size(),
            alignment: layout.align(),
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        let Ok(layout) = array_layout::<T>(n) else {
            return;
        };
        if layout.size() == 0 {
            return;
        }

        unsafe { alloc::dealloc(ptr.as_ptr().cast::<u8>(), layout) }
    }
}

impl Backend for SystemAlloc {
    type Rebound<C: ChunkClass> = SystemAlloc;

    fn rebind<C: ChunkClass>(&self) -> SystemAlloc {
        *self
    }
}
