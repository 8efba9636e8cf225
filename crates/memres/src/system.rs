//! Resources that need no backend: the global allocator and the always-empty
//! resource.

use std::alloc::{self, Layout};
use std::any::Any;
use std::ptr::{self, NonNull};

use tracing::error;

use crate::error::AllocError;
use crate::resource::{natural_alignment, MemoryResource, DEFAULT_MAX_ALIGN};

pub(crate) static NEW_DELETE: NewDeleteResource = NewDeleteResource;
static NULL: NullResource = NullResource;

/// Resource that goes straight to the global allocator.
///
/// Accepts any power-of-two alignment. The natural alignment used for `0` is
/// capped at [`DEFAULT_MAX_ALIGN`]. All instances are interchangeable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewDeleteResource;

impl NewDeleteResource {
    fn layout(bytes: usize, alignment: usize) -> Result<Layout, AllocError> {
        let alignment = if alignment == 0 {
            natural_alignment(bytes, DEFAULT_MAX_ALIGN)
        } else {
            alignment
        };
        if !alignment.is_power_of_two() {
            return Err(AllocError::InvalidAlignment(alignment));
        }
        Layout::from_size_align(bytes, alignment)
            .map_err(|_| AllocError::CapacityOverflow { bytes, alignment })
    }
}

impl MemoryResource for NewDeleteResource {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError> {
        let layout = Self::layout(bytes, alignment)?;
        if layout.size() == 0 {
            // Well-aligned, never dereferenced, never passed to the allocator.
            let dangling = ptr::null_mut::<u8>().wrapping_add(layout.align());
            return NonNull::new(dangling).ok_or(AllocError::Exhausted);
        }

        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::OutOfMemory {
            bytes,
            alignment: layout.align(),
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, alignment: usize) {
        let Ok(layout) = Self::layout(bytes, alignment) else {
            error!(bytes, alignment, "deallocate with an invalid layout");
            return;
        };
        if layout.size() == 0 {
            return;
        }
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
    }

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        other.as_any().is::<NewDeleteResource>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Resource that never hands out memory.
///
/// Useful as a default when any allocation would be a bug.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResource;

impl MemoryResource for NullResource {
    fn allocate(&self, _bytes: usize, _alignment: usize) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError::Exhausted)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _bytes: usize, _alignment: usize) {}

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        other.as_any().is::<NullResource>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The process-wide global-allocator resource.
pub fn new_delete_resource() -> &'static dyn MemoryResource {
    &NEW_DELETE
}

/// The process-wide resource whose allocations always fail.
pub fn null_memory_resource() -> &'static dyn MemoryResource {
    &NULL
}
