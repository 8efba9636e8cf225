use std::any::Any;
use std::fmt;
use std::ptr::{self, NonNull};

use crate::error::AllocError;

/// Alignment of the most strictly aligned scalar on mainstream 64-bit
/// targets (`max_align_t`). Used as the default adaptor maximum and as the
/// natural-alignment cap of the new/delete resource.
pub const DEFAULT_MAX_ALIGN: usize = 16;

/// A strategy for obtaining raw memory, used through `&dyn MemoryResource`.
///
/// Callers never own the resource they allocate from; they hold a shared
/// reference and must return every block to the resource that produced it.
///
/// # Examples
///
/// ```rust
/// use memres::{new_delete_resource, MemoryResource};
///
/// let resource = new_delete_resource();
/// let block = resource.allocate(100, 32).unwrap();
/// assert_eq!(block.as_ptr() as usize % 32, 0);
/// unsafe { resource.deallocate(block, 100, 32) };
/// ```
pub trait MemoryResource: Any + Send + Sync + 'static {
    /// Returns at least `bytes` bytes aligned to `alignment`.
    ///
    /// An `alignment` of `0` asks for the natural alignment of `bytes` (its
    /// lowest set bit), capped at the resource's maximum.
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block to the resource.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on a resource equal to `self`, called
    /// with exactly this `bytes` and `alignment`, and must not have been
    /// deallocated since.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, alignment: usize);

    /// Whether memory from `self` can be released through `other` and vice
    /// versa.
    fn is_equal(&self, other: &dyn MemoryResource) -> bool;

    /// Concrete-type view used by `is_equal` implementations to downcast.
    fn as_any(&self) -> &dyn Any;

    /// Human-readable name of the concrete resource type.
    fn type_label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Whether `a` and `b` are the same resource object.
///
/// Zero-sized resources may share an address, so the concrete type is
/// compared as well.
pub fn same_object(a: &dyn MemoryResource, b: &dyn MemoryResource) -> bool {
    ptr::addr_eq(a, b) && a.as_any().type_id() == b.as_any().type_id()
}

impl PartialEq for dyn MemoryResource {
    fn eq(&self, other: &Self) -> bool {
        same_object(self, other) || self.is_equal(other)
    }
}

impl fmt::Debug for dyn MemoryResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryResource")
            .field("type", &self.type_label())
            .field("addr", &(self as *const dyn MemoryResource as *const ()))
            .finish()
    }
}

/// The alignment implied by `bytes`: its lowest set bit, capped at `max`.
/// Zero bytes has no set bit and resolves to `max`.
#[inline]
pub const fn natural_alignment(bytes: usize, max: usize) -> usize {
    if bytes == 0 {
        return max;
    }
    let lowest = bytes & bytes.wrapping_neg();
    if lowest > max {
        max
    } else {
        lowest
    }
}

/// Applies the `0` → natural rule and validates the result against `max`.
pub fn resolve_alignment(bytes: usize, alignment: usize, max: usize) -> Result<usize, AllocError> {
    let alignment = if alignment == 0 {
        natural_alignment(bytes, max)
    } else {
        alignment
    };

    if !alignment.is_power_of_two() {
        return Err(AllocError::InvalidAlignment(alignment));
    }
    if alignment > max {
        return Err(AllocError::UnsupportedAlignment { alignment, max });
    }
    Ok(alignment)
}
