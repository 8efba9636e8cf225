//! Typed allocation through a `&dyn MemoryResource`.
//!
//! [`PolymorphicAllocator`] is the typed face of a resource: containers hold
//! one and never see the concrete resource type. [`PmrBox`] is the smallest
//! such container, and carries the propagation policies that decide which
//! resource a copy or a relocation ends up on.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use crate::backend::array_layout;
use crate::error::AllocError;
use crate::registry::get_default_resource;
use crate::resource::MemoryResource;

/// Which resource a copy of a container allocates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyPolicy {
    /// The copy uses the process-wide default resource.
    #[default]
    ResetToDefault,
    /// The copy shares the source's resource.
    Propagate,
}

/// What happens to the resource when a container is relocated onto another
/// allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovePolicy {
    /// Keep the source's resource and storage; the target is ignored.
    #[default]
    Adopt,
    /// Switch to the target's resource, keeping the storage if the two
    /// resources compare equal and copying into fresh storage otherwise.
    CompareOrCopy,
}

/// Allocator for `T` that forwards to a borrowed [`MemoryResource`].
///
/// Cheap to copy. Two allocators compare equal when their resources do,
/// whatever their element types.
///
/// # Examples
///
/// ```rust
/// use memres::{MemoryResource, PolymorphicAllocator, ResourceAdaptor, SystemAlloc};
///
/// let resource: ResourceAdaptor<SystemAlloc, 64> = ResourceAdaptor::default();
/// let alloc = PolymorphicAllocator::<u64>::new(&resource);
///
/// let values = alloc.allocate(8).unwrap();
/// assert_eq!(values.as_ptr() as usize % 8, 0);
/// unsafe { alloc.deallocate(values, 8) };
///
/// let bytes = alloc.rebind::<u8>();
/// assert_eq!(bytes, alloc);
/// ```
pub struct PolymorphicAllocator<'r, T> {
    resource: &'r dyn MemoryResource,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T> PolymorphicAllocator<'r, T> {
    pub fn new(resource: &'r dyn MemoryResource) -> Self {
        Self {
            resource,
            _marker: PhantomData,
        }
    }

    pub fn resource(&self) -> &'r dyn MemoryResource {
        self.resource
    }

    /// Same resource, different element type.
    pub fn rebind<U>(&self) -> PolymorphicAllocator<'r, U> {
        PolymorphicAllocator::new(self.resource)
    }

    /// Uninitialised storage for `n` values of `T`.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let layout = array_layout::<T>(n)?;
        self.resource
            .allocate(layout.size(), layout.align())
            .map(NonNull::cast)
    }

    /// # Safety
    ///
    /// `ptr` must come from `allocate(n)` on an allocator equal to this one,
    /// and any values in it must already have been dropped.
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        let Ok(layout) = array_layout::<T>(n) else {
            return;
        };
        unsafe {
            self.resource
                .deallocate(ptr.cast(), layout.size(), layout.align())
        }
    }

    /// Raw bytes, with `0` asking for natural alignment.
    pub fn allocate_bytes(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError> {
        self.resource.allocate(bytes, alignment)
    }

    /// # Safety
    ///
    /// Same contract as [`MemoryResource::deallocate`].
    pub unsafe fn deallocate_bytes(&self, ptr: NonNull<u8>, bytes: usize, alignment: usize) {
        unsafe { self.resource.deallocate(ptr, bytes, alignment) }
    }

    /// Allocates one `T` and moves `value` into it. The value is dropped if
    /// the allocation fails.
    pub fn new_object(&self, value: T) -> Result<NonNull<T>, AllocError> {
        let ptr = self.allocate(1)?;
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    /// Drops the value behind `ptr` and returns its storage.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `new_object` on an allocator equal to this one
    /// and must not be used afterwards.
    pub unsafe fn delete_object(&self, ptr: NonNull<T>) {
        unsafe {
            ptr::drop_in_place(ptr.as_ptr());
            self.deallocate(ptr, 1);
        }
    }

    /// The allocator a copy of a container using `self` should get.
    pub fn select_on_copy(&self, policy: CopyPolicy) -> Self {
        match policy {
            CopyPolicy::Propagate => *self,
            CopyPolicy::ResetToDefault => Self::new(get_default_resource()),
        }
    }
}

impl<T> Default for PolymorphicAllocator<'static, T> {
    /// An allocator on the current default resource.
    fn default() -> Self {
        Self::new(get_default_resource())
    }
}

impl<T> Clone for PolymorphicAllocator<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PolymorphicAllocator<'_, T> {}

impl<'r, T> From<&'r dyn MemoryResource> for PolymorphicAllocator<'r, T> {
    fn from(resource: &'r dyn MemoryResource) -> Self {
        Self::new(resource)
    }
}

impl<T, U> PartialEq<PolymorphicAllocator<'_, U>> for PolymorphicAllocator<'_, T> {
    fn eq(&self, other: &PolymorphicAllocator<'_, U>) -> bool {
        *self.resource == *other.resource
    }
}

impl<T> fmt::Debug for PolymorphicAllocator<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolymorphicAllocator")
            .field("value_type", &std::any::type_name::<T>())
            .field("resource", &self.resource)
            .finish()
    }
}

/// A single heap value owned through a [`PolymorphicAllocator`].
///
/// # Examples
///
/// ```rust
/// use memres::{
///     CopyPolicy, MovePolicy, PmrBox, PolymorphicAllocator, ResourceAdaptor, TrackingAlloc,
/// };
///
/// let first: ResourceAdaptor<TrackingAlloc> = ResourceAdaptor::default();
/// let second: ResourceAdaptor<TrackingAlloc> = ResourceAdaptor::default();
///
/// let mut boxed = PmrBox::new_in(String::from("pmr"), PolymorphicAllocator::new(&first))
///     .unwrap()
///     .with_policies(CopyPolicy::Propagate, MovePolicy::CompareOrCopy);
///
/// boxed.relocate(PolymorphicAllocator::new(&second)).unwrap();
/// assert_eq!(*boxed, "pmr");
/// assert_eq!(first.backend().stats().live_blocks, 0);
/// assert_eq!(second.backend().stats().live_blocks, 1);
/// ```
pub struct PmrBox<'r, T> {
    ptr: NonNull<T>,
    alloc: PolymorphicAllocator<'r, T>,
    copy_policy: CopyPolicy,
    move_policy: MovePolicy,
    _owns: PhantomData<T>,
}

unsafe impl<T: Send> Send for PmrBox<'_, T> {}
unsafe impl<T: Sync> Sync for PmrBox<'_, T> {}

impl<'r, T> PmrBox<'r, T> {
    /// Moves `value` into storage from `alloc`, with the default policies.
    pub fn new_in(value: T, alloc: PolymorphicAllocator<'r, T>) -> Result<Self, AllocError> {
        let ptr = alloc.new_object(value)?;
        Ok(Self {
            ptr,
            alloc,
            copy_policy: CopyPolicy::default(),
            move_policy: MovePolicy::default(),
            _owns: PhantomData,
        })
    }

    pub fn with_policies(mut self, copy_policy: CopyPolicy, move_policy: MovePolicy) -> Self {
        self.copy_policy = copy_policy;
        self.move_policy = move_policy;
        self
    }

    pub fn allocator(&self) -> PolymorphicAllocator<'r, T> {
        self.alloc
    }

    pub fn copy_policy(&self) -> CopyPolicy {
        self.copy_policy
    }

    pub fn move_policy(&self) -> MovePolicy {
        self.move_policy
    }

    /// Copies the value onto the allocator picked by the copy policy. The
    /// copy keeps both policies.
    pub fn try_clone(&self) -> Result<Self, AllocError>
    where
        T: Clone,
    {
        let alloc = self.alloc.select_on_copy(self.copy_policy);
        Ok(Self::new_in((**self).clone(), alloc)?
            .with_policies(self.copy_policy, self.move_policy))
    }

    /// Moves the box onto `target` as its move policy dictates.
    ///
    /// Under [`MovePolicy::Adopt`] nothing changes. Under
    /// [`MovePolicy::CompareOrCopy`] the box switches to `target`; the value
    /// only moves if the two resources differ. If `target` cannot provide
    /// storage the box is left untouched.
    pub fn relocate(&mut self, target: PolymorphicAllocator<'r, T>) -> Result<(), AllocError> {
        match self.move_policy {
            MovePolicy::Adopt => Ok(()),
            MovePolicy::CompareOrCopy if self.alloc == target => {
                self.alloc = target;
                Ok(())
            }
            MovePolicy::CompareOrCopy => {
                let fresh = target.allocate(1)?;
                unsafe {
                    ptr::copy_nonoverlapping(self.ptr.as_ptr(), fresh.as_ptr(), 1);
                    self.alloc.deallocate(self.ptr, 1);
                }
                self.ptr = fresh;
                self.alloc = target;
                Ok(())
            }
        }
    }

    /// Moves the value out and returns the storage.
    pub fn into_inner(self) -> T {
        let this = std::mem::ManuallyDrop::new(self);
        unsafe {
            let value = this.ptr.as_ptr().read();
            this.alloc.deallocate(this.ptr, 1);
            value
        }
    }
}

impl<T> Deref for PmrBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PmrBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for PmrBox<'_, T> {
    fn drop(&mut self) {
        unsafe { self.alloc.delete_object(self.ptr) }
    }
}

impl<T: fmt::Debug> fmt::Debug for PmrBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PmrBox")
            .field("value", &**self)
            .field("resource", &self.alloc.resource())
            .finish()
    }
}
