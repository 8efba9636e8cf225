//! Process-wide default resource.
//!
//! A single atomic pointer, null until first use. The first reader installs
//! the new/delete resource with a compare-and-swap; `set_default_resource`
//! swaps in a replacement. Writers are "last write wins": code that already
//! fetched the previous default keeps using it.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::resource::{same_object, MemoryResource};
use crate::system::{new_delete_resource, NEW_DELETE};

/// Thin holder for a fat `&dyn` so it fits in an `AtomicPtr`.
struct Slot(&'static dyn MemoryResource);

static NEW_DELETE_SLOT: Slot = Slot(&NEW_DELETE);

static DEFAULT: AtomicPtr<Slot> = AtomicPtr::new(ptr::null_mut());

/// Every slot ever published, one per distinct resource. Slots are never
/// freed since a reader may have loaded one just before it was replaced.
static SLOTS: Mutex<Vec<&'static Slot>> = Mutex::new(Vec::new());

fn new_delete_slot() -> *mut Slot {
    // Never written through; `AtomicPtr` just wants a `*mut`.
    ptr::addr_of!(NEW_DELETE_SLOT).cast_mut()
}

/// Every non-null pointer in `DEFAULT` is a `'static` slot.
unsafe fn read_slot(slot: *mut Slot) -> &'static dyn MemoryResource {
    unsafe { (*slot).0 }
}

/// The slot holding `resource`, allocated the first time it is installed.
fn slot_for(resource: &'static dyn MemoryResource) -> *mut Slot {
    if same_object(resource, new_delete_resource()) {
        return new_delete_slot();
    }

    let mut slots = SLOTS.lock().unwrap_or_else(PoisonError::into_inner);
    let slot = match slots.iter().copied().find(|slot| same_object(slot.0, resource)) {
        Some(slot) => slot,
        None => {
            let slot: &'static Slot = Box::leak(Box::new(Slot(resource)));
            slots.push(slot);
            slot
        }
    };
    slot as *const Slot as *mut Slot
}

/// Returns the current default resource, installing the new/delete resource
/// on first use.
///
/// Concurrent first calls race on a compare-and-swap; all of them return the
/// same resource.
pub fn get_default_resource() -> &'static dyn MemoryResource {
    let mut slot = DEFAULT.load(Ordering::Acquire);

    if slot.is_null() {
        slot = match DEFAULT.compare_exchange(
            ptr::null_mut(),
            new_delete_slot(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!("installed new/delete resource as the default");
                new_delete_slot()
            }
            Err(current) => current,
        };
    }

    unsafe { read_slot(slot) }
}

/// Replaces the default resource and returns the previous one.
///
/// `None` reinstalls the new/delete resource. If no default had been set or
/// read yet, the previous value reported is the new/delete resource.
///
/// The first install of a resource other than new/delete retains one
/// pointer-sized slot for the rest of the process. Installing the same
/// resource again reuses it, so guards can be cycled freely.
pub fn set_default_resource(
    resource: Option<&'static dyn MemoryResource>,
) -> &'static dyn MemoryResource {
    let slot = slot_for(resource.unwrap_or_else(new_delete_resource));

    let previous = DEFAULT.swap(slot, Ordering::AcqRel);
    debug!(
        resource = unsafe { read_slot(slot) }.type_label(),
        "default resource replaced"
    );

    if previous.is_null() {
        new_delete_resource()
    } else {
        unsafe { read_slot(previous) }
    }
}

/// Installs a default resource for the guard's lifetime and restores the
/// previous one on drop.
///
/// # Examples
///
/// ```rust
/// use memres::{get_default_resource, null_memory_resource, DefaultResourceGuard};
///
/// {
///     let _guard = DefaultResourceGuard::install(null_memory_resource());
///     assert!(get_default_resource().allocate(8, 8).is_err());
/// }
/// assert!(get_default_resource().allocate(8, 8).is_ok_and(|block| {
///     unsafe { get_default_resource().deallocate(block, 8, 8) };
///     true
/// }));
/// ```
pub struct DefaultResourceGuard {
    previous: &'static dyn MemoryResource,
}

impl DefaultResourceGuard {
    pub fn install(resource: &'static dyn MemoryResource) -> Self {
        Self {
            previous: set_default_resource(Some(resource)),
        }
    }

    /// The default that will be restored.
    pub fn previous(&self) -> &'static dyn MemoryResource {
        self.previous
    }
}

impl Drop for DefaultResourceGuard {
    fn drop(&mut self) {
        set_default_resource(Some(self.previous));
    }
}
