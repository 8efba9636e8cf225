use std::collections::HashMap;
use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::error;

use super::{ArrayAlloc, Backend, SystemAlloc};
use crate::chunk::ChunkClass;
use crate::error::AllocError;

/// Size and alignment of one live block, as the backend saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub addr: usize,
    pub size: usize,
    pub align: usize,
}

/// Snapshot of a [`TrackingAlloc`] ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStats {
    pub bytes_allocated: u64,
    pub bytes_freed: u64,
    pub blocks_allocated: u64,
    pub blocks_freed: u64,
    pub live_blocks: usize,
    pub live_bytes: usize,
    /// Deallocations whose size or alignment differed from the allocation.
    pub mismatches: u64,
}

#[derive(Default)]
struct Ledger {
    live: Mutex<HashMap<usize, BlockRecord>>,
    bytes_allocated: AtomicU64,
    bytes_freed: AtomicU64,
    blocks_allocated: AtomicU64,
    blocks_freed: AtomicU64,
    mismatches: AtomicU64,
}

impl Ledger {
    fn record_alloc(&self, block: BlockRecord) {
        self.bytes_allocated
            .fetch_add(block.size as u64, Ordering::Relaxed);
        self.blocks_allocated.fetch_add(1, Ordering::Relaxed);

        // Zero-sized blocks share dangling addresses; count them but keep
        // them out of the address map.
        if block.size > 0 {
            self.live
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(block.addr, block);
        }
    }

    fn record_dealloc(&self, block: BlockRecord) {
        self.bytes_freed
            .fetch_add(block.size as u64, Ordering::Relaxed);
        self.blocks_freed.fetch_add(1, Ordering::Relaxed);

        if block.size == 0 {
            return;
        }

        let recorded = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&block.addr);

        match recorded {
            Some(recorded) if recorded == block => {}
            Some(recorded) => {
                self.mismatches.fetch_add(1, Ordering::Relaxed);
                error!(
                    addr = block.addr,
                    allocated_size = recorded.size,
                    allocated_align = recorded.align,
                    freed_size = block.size,
                    freed_align = block.align,
                    "deallocation does not match its allocation"
                );
            }
            None => {
                self.mismatches.fetch_add(1, Ordering::Relaxed);
                error!(addr = block.addr, "deallocation of an unknown block");
            }
        }
    }
}

/// System-backed allocator that keeps a ledger of every live block.
///
/// Clones share the ledger, and two handles compare equal exactly when they
/// do. Useful to check that an adaptor routes each request to the expected
/// chunk class and that every block comes back with the size and alignment
/// it went out with.
///
/// # Examples
///
/// ```rust
/// use memres::{MemoryResource, ResourceAdaptor, TrackingAlloc};
///
/// let tracking = TrackingAlloc::new();
/// let resource: ResourceAdaptor<_, 64> = ResourceAdaptor::new(tracking.clone());
///
/// let block = resource.allocate(100, 32).unwrap();
/// assert_eq!(tracking.live_blocks()[0].size, 128);
/// assert_eq!(tracking.live_blocks()[0].align, 32);
///
/// unsafe { resource.deallocate(block, 100, 32) };
/// assert_eq!(tracking.stats().live_blocks, 0);
/// ```
#[derive(Clone, Default)]
pub struct TrackingAlloc {
    ledger: Arc<Ledger>,
}

impl TrackingAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> TrackingStats {
        let live = self
            .ledger
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        TrackingStats {
            bytes_allocated: self.ledger.bytes_allocated.load(Ordering::Relaxed),
            bytes_freed: self.ledger.bytes_freed.load(Ordering::Relaxed),
            blocks_allocated: self.ledger.blocks_allocated.load(Ordering::Relaxed),
            blocks_freed: self.ledger.blocks_freed.load(Ordering::Relaxed),
            live_blocks: live.len(),
            live_bytes: live.values().map(|b| b.size).sum(),
            mismatches: self.ledger.mismatches.load(Ordering::Relaxed),
        }
    }

    /// Live non-empty blocks, sorted by address.
    pub fn live_blocks(&self) -> Vec<BlockRecord> {
        let mut blocks: Vec<BlockRecord> = self
            .ledger
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .copied()
            .collect();
        blocks.sort_unstable_by_key(|b| b.addr);
        blocks
    }
}

impl PartialEq for TrackingAlloc {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ledger, &other.ledger)
    }
}

impl std::fmt::Debug for TrackingAlloc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingAlloc")
            .field("ledger", &Arc::as_ptr(&self.ledger))
            .field("stats", &self.stats())
            .finish()
    }
}

unsafe impl<T> ArrayAlloc<T> for TrackingAlloc {
    fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let ptr = ArrayAlloc::<T>::allocate(&SystemAlloc, n)?;
        self.ledger.record_alloc(BlockRecord {
            addr: ptr.as_ptr() as usize,
            size: n * size_of::<T>(),
            align: align_of::<T>(),
        });
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        self.ledger.record_dealloc(BlockRecord {
            addr: ptr.as_ptr() as usize,
            size: n.saturating_mul(size_of::<T>()),
            align: align_of::<T>(),
        });
        unsafe { ArrayAlloc::<T>::deallocate(&SystemAlloc, ptr, n) }
    }
}

impl Backend for TrackingAlloc {
    type Rebound<C: ChunkClass> = TrackingAlloc;

    fn rebind<C: ChunkClass>(&self) -> TrackingAlloc {
        self.clone()
    }
}
