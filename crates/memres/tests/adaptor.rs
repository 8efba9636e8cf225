#[cfg(test)]
pub mod tests {
    use std::mem::{align_of, size_of};
    use std::ptr::NonNull;
    use std::sync::{Arc, Mutex};

    use memres::{
        AllocError, ArenaAlloc, ArrayAlloc, Backend, ChunkClass, MemoryResource, ResourceAdaptor,
        SystemAlloc, TrackingAlloc, DEFAULT_MAX_ALIGN,
    };

    /// Size and alignment of one block as the backend was asked for it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Block {
        addr: usize,
        size: usize,
        align: usize,
        live: bool,
    }

    /// Backend that records every request and checks each free against it.
    #[derive(Clone, Default)]
    struct RecordingAlloc {
        blocks: Arc<Mutex<Vec<Block>>>,
    }

    impl RecordingAlloc {
        fn last(&self) -> Block {
            *self.blocks.lock().unwrap().last().unwrap()
        }

        fn live(&self) -> usize {
            self.blocks.lock().unwrap().iter().filter(|b| b.live).count()
        }
    }

    impl PartialEq for RecordingAlloc {
        fn eq(&self, other: &Self) -> bool {
            Arc::ptr_eq(&self.blocks, &other.blocks)
        }
    }

    unsafe impl<T> ArrayAlloc<T> for RecordingAlloc {
        fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocError> {
            let ptr = ArrayAlloc::<T>::allocate(&SystemAlloc, n)?;
            self.blocks.lock().unwrap().push(Block {
                addr: ptr.as_ptr() as usize,
                size: size_of::<T>() * n,
                align: align_of::<T>(),
                live: true,
            });
            Ok(ptr)
        }

        unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
            let mut blocks = self.blocks.lock().unwrap();
            let block = blocks
                .iter_mut()
                .rev()
                .find(|b| b.live && b.addr == ptr.as_ptr() as usize)
                .expect("deallocating a block that was never allocated");
            assert_eq!(block.size, size_of::<T>() * n);
            assert_eq!(block.align, align_of::<T>());
            block.live = false;
            drop(blocks);
            unsafe { ArrayAlloc::<T>::deallocate(&SystemAlloc, ptr, n) }
        }
    }

    impl Backend for RecordingAlloc {
        type Rebound<C: ChunkClass> = RecordingAlloc;

        fn rebind<C: ChunkClass>(&self) -> RecordingAlloc {
            self.clone()
        }
    }

    fn check_routing<const MAX_ALIGN: usize>() {
        let recording = RecordingAlloc::default();
        let resource: ResourceAdaptor<_, MAX_ALIGN> = ResourceAdaptor::new(recording.clone());

        let mut a = 1;
        while a <= MAX_ALIGN {
            let b1 = resource.allocate(1, a).unwrap();
            assert_eq!(recording.last().size, a);
            assert_eq!(recording.last().align, a);

            let b2 = resource.allocate(a, a).unwrap();
            assert_eq!(recording.last().size, a);
            assert_eq!(recording.last().align, a);

            let b3 = resource.allocate(3 * a, a).unwrap();
            assert_eq!(recording.last().size, 3 * a);
            assert_eq!(recording.last().align, a);

            unsafe {
                resource.deallocate(b1, 1, a);
                resource.deallocate(b2, a, a);
                resource.deallocate(b3, 3 * a, a);
            }
            a *= 2;
        }
        assert_eq!(recording.live(), 0);

        // `a` is now twice MAX_ALIGN.
        assert_eq!(
            resource.allocate(1, a),
            Err(AllocError::UnsupportedAlignment {
                alignment: a,
                max: MAX_ALIGN
            })
        );
    }

    #[test]
    fn test_routes_each_alignment_to_its_chunk_class() {
        check_routing::<DEFAULT_MAX_ALIGN>();
    }

    #[test]
    fn test_routes_with_over_aligned_maximum() {
        check_routing::<{ 4 * DEFAULT_MAX_ALIGN }>();
        check_routing::<4096>();
    }

    /// Deterministic request stream; no need for real randomness here.
    fn requests(count: usize, max_align: usize) -> Vec<(usize, usize)> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let max_log2 = max_align.trailing_zeros() as u64;
        (0..count)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                let bytes = ((state >> 33) % 5000) as usize;
                let alignment = match (state >> 20) % (max_log2 + 2) {
                    0 => 0,
                    shift => 1usize << (shift - 1),
                };
                (bytes, alignment)
            })
            .collect()
    }

    #[test]
    fn test_live_blocks_are_aligned_and_disjoint() {
        let tracking = TrackingAlloc::new();
        let resource: ResourceAdaptor<_, 4096> = ResourceAdaptor::new(tracking.clone());

        let mut live = Vec::new();
        for (bytes, alignment) in requests(500, 4096) {
            let ptr = resource.allocate(bytes, alignment).unwrap();
            let effective = if alignment == 0 {
                memres::natural_alignment(bytes, 4096)
            } else {
                alignment
            };
            assert_eq!(ptr.as_ptr() as usize % effective, 0);
            live.push((ptr, bytes, alignment));
        }

        let blocks = tracking.live_blocks();
        for pair in blocks.windows(2) {
            assert!(
                pair[0].addr + pair[0].size <= pair[1].addr,
                "overlapping blocks: {:?}",
                pair
            );
        }

        for (ptr, bytes, alignment) in live {
            unsafe { resource.deallocate(ptr, bytes, alignment) };
        }
        let stats = tracking.stats();
        assert_eq!(stats.live_blocks, 0);
        assert_eq!(stats.mismatches, 0);
        assert_eq!(stats.bytes_allocated, stats.bytes_freed);
    }

    #[test]
    fn test_deallocate_then_allocate_round_trips() {
        let recording = RecordingAlloc::default();
        let resource: ResourceAdaptor<_, 256> = ResourceAdaptor::new(recording.clone());

        for (bytes, alignment) in requests(1000, 256) {
            let ptr = resource.allocate(bytes, alignment).unwrap();
            unsafe { resource.deallocate(ptr, bytes, alignment) };
        }
        assert_eq!(recording.live(), 0);
    }

    #[test]
    fn test_equality_follows_backend_not_address() {
        let shared = TrackingAlloc::new();
        let a: ResourceAdaptor<_, 64> = ResourceAdaptor::new(shared.clone());
        let b = a.clone();
        let unrelated: ResourceAdaptor<_, 64> = ResourceAdaptor::new(TrackingAlloc::new());

        let a: &dyn MemoryResource = &a;
        let b: &dyn MemoryResource = &b;
        let unrelated: &dyn MemoryResource = &unrelated;

        assert!(!std::ptr::addr_eq(a, b));
        assert!(*a == *b);
        assert!(*a != *unrelated);

        // Memory from one equal resource can be returned through the other.
        let block = a.allocate(48, 16).unwrap();
        unsafe { b.deallocate(block, 48, 16) };
        assert_eq!(shared.stats().live_blocks, 0);
        assert_eq!(shared.stats().mismatches, 0);
    }

    #[test]
    fn test_backend_errors_pass_through_unchanged() {
        let arena = ArenaAlloc::with_capacity(128).unwrap();
        let resource: ResourceAdaptor<_, 64> = ResourceAdaptor::new(arena.clone());

        let a = resource.allocate(64, 64).unwrap();
        let b = resource.allocate(64, 64).unwrap();
        assert_eq!(arena.remaining(), 0);
        assert_eq!(
            resource.allocate(1, 1),
            Err(AllocError::OutOfMemory {
                bytes: 1,
                alignment: 1
            })
        );
        unsafe {
            resource.deallocate(b, 64, 64);
            resource.deallocate(a, 64, 64);
        }
        assert_eq!(arena.used(), 0);

        // The chunk count fits in a usize but the array does not.
        let system: ResourceAdaptor<SystemAlloc, 4096> = ResourceAdaptor::default();
        assert_eq!(
            system.allocate(usize::MAX, 4096),
            Err(AllocError::CapacityOverflow {
                bytes: usize::MAX,
                alignment: 4096
            })
        );
        assert_eq!(
            system.allocate(usize::MAX, 0),
            Err(AllocError::CapacityOverflow {
                bytes: usize::MAX,
                alignment: 1
            })
        );
    }

    #[test]
    fn test_scenario_with_max_alignment_64() {
        let recording = RecordingAlloc::default();
        let resource: ResourceAdaptor<_, 64> = ResourceAdaptor::new(recording.clone());

        let p = resource.allocate(100, 32).unwrap();
        assert_eq!(p.as_ptr() as usize % 32, 0);
        assert_eq!(recording.last().size, 128);
        assert_eq!(recording.last().align, 32);

        let q = resource.allocate(10, 0).unwrap();
        assert_eq!(recording.last().size, 10);
        assert_eq!(recording.last().align, 2);

        assert_eq!(
            resource.allocate(5, 128),
            Err(AllocError::UnsupportedAlignment {
                alignment: 128,
                max: 64
            })
        );

        unsafe {
            resource.deallocate(p, 100, 32);
            resource.deallocate(q, 10, 0);
        }
        assert_eq!(recording.live(), 0);
    }
}
