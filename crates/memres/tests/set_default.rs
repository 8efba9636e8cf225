// A single test: the steps below depend on the process-wide default starting
// out uninitialised, and on no other test replacing it in between.
#[cfg(test)]
pub mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use memres::{
        get_default_resource, new_delete_resource, null_memory_resource, same_object,
        set_default_resource, DefaultResourceGuard, MemoryResource, ResourceAdaptor, TrackingAlloc,
    };

    fn leak_adaptor() -> &'static ResourceAdaptor<TrackingAlloc, 64> {
        Box::leak(Box::new(ResourceAdaptor::default()))
    }

    #[test]
    fn test_default_resource_lifecycle() {
        // Replacing an uninitialised default reports new/delete as previous.
        let first = leak_adaptor();
        let previous = set_default_resource(Some(first as &dyn MemoryResource));
        assert!(same_object(previous, new_delete_resource()));
        assert!(same_object(get_default_resource(), first));

        // Last write wins.
        let second = leak_adaptor();
        let previous = set_default_resource(Some(second as &dyn MemoryResource));
        assert!(same_object(previous, first));
        assert!(same_object(get_default_resource(), second));

        // Blocks from the default go back to the resource that served them.
        let default = get_default_resource();
        let block = default.allocate(100, 32).unwrap();
        assert_eq!(second.backend().stats().live_blocks, 1);
        unsafe { default.deallocate(block, 100, 32) };
        assert_eq!(second.backend().stats().live_blocks, 0);
        assert_eq!(first.backend().stats().blocks_allocated, 0);

        // `None` reinstalls new/delete.
        let previous = set_default_resource(None);
        assert!(same_object(previous, second));
        assert!(same_object(get_default_resource(), new_delete_resource()));

        // Guards nest and restore in reverse order.
        {
            let _outer = DefaultResourceGuard::install(null_memory_resource());
            assert!(get_default_resource().allocate(1, 1).is_err());
            {
                let inner = DefaultResourceGuard::install(first);
                assert!(same_object(inner.previous(), null_memory_resource()));
                assert!(same_object(get_default_resource(), first));
            }
            assert!(same_object(get_default_resource(), null_memory_resource()));
        }
        assert!(same_object(get_default_resource(), new_delete_resource()));

        // Reinstalling the current default reports it as its own previous.
        set_default_resource(Some(second as &dyn MemoryResource));
        let previous = set_default_resource(Some(second as &dyn MemoryResource));
        assert!(same_object(previous, second));
        for _ in 0..100 {
            let guard = DefaultResourceGuard::install(first);
            assert!(same_object(guard.previous(), second));
            assert!(same_object(get_default_resource(), first));
            drop(guard);
            assert!(same_object(get_default_resource(), second));
        }
        set_default_resource(None);

        // Readers racing a writer only ever see one of the two resources.
        let done = AtomicBool::new(false);
        std::thread::scope(|s| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let mut reads = 0u64;
                        while !done.load(Ordering::Acquire) {
                            let current = get_default_resource();
                            assert!(
                                same_object(current, new_delete_resource())
                                    || same_object(current, first)
                            );
                            reads += 1;
                        }
                        reads
                    })
                })
                .collect();

            for i in 0..1000 {
                if i % 2 == 0 {
                    set_default_resource(Some(first as &dyn MemoryResource));
                } else {
                    set_default_resource(None);
                }
            }
            done.store(true, Ordering::Release);

            for reader in readers {
                reader.join().unwrap();
            }
        });
        assert!(same_object(get_default_resource(), new_delete_resource()));
    }
}
