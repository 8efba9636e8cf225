// Nothing else in this binary may touch the default resource before the
// threads below race to initialise it. Tests that replace it live in
// set_default.rs so they run in a separate process.
#[cfg(test)]
pub mod tests {
    use std::sync::Barrier;

    use memres::{get_default_resource, new_delete_resource, same_object, MemoryResource};

    fn address(resource: &dyn MemoryResource) -> *const () {
        resource as *const dyn MemoryResource as *const ()
    }

    #[test]
    fn test_concurrent_first_reads_agree() {
        const THREADS: usize = 32;
        let barrier = Barrier::new(THREADS);

        let seen: Vec<*const ()> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        address(get_default_resource()) as usize
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as *const ())
                .collect()
        });

        assert!(seen.iter().all(|addr| *addr == seen[0]));
        assert!(same_object(get_default_resource(), new_delete_resource()));
    }
}
