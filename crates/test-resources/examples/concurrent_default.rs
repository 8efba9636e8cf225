use std::collections::BTreeSet;
use std::sync::Barrier;

use memres::{
    get_default_resource, new_delete_resource, same_object, set_default_resource, MemoryResource,
    ResourceAdaptor, SystemAlloc,
};

const THREADS: usize = 16;

fn address(resource: &dyn MemoryResource) -> usize {
    resource as *const dyn MemoryResource as *const () as usize
}

/// Every thread reads the default at the same moment; returns the distinct
/// addresses seen.
fn race_readers() -> BTreeSet<usize> {
    let barrier = Barrier::new(THREADS);
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    address(get_default_resource())
                })
            })
            .collect();
        handles.into_iter().filter_map(|h| h.join().ok()).collect()
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let first = race_readers();
    let first_is_new_delete = same_object(get_default_resource(), new_delete_resource());

    let adaptor: &'static ResourceAdaptor<SystemAlloc, 64> =
        Box::leak(Box::new(ResourceAdaptor::default()));
    let previous = set_default_resource(Some(adaptor as &dyn MemoryResource));

    let second = race_readers();
    let second_is_adaptor = second.len() == 1 && second.contains(&address(adaptor));

    let restored = set_default_resource(None);

    let summary = serde_json::json!({
        "threads": THREADS,
        "first_distinct": first.len(),
        "first_is_new_delete": first_is_new_delete,
        "previous_was_new_delete": same_object(previous, new_delete_resource()),
        "second_distinct": second.len(),
        "second_is_adaptor": second_is_adaptor,
        "restored_from_adaptor": same_object(restored, adaptor),
        "final_is_new_delete": same_object(get_default_resource(), new_delete_resource()),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
