use memres::{
    run_probe, ArenaAlloc, MemoryResource, PmrBox, PolymorphicAllocator, ProbeRequest,
    ResourceAdaptor,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let arena = ArenaAlloc::with_capacity(64 * 1024)?;
    let resource: ResourceAdaptor<_, 256> = ResourceAdaptor::new(arena.clone());

    // Every alignment the adaptor serves, largest first so the arena never
    // pads, with a size that is not a multiple of it.
    let requests: Vec<ProbeRequest> = (0..=8)
        .rev()
        .map(|shift| ProbeRequest::new(3 * (1 << shift) + 1, 1 << shift))
        .chain([ProbeRequest::new(1, 512)])
        .collect();

    let report = run_probe(&resource, resource.max_alignment(), &requests);
    let used_after_probe = arena.used();

    let boxed = PmrBox::new_in([7u64; 4], PolymorphicAllocator::new(&resource))?;
    let boxed_aligned = (&*boxed as *const [u64; 4] as usize) % std::mem::align_of::<u64>() == 0;
    let boxed_sum: u64 = boxed.iter().sum();
    drop(boxed);

    let summary = serde_json::json!({
        "report": report,
        "arena_capacity": arena.capacity(),
        "used_after_probe": used_after_probe,
        "boxed_aligned": boxed_aligned,
        "boxed_sum": boxed_sum,
        "resource": resource.type_label(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
