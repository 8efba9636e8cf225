use memres::{run_probe, ProbeRequest, ResourceAdaptor, TrackingAlloc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let tracking = TrackingAlloc::new();
    let resource: ResourceAdaptor<_, 64> = ResourceAdaptor::new(tracking.clone());

    let requests: Vec<ProbeRequest> = ["100:32", "10:0", "5:128", "0:0", "4096:64", "7:3"]
        .iter()
        .map(|s| s.parse::<ProbeRequest>())
        .collect::<Result<Vec<_>, _>>()?;

    let report = run_probe(&resource, resource.max_alignment(), &requests)
        .with_tracking(tracking.stats());

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
