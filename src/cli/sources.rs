//! Sources command implementation

use anyhow::Result;

use crate::probe::ProbeRegistry;

pub fn run(registry: &ProbeRegistry) -> Result<()> {
    let probes = registry.all_probes();
    if probes.is_empty() {
        println!("No sources enabled. Check your configuration.");
        return Ok(());
    }

    println!("{:<12} {:<10} {:<40} {}", "Source", "Status", "Description", "Path");
    println!("{}", "-".repeat(100));

    for probe in probes {
        let status = if probe.is_available() { "found" } else { "missing" };
        println!(
            "{:<12} {:<10} {:<40} {}",
            probe.id(),
            status,
            probe.description(),
            probe.path().display(),
        );
    }

    Ok(())
}
