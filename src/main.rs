/// DEM engine executable
/// Runs the simulation described by a TOML configuration file
use anyhow::{Context, Result};
use dem_engine::{DemConfig, DemSolver};

fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .context("usage: dem-engine <config.toml>")?;
    let config = DemConfig::load(&path).with_context(|| format!("loading {}", path))?;

    println!("=== DEM engine ===");
    println!("Configuration: {}", path);
    println!(
        "Time step {} s, end time {} s, {} domains",
        config.simulation_control.time_step, config.simulation_control.time_end, config.domain.subdomains
    );

    let mut solver = DemSolver::new(config)?;
    let summary = solver.solve()?;
    print!("{}", summary);
    Ok(())
}
