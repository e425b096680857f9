mod simulation;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::fs::File;
use std::path::PathBuf;

use simulation::{MetricsCollector, Scheduler, SimConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// 2x2 grid of lit intersections with one-way streets
    City,
    /// Two intersections in a line fed by a single spawn point
    Line,
    /// A single straight road, no lights
    Road,
}

#[derive(Parser)]
#[command(name = "traffic_grid")]
#[command(about = "Cell-grid traffic simulation with adaptive lights")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "200")]
    ticks: u64,

    /// RNG seed; identical seeds reproduce identical runs
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Built-in scenario to simulate
    #[arg(long, value_enum, default_value = "city")]
    scenario: Scenario,

    /// Arrival probability per spawn point per tick
    #[arg(long, default_value = "0.3")]
    rate: f64,

    /// Print the ASCII map every N ticks (0 disables)
    #[arg(long, default_value = "50")]
    map_interval: u64,

    /// Write per-tick metrics to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match cli.scenario {
        Scenario::City => SimConfig::demo_city(cli.rate),
        Scenario::Line => SimConfig::two_intersection_line(cli.rate),
        Scenario::Road => SimConfig::straight_road(20, cli.rate, None),
    };

    let mut scheduler = Scheduler::new();
    scheduler
        .reset(&config, cli.seed)
        .context("Failed to initialize simulation")?;

    info!(
        "running {:?} scenario for {} ticks (seed {})",
        cli.scenario, cli.ticks, cli.seed
    );

    let mut metrics = MetricsCollector::new();

    println!("Initial state:");
    scheduler.print_summary();
    scheduler.draw_map();

    for tick in 1..=cli.ticks {
        let snapshot = scheduler.advance().context("Simulation tick failed")?;
        metrics.record(&snapshot);

        if cli.map_interval > 0 && tick % cli.map_interval == 0 {
            println!("--- After tick {} ---", tick);
            scheduler.print_summary();
            scheduler.draw_map();
        }
    }

    println!("=== Final State ===");
    scheduler.print_summary();
    scheduler.draw_map();

    if let Some(row) = metrics.rows().last() {
        println!(
            "Throughput: {} exited / {} spawned, mean happiness {:.1}",
            row.exited_total, row.spawned_total, row.mean_happiness
        );
    }

    if let Some(path) = &cli.csv {
        let file = File::create(path)
            .with_context(|| format!("Failed to create metrics file {}", path.display()))?;
        metrics
            .write_csv(file)
            .context("Failed to write metrics CSV")?;
        println!("Wrote per-tick metrics to {}", path.display());
    }

    Ok(())
}
