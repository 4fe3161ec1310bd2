use anyhow::Result;
use clap::Parser;
use vivarium_core::config::WorldOptions;
use vivarium_core::world::World;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Initial population size
    #[arg(short = 'n', long)]
    agents: Option<usize>,

    /// World PRNG seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Grid side; 0 auto-sizes from the population
    #[arg(long)]
    size: Option<usize>,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 10_000)]
    ticks: u64,

    /// Optional config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Log counters every N ticks (0 disables)
    #[arg(long, default_value_t = 1000)]
    log_every: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let mut opts = match &args.config {
        Some(path) => WorldOptions::load(std::path::Path::new(path))?,
        None => WorldOptions::default(),
    };
    if let Some(n) = args.agents {
        opts.n_agents = n;
    }
    if let Some(seed) = args.seed {
        opts.seed = seed;
    }
    if let Some(size) = args.size {
        opts.world_size = size;
    }

    let mut world = World::new(opts)?;
    tracing::info!(
        size = world.size(),
        agents = world.agents().len(),
        "simulation starting"
    );

    for _ in 0..args.ticks {
        world.tick();
        if args.log_every > 0 && world.current_tick() % args.log_every == 0 {
            log_status(&world);
        }
        if world.agents().is_empty() {
            tracing::info!(tick = world.current_tick(), "population extinct");
            break;
        }
    }

    log_status(&world);
    let c = world.counters();
    println!(
        "tick {} | pop {} | food {} | items {} | trades {} | teaches {}",
        c.tick,
        world.agents().len(),
        c.food_count,
        c.item_count,
        c.trade_count,
        c.teach_count
    );
    Ok(())
}

fn log_status(world: &World) {
    let stats = vivarium_core::stats::PopulationStats::collect(world.agents());
    if stats.population == 0 {
        return;
    }
    let c = world.counters();
    tracing::info!(
        tick = c.tick,
        pop = stats.population,
        avg_fitness = stats.avg_fitness,
        best_fitness = stats.best_fitness,
        avg_energy = stats.avg_energy,
        food = c.food_count,
        trades = c.trade_count,
        teaches = c.teach_count,
        "status"
    );
}
