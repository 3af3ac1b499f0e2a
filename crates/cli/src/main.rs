use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use plant_breeding_sim_core as sim;
use sim::config::SimulationConfig;
use sim::meiosis::crossover_probabilities;
use sim::program::{run_simulation, SimulationReport};

#[derive(Parser)]
#[command(name = "breedsim")]
#[command(version)]
#[command(about = "Forward simulation of plant breeding programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a breeding program: random founders, truncation selection, random crosses
    Simulate {
        /// Path to a JSON configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Override the configured random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the configured number of generations
        #[arg(short, long)]
        generations: Option<usize>,

        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print the genetic map and per-locus crossover probabilities
    Map {
        /// Path to a JSON configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            seed,
            generations,
            format,
        } => cmd_simulate(config.as_deref(), seed, generations, &format),
        Commands::Map { config } => cmd_map(config.as_deref()),
    }
}

fn load_config(path: Option<&str>) -> Result<SimulationConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from '{}'", path))?;
            SimulationConfig::from_json_str(&text)
                .with_context(|| format!("Invalid config in '{}'", path))
        }
        None => Ok(SimulationConfig::default()),
    }
}

fn cmd_simulate(
    config_path: Option<&str>,
    seed: Option<u64>,
    generations: Option<usize>,
    output_format: &str,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(seed) = seed {
        config.seed = seed;
    }
    if let Some(generations) = generations {
        config.n_generations = generations;
    }
    config.validate().context("Invalid simulation settings")?;

    eprintln!(
        "Simulating {} founders over {} generations (seed {})",
        config.n_founders, config.n_generations, config.seed
    );

    let report = run_simulation(&config).context("Simulation failed")?;

    match output_format.to_lowercase().as_str() {
        "json" => print_json(&report)?,
        "text" => println!("{}", report.summary()),
        other => anyhow::bail!("Unknown format '{}'. Use 'text' (default) or 'json'.", other),
    }
    Ok(())
}

fn print_json(report: &SimulationReport) -> Result<()> {
    let json_str = serde_json::to_string_pretty(report)?;
    println!("{}", json_str);
    Ok(())
}

fn cmd_map(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let genome = config
        .genome
        .build(&mut rng)
        .context("Failed to build genome")?;
    let probs = crossover_probabilities(&genome);

    println!(
        "Genome: ploidy {}, {} chromosomes x {} loci, {} map, {} cM",
        genome.ploidy(),
        genome.n_chromosomes(),
        genome.n_loci_per_chromosome(),
        genome.map_type().as_str(),
        genome.chromosome_length()
    );

    match genome.genetic_map() {
        Some(map) => {
            println!("\n{:<6} {:<6} {:<12} {:<12}", "Chr", "Locus", "Position", "P(switch)");
            for ((chr, locus), pos) in map.indexed_iter() {
                println!("{:<6} {:<6} {:<12.4} {:<12.6}", chr, locus, pos, probs[[chr, locus]]);
            }
        }
        None => println!("No genetic map: each locus switches copy with probability 0.5"),
    }
    Ok(())
}
