use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use morphogen_lib::io::{read_genome_file, GenomeFormat, ManifestLoader};
use morphogen_lib::model::config::SimConfig;
use morphogen_lib::model::metrics::init_logging;
use morphogen_lib::model::state::{SocketRef, Vec3};
use morphogen_lib::model::wiring;
use morphogen_lib::model::World;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grow an organism and step it headless
    Run {
        /// Genome file (text, JSON or HexDNA)
        #[arg(short, long)]
        genome: PathBuf,

        /// Directory of archetype manifests
        #[arg(short, long)]
        assets: PathBuf,

        #[arg(short, long, default_value_t = 300)]
        ticks: u64,

        /// Custom config file path
        #[arg(short, long, default_value = "morphogen.toml")]
        config: PathBuf,
    },
    /// Build an organism once and print its parts and wiring
    Check {
        #[arg(short, long)]
        genome: PathBuf,

        #[arg(short, long)]
        assets: PathBuf,
    },
    /// Re-encode a genome file and print it
    Convert {
        #[arg(short, long)]
        genome: PathBuf,

        /// text, json or hex
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    match args.command {
        Command::Run {
            genome,
            assets,
            ticks,
            config,
        } => run(genome, assets, ticks, config),
        Command::Check { genome, assets } => check(genome, assets),
        Command::Convert {
            genome,
            format,
            output,
        } => convert(genome, &format, output),
    }
}

fn run(genome: PathBuf, assets: PathBuf, ticks: u64, config: PathBuf) -> Result<()> {
    let config = SimConfig::load_or_default(&config)
        .with_context(|| format!("loading config {}", config.display()))?;
    let genome = read_genome_file(&genome)?;
    let mut world = World::new(config, Box::new(ManifestLoader::new(&assets)))?;
    let id = world.spawn(genome, Vec3::ZERO)?;

    for tick in 1..=ticks {
        if let Err(e) = world.tick() {
            tracing::error!(tick, error = %e, "Tick failed, stopping");
            break;
        }
        if tick % 100 == 0 {
            if let Some(organism) = world.organism(id) {
                tracing::info!(
                    tick,
                    x = organism.location.x,
                    y = organism.location.y,
                    z = organism.location.z,
                    "Organism position"
                );
            }
        }
    }

    if let Some(organism) = world.organism(id) {
        println!(
            "{}: {} parts, {} ticks, at ({:.3}, {:.3}, {:.3}), {:.2?} elapsed",
            organism.genome().name,
            organism.part_count(),
            organism.ticks(),
            organism.location.x,
            organism.location.y,
            organism.location.z,
            world.metrics.elapsed(),
        );
    }
    let summary = world.metrics.summary();
    println!(
        "mean tick {:.2?}, slowest {:.2?}, {} links, {} dangling, {} contacts",
        summary.mean_tick,
        summary.slowest_tick,
        summary.last.links,
        summary.last.dangling,
        summary.total_contacts,
    );
    Ok(())
}

fn check(genome: PathBuf, assets: PathBuf) -> Result<()> {
    let genome = read_genome_file(&genome)?;
    let world_config = SimConfig::default();
    let mut world = World::new(world_config, Box::new(ManifestLoader::new(&assets)))?;
    let id = world.spawn(genome, Vec3::ZERO)?;
    let organism = world
        .organism(id)
        .context("organism vanished after spawning")?;
    let tree = organism.tree();

    println!("{} ({} parts)", organism.genome().name, organism.part_count());
    for part in tree.walk() {
        let cell = &tree[part];
        let depth = std::iter::successors(cell.parent, |&p| tree[p].parent).count();
        let socket = tree
            .socket_index(part)
            .map(|s| format!(" @skt{s}"))
            .unwrap_or_default();
        let facing = wiring::channels_facing(tree, part, SocketRef::Plug);
        let facing = if cell.parent.is_some() && !facing.is_empty() {
            format!(" plug channels {facing:?}")
        } else {
            String::new()
        };
        println!("{}{}{}{}", "  ".repeat(depth + 1), cell.name(), socket, facing);
    }

    let wiring = organism.wiring();
    println!("{} links, acyclic: {}", wiring.len(), wiring.is_acyclic());
    for link in &wiring.links {
        println!(
            "  {}[{}] -> {}[{}] chem {}{}",
            tree[link.from.part].name(),
            link.from.index,
            tree[link.to.part].name(),
            link.to.index,
            link.chemical,
            if link.flipped { " (flipped)" } else { "" }
        );
    }
    for dangling in &wiring.dangling {
        println!(
            "  {}[{}] unconnected",
            tree[dangling.part].name(),
            dangling.index
        );
    }
    Ok(())
}

fn convert(genome: PathBuf, format: &str, output: Option<PathBuf>) -> Result<()> {
    let format: GenomeFormat = format.parse()?;
    let genome = read_genome_file(&genome)?;
    let encoded = format.encode(&genome)?;
    match output {
        Some(path) => {
            std::fs::write(&path, &encoded)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), %format, "Genome written");
        }
        None => println!("{encoded}"),
    }
    Ok(())
}
