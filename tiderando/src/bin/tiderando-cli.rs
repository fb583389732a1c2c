use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tiderando::generate::generate;
use tiderando_game::load::{load_world_pool, parse_world_def};
use tiderando_game::settings::Settings;

#[derive(Parser)]
struct Args {
    /// World definition JSON
    #[arg(long)]
    world: PathBuf,

    /// Settings JSON; defaults apply when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 1)]
    num_worlds: usize,

    /// Where to write the spoiler log; stdout when omitted
    #[arg(long)]
    output_spoiler_log: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let world_json = std::fs::read_to_string(&args.world)
        .with_context(|| format!("unable to read {}", args.world.display()))?;
    let def = parse_world_def(&world_json)?;
    let settings: Settings = match &args.settings {
        Some(path) => {
            let settings_json = std::fs::read_to_string(path)
                .with_context(|| format!("unable to read {}", path.display()))?;
            serde_json::from_str(&settings_json).context("unable to parse settings")?
        }
        None => Settings::default(),
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    info!("Seed: {seed}");

    let mut worlds = load_world_pool(&def, &settings, args.num_worlds)?;
    let spoiler = generate(&mut worlds, seed)?;

    let spoiler_json = serde_json::to_string_pretty(&spoiler)?;
    match &args.output_spoiler_log {
        Some(path) => {
            std::fs::write(path, spoiler_json)
                .with_context(|| format!("unable to write {}", path.display()))?;
            info!("Spoiler log written to {}", path.display());
        }
        None => println!("{spoiler_json}"),
    }
    Ok(())
}
