//! Top-level generation driver: one seed in, a finished, beatable world pool
//! and its spoiler log out. Callers that want a different seed on failure
//! reload the pool and call again.

use anyhow::{Context, Result};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tiderando_game::WorldPool;

use crate::entrance_shuffle::randomize_entrances;
use crate::fill::fill;
use crate::spoiler_log::{SpoilerLog, generate_playthrough, get_spoiler_log};

pub fn make_rng(seed: u64) -> StdRng {
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&seed.to_le_bytes());
    StdRng::from_seed(rng_seed)
}

fn choose_race_mode_dungeons(worlds: &mut WorldPool, rng: &mut StdRng) {
    for world in worlds.iter_mut() {
        if !world.settings.race_mode {
            continue;
        }
        let mut candidates: Vec<usize> = (0..world.dungeons.len()).collect();
        candidates.shuffle(rng);
        candidates.truncate(world.settings.num_race_mode_dungeons);
        for &d in &candidates {
            info!("Race mode dungeon: {}", world.dungeons[d].name);
        }
        world.set_race_mode_dungeons(&candidates);
    }
}

pub fn generate(worlds: &mut WorldPool, seed: u64) -> Result<SpoilerLog> {
    let mut rng = make_rng(seed);

    choose_race_mode_dungeons(worlds, &mut rng);

    info!("Randomizing entrances (seed {seed})");
    randomize_entrances(worlds, &mut rng).context("entrance randomization failed")?;

    info!("Placing items");
    fill(worlds, &mut rng).context("item placement failed")?;

    info!("Generating playthrough");
    let playthrough = generate_playthrough(worlds);
    Ok(get_spoiler_log(worlds, seed, &playthrough))
}
