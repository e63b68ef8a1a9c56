//! Block destruction and power-up drops

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use super::state::{Cell, Explosion, Grid, Position, PowerUp, PowerUpKind};

/// Chance that a destroyed block drops a power-up
pub const POWER_UP_DROP_CHANCE: f64 = 0.3;

/// Terrain mutation after explosions
pub struct Destruction;

impl Destruction {
    /// Turn every burning block into empty ground.
    ///
    /// Each destroyed cell rolls once for a power-up drop no matter how many
    /// explosions overlap it. `next_id` supplies ids for spawned power-ups.
    pub fn apply<R: Rng + ?Sized>(
        grid: &Grid,
        explosions: &[Explosion],
        rng: &mut R,
        mut next_id: impl FnMut() -> u64,
    ) -> (Grid, Vec<PowerUp>) {
        let mut new_grid = grid.clone();
        let mut power_ups = Vec::new();
        let mut visited: HashSet<Position> = HashSet::new();

        for explosion in explosions {
            if !visited.insert(explosion.pos) {
                continue;
            }
            if new_grid.get(explosion.pos) != Some(Cell::Block) {
                continue;
            }

            new_grid.set(explosion.pos, Cell::Empty);

            if rng.gen_bool(POWER_UP_DROP_CHANCE) {
                if let Some(kind) = PowerUpKind::ALL.choose(rng) {
                    power_ups.push(PowerUp {
                        id: next_id(),
                        pos: explosion.pos,
                        kind: *kind,
                    });
                }
            }
        }

        (new_grid, power_ups)
    }
}
