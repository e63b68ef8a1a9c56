//! Blast propagation for detonating bombs

use crate::util::time::EXPLOSION_LIFETIME_TICKS;

use super::state::{BlastArm, Bomb, Cell, Explosion, Grid};

/// Computes the cells a detonation reaches
pub struct ExplosionResolver;

impl ExplosionResolver {
    /// One center explosion plus up to `bomb.power` cells along each cardinal
    /// arm. An arm stops before a wall or the grid edge, and stops after the
    /// first block it hits.
    pub fn resolve(bomb: &Bomb, grid: &Grid) -> Vec<Explosion> {
        let mut explosions = vec![Explosion {
            pos: bomb.pos,
            arm: BlastArm::Center,
            timer: EXPLOSION_LIFETIME_TICKS,
        }];

        for arm in BlastArm::CARDINALS {
            let (dx, dy) = arm.delta();
            let mut pos = bomb.pos;

            for _ in 0..bomb.power {
                pos = pos.offset(dx, dy);
                let cell = match grid.get(pos) {
                    None | Some(Cell::Wall) => break,
                    Some(cell) => cell,
                };

                explosions.push(Explosion {
                    pos,
                    arm,
                    timer: EXPLOSION_LIFETIME_TICKS,
                });

                if cell == Cell::Block {
                    break;
                }
            }
        }

        explosions
    }
}
