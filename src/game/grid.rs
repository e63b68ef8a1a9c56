//! Initial terrain generation

use rand::Rng;

use super::state::{Cell, Grid, Position, GRID_HEIGHT, GRID_WIDTH};

/// Chance that an open interior cell starts as a destructible block
pub const BLOCK_DENSITY: f64 = 0.7;

/// Side length of the block-free zone in each corner
const SPAWN_ZONE: usize = 3;

/// Generates arena terrain
pub struct GridGenerator;

impl GridGenerator {
    /// Generate a standard-size grid
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Grid {
        Self::generate_sized(GRID_WIDTH, GRID_HEIGHT, rng)
    }

    /// Generate a grid of arbitrary size.
    ///
    /// Border cells and cells with both coordinates even are walls, the four
    /// corner spawn zones stay empty, and everything else is a block with
    /// probability [`BLOCK_DENSITY`].
    pub fn generate_sized<R: Rng + ?Sized>(width: usize, height: usize, rng: &mut R) -> Grid {
        let mut grid = Grid::filled(width, height, Cell::Empty);

        for y in 0..height {
            for x in 0..width {
                let cell = if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    Cell::Wall
                } else if x % 2 == 0 && y % 2 == 0 {
                    Cell::Wall
                } else if in_spawn_zone(x, y, width, height) {
                    Cell::Empty
                } else if rng.gen_bool(BLOCK_DENSITY) {
                    Cell::Block
                } else {
                    Cell::Empty
                };
                grid.cells[y][x] = cell;
            }
        }

        grid
    }

    /// Spawn corners, indexed by team color slot
    pub fn spawn_positions() -> [Position; 4] {
        let right = GRID_WIDTH as i32 - 2;
        let bottom = GRID_HEIGHT as i32 - 2;
        [
            Position::new(1, 1),
            Position::new(right, 1),
            Position::new(1, bottom),
            Position::new(right, bottom),
        ]
    }
}

fn in_spawn_zone(x: usize, y: usize, width: usize, height: usize) -> bool {
    let left = x < SPAWN_ZONE;
    let right = x + SPAWN_ZONE >= width;
    let top = y < SPAWN_ZONE;
    let bottom = y + SPAWN_ZONE >= height;
    (left || right) && (top || bottom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn check_structure(grid: &Grid) {
        let (w, h) = (grid.width, grid.height);
        for y in 0..h {
            for x in 0..w {
                let cell = grid.cells[y][x];
                if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                    assert_eq!(cell, Cell::Wall, "border at ({x},{y})");
                }
                if x % 2 == 0 && y % 2 == 0 {
                    assert_eq!(cell, Cell::Wall, "lattice at ({x},{y})");
                }
                if in_spawn_zone(x, y, w, h) {
                    assert_ne!(cell, Cell::Block, "spawn zone at ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn structural_rules_hold_for_many_seeds() {
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let grid = GridGenerator::generate(&mut rng);
            assert_eq!(grid.width, GRID_WIDTH);
            assert_eq!(grid.height, GRID_HEIGHT);
            check_structure(&grid);
        }
    }

    #[test]
    fn same_seed_same_grid() {
        let a = GridGenerator::generate(&mut ChaCha8Rng::seed_from_u64(42));
        let b = GridGenerator::generate(&mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn block_density_is_roughly_seventy_percent() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut blocks = 0usize;
        let mut candidates = 0usize;
        for _ in 0..50 {
            let grid = GridGenerator::generate(&mut rng);
            for y in 1..GRID_HEIGHT - 1 {
                for x in 1..GRID_WIDTH - 1 {
                    if (x % 2 == 0 && y % 2 == 0) || in_spawn_zone(x, y, GRID_WIDTH, GRID_HEIGHT) {
                        continue;
                    }
                    candidates += 1;
                    if grid.cells[y][x] == Cell::Block {
                        blocks += 1;
                    }
                }
            }
        }
        let ratio = blocks as f64 / candidates as f64;
        assert!((0.6..0.8).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn spawn_corners_are_empty() {
        let grid = GridGenerator::generate(&mut ChaCha8Rng::seed_from_u64(1));
        for pos in GridGenerator::spawn_positions() {
            assert_eq!(grid.get(pos), Some(Cell::Empty));
        }
    }
}
