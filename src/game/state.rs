//! Arena data model: grid, players, bombs, explosions, power-ups

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::time::MATCH_DURATION_SECS;

/// Grid width in cells
pub const GRID_WIDTH: usize = 13;
/// Grid height in cells
pub const GRID_HEIGHT: usize = 11;

/// Power-up ceilings
pub const MAX_SPEED: f32 = 3.0;
pub const MAX_BOMBS: u32 = 5;
pub const MAX_POWER: u32 = 5;

/// A single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    /// Permanent, stops blasts
    Wall,
    /// Destructible, absorbs blasts
    Block,
    /// Traversable
    Empty,
}

/// Integer cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Fixed-size terrain, stored row-major as `cells[y][x]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Vec<Cell>>,
}

impl Grid {
    /// A grid of the given size with every cell set to `fill`
    pub fn filled(width: usize, height: usize, fill: Cell) -> Self {
        Self {
            width,
            height,
            cells: vec![vec![fill; width]; height],
        }
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    /// Cell at `pos`, or `None` when out of bounds
    pub fn get(&self, pos: Position) -> Option<Cell> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(self.cells[pos.y as usize][pos.x as usize])
    }

    /// Overwrite a cell; out-of-bounds writes are ignored
    pub fn set(&mut self, pos: Position, cell: Cell) {
        if self.in_bounds(pos) {
            self.cells[pos.y as usize][pos.x as usize] = cell;
        }
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        self.get(pos) == Some(Cell::Empty)
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().flatten().filter(|c| **c == cell).count()
    }
}

/// Team colors, one per player in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamColor {
    Red,
    Blue,
    Green,
    Yellow,
}

impl TeamColor {
    /// Colors in assignment order; index matches the spawn corner
    pub const ALL: [TeamColor; 4] = [
        TeamColor::Red,
        TeamColor::Blue,
        TeamColor::Green,
        TeamColor::Yellow,
    ];

    pub fn slot(self) -> usize {
        match self {
            TeamColor::Red => 0,
            TeamColor::Blue => 1,
            TeamColor::Green => 2,
            TeamColor::Yellow => 3,
        }
    }
}

/// Player state in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub pos: Position,
    pub color: TeamColor,
    pub alive: bool,
    /// Bombs currently on the grid
    pub bomb_count: u32,
    pub max_bombs: u32,
    /// Blast radius in cells
    pub power: u32,
    pub speed: f32,
    /// Last applied intent sequence number
    #[serde(default)]
    pub last_intent_seq: u32,
}

impl Player {
    pub fn new(id: Uuid, name: String, pos: Position, color: TeamColor) -> Self {
        Self {
            id,
            name,
            pos,
            color,
            alive: true,
            bomb_count: 0,
            max_bombs: 1,
            power: 1,
            speed: 1.0,
            last_intent_seq: 0,
        }
    }
}

/// A placed bomb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bomb {
    pub id: u64,
    pub owner_id: Uuid,
    pub pos: Position,
    /// Ticks until detonation
    pub timer: u32,
    /// Owner's power at placement time
    pub power: u32,
}

/// Which arm of a blast an explosion cell belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlastArm {
    Center,
    Up,
    Down,
    Left,
    Right,
}

impl BlastArm {
    pub const CARDINALS: [BlastArm; 4] = [
        BlastArm::Up,
        BlastArm::Down,
        BlastArm::Left,
        BlastArm::Right,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            BlastArm::Center => (0, 0),
            BlastArm::Up => (0, -1),
            BlastArm::Down => (0, 1),
            BlastArm::Left => (-1, 0),
            BlastArm::Right => (1, 0),
        }
    }
}

/// One burning cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explosion {
    pub pos: Position,
    pub arm: BlastArm,
    /// Remaining lifetime in ticks
    pub timer: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    Speed,
    ExtraBomb,
    BlastPower,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 3] = [
        PowerUpKind::Speed,
        PowerUpKind::ExtraBomb,
        PowerUpKind::BlastPower,
    ];

    /// Apply this power-up to a player, respecting the caps
    pub fn apply(self, player: &mut Player) {
        match self {
            PowerUpKind::Speed => player.speed = (player.speed + 0.5).min(MAX_SPEED),
            PowerUpKind::ExtraBomb => player.max_bombs = (player.max_bombs + 1).min(MAX_BOMBS),
            PowerUpKind::BlastPower => player.power = (player.power + 1).min(MAX_POWER),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u64,
    pub pos: Position,
    pub kind: PowerUpKind,
}

/// Room lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Playing,
    /// Terminal
    Finished,
}

/// Complete state of one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub room_id: Uuid,
    pub tick: u64,
    pub players: Vec<Player>,
    pub bombs: Vec<Bomb>,
    pub explosions: Vec<Explosion>,
    pub power_ups: Vec<PowerUp>,
    pub grid: Grid,
    pub status: GameStatus,
    pub winner: Option<Uuid>,
    /// Remaining match time in seconds
    pub time_left: f64,
    /// Source of bomb and power-up ids
    #[serde(default)]
    pub next_entity_id: u64,
}

impl GameState {
    pub fn new(room_id: Uuid, grid: Grid) -> Self {
        Self {
            room_id,
            tick: 0,
            players: Vec::new(),
            bombs: Vec::new(),
            explosions: Vec::new(),
            power_ups: Vec::new(),
            grid,
            status: GameStatus::Waiting,
            winner: None,
            time_left: MATCH_DURATION_SECS,
            next_entity_id: 1,
        }
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: Uuid) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn bomb_at(&self, pos: Position) -> bool {
        self.bombs.iter().any(|b| b.pos == pos)
    }

    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(Uuid::nil(), Grid::filled(0, 0, Cell::Empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(color: TeamColor) -> Player {
        Player::new(Uuid::new_v4(), "p".into(), Position::new(1, 1), color)
    }

    #[test]
    fn extra_bomb_is_capped_at_five() {
        let mut player = player(TeamColor::Red);
        for _ in 0..5 {
            PowerUpKind::ExtraBomb.apply(&mut player);
        }
        assert_eq!(player.max_bombs, 5);
        PowerUpKind::ExtraBomb.apply(&mut player);
        assert_eq!(player.max_bombs, 5);
    }

    #[test]
    fn speed_and_power_caps() {
        let mut player = player(TeamColor::Blue);
        for _ in 0..10 {
            PowerUpKind::Speed.apply(&mut player);
            PowerUpKind::BlastPower.apply(&mut player);
        }
        assert_eq!(player.speed, MAX_SPEED);
        assert_eq!(player.power, MAX_POWER);
    }

    #[test]
    fn grid_lookup_rejects_out_of_bounds() {
        let grid = Grid::filled(GRID_WIDTH, GRID_HEIGHT, Cell::Empty);
        assert_eq!(grid.get(Position::new(-1, 0)), None);
        assert_eq!(grid.get(Position::new(GRID_WIDTH as i32, 0)), None);
        assert_eq!(grid.get(Position::new(0, 0)), Some(Cell::Empty));
    }

    #[test]
    fn state_serializes_with_snake_case_tags() {
        let state = GameState::new(Uuid::nil(), Grid::filled(3, 3, Cell::Wall));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["grid"]["cells"][0][0], "wall");
    }
}
