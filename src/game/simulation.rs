//! Pure per-tick transition and intent handling for one room

use rand::Rng;
use uuid::Uuid;

use crate::util::time::{tick_delta, BOMB_FUSE_TICKS};
use crate::ws::protocol::{Action, GameEvent};

use super::combat::CollisionEngine;
use super::destruction::Destruction;
use super::explosion::ExplosionResolver;
use super::grid::GridGenerator;
use super::replication::Intent;
use super::state::{Bomb, GameState, GameStatus, Player, Position, TeamColor};

/// Players needed before a room starts playing
pub const MIN_PLAYERS: usize = 2;

/// Why a join was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Player already in room")]
    AlreadyJoined,

    #[error("Room is full")]
    RoomFull,

    #[error("Room is no longer accepting players")]
    NotWaiting,
}

/// Add a player with the first free color and its spawn corner.
///
/// Starts the match when the player count reaches [`MIN_PLAYERS`].
pub fn join(
    state: &mut GameState,
    player_id: Uuid,
    name: String,
    capacity: usize,
) -> Result<&Player, JoinError> {
    if state.player(player_id).is_some() {
        return Err(JoinError::AlreadyJoined);
    }
    if state.status != GameStatus::Waiting {
        return Err(JoinError::NotWaiting);
    }
    if state.players.len() >= capacity {
        return Err(JoinError::RoomFull);
    }

    let color = TeamColor::ALL
        .into_iter()
        .find(|c| state.players.iter().all(|p| p.color != *c))
        .ok_or(JoinError::RoomFull)?;
    let spawn = GridGenerator::spawn_positions()[color.slot()];

    state.players.push(Player::new(player_id, name, spawn, color));

    if state.players.len() >= MIN_PLAYERS {
        state.status = GameStatus::Playing;
    }

    let idx = state.players.len() - 1;
    Ok(&state.players[idx])
}

/// Remove a waiting player, or forfeit a playing one.
/// Returns false if nothing changed.
pub fn leave(state: &mut GameState, player_id: Uuid) -> bool {
    match state.status {
        GameStatus::Waiting => {
            let before = state.players.len();
            state.players.retain(|p| p.id != player_id);
            state.players.len() != before
        }
        GameStatus::Playing => match state.player_mut(player_id) {
            Some(player) if player.alive => {
                player.alive = false;
                true
            }
            _ => false,
        },
        GameStatus::Finished => false,
    }
}

/// Apply one intent immediately.
///
/// Intents are only honoured while playing, for living players, and when
/// their sequence number is fresh. A fresh intent consumes its sequence
/// number even when its action is refused, so a re-delivered copy can
/// never apply later. Returns whether the action changed the state.
pub fn apply_intent(state: &mut GameState, intent: &Intent, events: &mut Vec<GameEvent>) -> bool {
    if state.status != GameStatus::Playing {
        return false;
    }
    let Some(player) = state.player_mut(intent.player_id) else {
        return false;
    };
    if !player.alive || !intent.is_fresh(player.last_intent_seq) {
        return false;
    }
    player.last_intent_seq = intent.seq;

    match intent.action {
        Action::Move { x, y } => try_move(state, intent.player_id, Position::new(x, y), events),
        Action::PlaceBomb => try_place_bomb(state, intent.player_id, events),
        Action::CollectPowerUp { x, y } => {
            try_collect(state, intent.player_id, Position::new(x, y), events)
        }
    }
}

fn try_move(
    state: &mut GameState,
    player_id: Uuid,
    to: Position,
    events: &mut Vec<GameEvent>,
) -> bool {
    if !state.grid.is_empty_at(to) || state.bomb_at(to) {
        return false;
    }
    let Some(player) = state.player_mut(player_id) else {
        return false;
    };
    player.pos = to;

    if state.power_ups.iter().any(|p| p.pos == to) {
        try_collect(state, player_id, to, events);
    }
    true
}

fn try_place_bomb(state: &mut GameState, player_id: Uuid, events: &mut Vec<GameEvent>) -> bool {
    let Some(player) = state.player(player_id) else {
        return false;
    };
    if player.bomb_count >= player.max_bombs || state.bomb_at(player.pos) {
        return false;
    }
    let (pos, power) = (player.pos, player.power);

    let bomb_id = state.allocate_id();
    state.bombs.push(Bomb {
        id: bomb_id,
        owner_id: player_id,
        pos,
        timer: BOMB_FUSE_TICKS,
        power,
    });
    if let Some(player) = state.player_mut(player_id) {
        player.bomb_count += 1;
    }

    events.push(GameEvent::BombPlaced {
        bomb_id,
        owner_id: player_id,
        x: pos.x,
        y: pos.y,
    });
    true
}

fn try_collect(
    state: &mut GameState,
    player_id: Uuid,
    at: Position,
    events: &mut Vec<GameEvent>,
) -> bool {
    let Some(idx) = state.power_ups.iter().position(|p| p.pos == at) else {
        return false;
    };
    if state.player(player_id).is_none() {
        return false;
    }
    let power_up = state.power_ups.remove(idx);
    if let Some(player) = state.player_mut(player_id) {
        power_up.kind.apply(player);
    }

    events.push(GameEvent::PowerUpCollected {
        player_id,
        kind: power_up.kind,
        x: at.x,
        y: at.y,
    });
    true
}

/// Advance a playing room by one tick.
///
/// Order: fuses, detonations (including chains), bomb removal, explosion
/// decay, player damage, terrain destruction, clock, termination. Rooms that
/// are waiting or finished come back unchanged.
pub fn step<R: Rng + ?Sized>(mut state: GameState, rng: &mut R) -> (GameState, Vec<GameEvent>) {
    let mut events = Vec::new();
    if state.status != GameStatus::Playing {
        return (state, events);
    }
    state.tick += 1;

    for bomb in &mut state.bombs {
        bomb.timer = bomb.timer.saturating_sub(1);
    }

    let detonated = detonate_bombs(&mut state, &mut events);

    for explosion in &mut state.explosions {
        explosion.timer = explosion.timer.saturating_sub(1);
    }
    state.explosions.retain(|e| e.timer > 0);

    for player_id in CollisionEngine::apply_damage(&mut state.players, &state.explosions) {
        if let Some(player) = state.player(player_id) {
            events.push(GameEvent::PlayerKilled {
                player_id,
                x: player.pos.x,
                y: player.pos.y,
            });
        }
    }

    if detonated > 0 {
        let next_id = &mut state.next_entity_id;
        let (grid, power_ups) = Destruction::apply(&state.grid, &state.explosions, rng, || {
            let id = *next_id;
            *next_id += 1;
            id
        });
        state.grid = grid;
        for power_up in &power_ups {
            events.push(GameEvent::PowerUpSpawned {
                power_up_id: power_up.id,
                kind: power_up.kind,
                x: power_up.pos.x,
                y: power_up.pos.y,
            });
        }
        state.power_ups.extend(power_ups);
    }

    state.time_left = (state.time_left - tick_delta()).max(0.0);
    // Absorb float drift so the budget hits zero on the expected tick
    if state.time_left < tick_delta() * 1e-3 {
        state.time_left = 0.0;
    }

    evaluate_termination(&mut state);

    (state, events)
}

/// Detonate every bomb whose fuse has run out, then any bomb caught in those
/// blasts, until no more go off. Blasts resolve against the terrain as it was
/// at the start of the tick. Returns the number of bombs detonated.
fn detonate_bombs(state: &mut GameState, events: &mut Vec<GameEvent>) -> usize {
    let mut detonated = 0;
    let mut chained = false;

    loop {
        let (ready, pending): (Vec<Bomb>, Vec<Bomb>) =
            std::mem::take(&mut state.bombs).into_iter().partition(|b| b.timer == 0);
        state.bombs = pending;
        if ready.is_empty() {
            break;
        }

        for bomb in ready {
            let blast = ExplosionResolver::resolve(&bomb, &state.grid);

            for other in state.bombs.iter_mut() {
                if blast.iter().any(|e| e.pos == other.pos) {
                    other.timer = 0;
                }
            }
            state.explosions.extend(blast);

            if let Some(owner) = state.player_mut(bomb.owner_id) {
                owner.bomb_count = owner.bomb_count.saturating_sub(1);
            }

            events.push(GameEvent::BombDetonated {
                bomb_id: bomb.id,
                owner_id: bomb.owner_id,
                x: bomb.pos.x,
                y: bomb.pos.y,
                chained,
            });
            detonated += 1;
        }
        chained = true;
    }

    detonated
}

/// Finish the match once at most one player is alive or time is up
fn evaluate_termination(state: &mut GameState) {
    if state.status != GameStatus::Playing {
        return;
    }
    let mut alive = state.players.iter().filter(|p| p.alive);
    let first = alive.next().map(|p| p.id);
    let more = alive.next().is_some();

    if !more || state.time_left <= 0.0 {
        state.status = GameStatus::Finished;
        state.winner = if more { None } else { first };
    }
}
