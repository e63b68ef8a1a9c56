//! Explosion damage against players

use std::collections::HashSet;

use uuid::Uuid;

use super::state::{Explosion, Player, Position};

/// Applies blast damage to players
pub struct CollisionEngine;

impl CollisionEngine {
    /// Kill every living player standing on a burning cell.
    /// Returns the ids of players killed by this call, in player order.
    pub fn apply_damage(players: &mut [Player], explosions: &[Explosion]) -> Vec<Uuid> {
        if explosions.is_empty() {
            return Vec::new();
        }

        let burning: HashSet<Position> = explosions.iter().map(|e| e.pos).collect();
        let mut killed = Vec::new();

        for player in players.iter_mut() {
            if !player.alive {
                continue;
            }
            if burning.contains(&player.pos) {
                player.alive = false;
                killed.push(player.id);
            }
        }

        killed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{BlastArm, TeamColor};

    fn player_at(x: i32, y: i32, color: TeamColor) -> Player {
        Player::new(Uuid::new_v4(), format!("{color:?}"), Position::new(x, y), color)
    }

    fn burn(x: i32, y: i32) -> Explosion {
        Explosion {
            pos: Position::new(x, y),
            arm: BlastArm::Left,
            timer: 5,
        }
    }

    #[test]
    fn players_on_burning_cells_die() {
        let mut players = vec![player_at(1, 1, TeamColor::Red), player_at(3, 1, TeamColor::Blue)];
        let killed = CollisionEngine::apply_damage(&mut players, &[burn(1, 1), burn(2, 1)]);

        assert_eq!(killed, vec![players[0].id]);
        assert!(!players[0].alive);
        assert!(players[1].alive);
    }

    #[test]
    fn repeated_application_is_idempotent() {
        let mut players = vec![player_at(1, 1, TeamColor::Red), player_at(1, 1, TeamColor::Green)];
        let explosions = [burn(1, 1)];

        let first = CollisionEngine::apply_damage(&mut players, &explosions);
        assert_eq!(first.len(), 2);
        let snapshot = players.clone();

        let second = CollisionEngine::apply_damage(&mut players, &explosions);
        assert!(second.is_empty());
        assert_eq!(players, snapshot);
    }

    #[test]
    fn dead_players_keep_their_position() {
        let mut players = vec![player_at(5, 5, TeamColor::Yellow)];
        players[0].alive = false;
        CollisionEngine::apply_damage(&mut players, &[burn(5, 5)]);
        assert_eq!(players[0].pos, Position::new(5, 5));
        assert!(!players[0].alive);
    }
}
