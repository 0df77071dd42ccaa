#![allow(dead_code)]

use rankmap::{Ranked, RankMap, Standing};

/// Leaderboard row with a display-only rank, filled in by snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub id: u32,
    pub score: i64,
    pub level: u32,
    pub rank: usize,
}

impl Player {
    pub fn new(id: u32, score: i64) -> Self {
        Self {
            id,
            score,
            level: 0,
            rank: 0,
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }
}

impl Ranked for Player {
    type Key = u32;
    type Score = i64;

    fn key(&self) -> &u32 {
        &self.id
    }

    fn score(&self) -> &i64 {
        &self.score
    }

    fn snapshot(&self) -> Self {
        Self {
            id: self.id,
            score: self.score,
            level: self.level,
            rank: self.rank,
        }
    }
}

pub type Board = RankMap<Player>;

/// Scores `[15, 5, 20, 10, 20, 20]` for players 1..=6, upserted in the
/// order 1, 2, 3, 4, 6, 5.
pub fn sample_board() -> Board {
    let mut board = Board::new();
    for (id, score) in [(1, 15), (2, 5), (3, 20), (4, 10), (6, 20), (5, 20)] {
        board.upsert(Player::new(id, score));
    }
    board
}

pub fn ids<'a>(players: impl IntoIterator<Item = &'a Player>) -> Vec<u32> {
    players.into_iter().map(|p| p.id).collect()
}

pub fn standings(rows: &[Standing<Player>]) -> Vec<(usize, u32)> {
    rows.iter().map(|s| (s.rank, s.entry.id)).collect()
}
