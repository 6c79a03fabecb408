//! Expectimax move selection for Threes.
//!
//! The tree alternates between the player's move and two chance layers:
//! which tile is dealt (weighted by what is left in the deck, plus the rare
//! bonus tile) and where it lands (uniform over the lines the move freed up).
//! Instead of a fixed ply count, a branch stops expanding once the product of
//! chance probabilities along it drops below `prob_cutoff` or it runs into
//! the per-board depth limit; either way it is valued by the heuristic.
//!
//! Quick start
//! ```
//! use threes_ai::deck::Deck;
//! use threes_ai::engine::Board;
//! use threes_ai::expectimax::{Expectimax, ExpectimaxConfig, NextTile};
//!
//! let board = Board::from_ranks([
//!     1, 0, 3, 0,
//!     0, 2, 0, 0,
//!     3, 0, 0, 1,
//!     0, 0, 2, 0,
//! ]);
//! let cfg = ExpectimaxConfig { depth_cap: Some(2), ..Default::default() };
//! let mut ex = Expectimax::with_config(cfg);
//! let mv = ex.best_move(board, Deck::INITIAL, NextTile::Two);
//! assert!(mv.is_some());
//! ```

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::deck::Deck;
use crate::engine::{Board, Move};

mod heuristic;
mod search;

pub use heuristic::{Heuristic, HeuristicWeights};
pub use search::Expectimax;

/// One in this many deals is a bonus tile once bonus tiles are unlocked.
pub const HIGH_CARD_FREQ: u32 = 21;

/// Bonus tiles appear once the board holds a tile of at least this rank (48).
pub const BONUS_MIN_MAX_RANK: u8 = 7;

/// The smallest bonus tile (rank 4, face value 6).
pub const BONUS_BASE_RANK: u8 = 4;

/// Number of distinct bonus ranks on offer for a board whose highest rank is
/// `max_rank`: ranks `4..=max_rank - 3`.
#[inline]
pub fn bonus_choices(max_rank: u8) -> u32 {
    if max_rank >= BONUS_MIN_MAX_RANK { (max_rank - 6) as u32 } else { 0 }
}

/// Configurable knobs for Expectimax.
///
/// - `prob_cutoff`: stop expanding once the cumulative probability of reaching a node falls below this.
/// - `cache_depth_limit`: only move nodes shallower than this are cached.
/// - `min_depth` / `depth_offset`: depth limit is `max(min_depth, distinct_high_tiles - depth_offset)`.
/// - `depth_cap`: optional hard cap on that limit.
/// - `cache_enabled`: enable/disable the transposition table.
/// - `weights`: heuristic weights used at the leaves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectimaxConfig {
    pub prob_cutoff: f32,
    pub cache_depth_limit: u32,
    pub min_depth: u32,
    pub depth_offset: u32,
    pub depth_cap: Option<u32>,
    pub cache_enabled: bool,
    pub weights: HeuristicWeights,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            prob_cutoff: 1e-4,
            cache_depth_limit: 6,
            min_depth: 3,
            depth_offset: 2,
            depth_cap: None,
            cache_enabled: true,
            weights: HeuristicWeights::default(),
        }
    }
}

impl ExpectimaxConfig {
    /// Depth limit for a search rooted at `board`. Boards with more distinct
    /// high tiles search deeper.
    pub fn depth_limit(&self, board: Board) -> u32 {
        let distinct = board.count_distinct_high_tiles();
        let dyn_depth = self.min_depth.max(distinct.saturating_sub(self.depth_offset));
        match self.depth_cap {
            Some(cap) => dyn_depth.min(cap),
            None => dyn_depth,
        }
    }
}

/// The upcoming tile as the game reveals it.
///
/// The game shows 1, 2 and 3 exactly but only hints "3+" for a bonus tile,
/// so a bonus is searched as an average over every rank it could be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextTile {
    One,
    Two,
    Three,
    Bonus,
}

impl NextTile {
    /// Rank 0 is not a tile; ranks 1..=3 are themselves; anything higher is a bonus.
    pub fn from_rank(rank: u8) -> Option<NextTile> {
        match rank {
            0 => None,
            1 => Some(NextTile::One),
            2 => Some(NextTile::Two),
            3 => Some(NextTile::Three),
            _ => Some(NextTile::Bonus),
        }
    }

    /// The deck rank of a standard tile; `None` for a bonus.
    pub fn rank(self) -> Option<u8> {
        match self {
            NextTile::One => Some(1),
            NextTile::Two => Some(2),
            NextTile::Three => Some(3),
            NextTile::Bonus => None,
        }
    }
}

/// Per-branch expected value at the root.
///
/// - `ev` is the expected value for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchStats {
    /// Moves executed inside the tree.
    pub nodes: u64,
    pub cache_hits: u64,
    /// Boards stored in the transposition tables.
    pub cache_size: usize,
    /// Deepest move node that reached a heuristic leaf.
    pub max_depth: u32,
    /// Largest `nodes` seen since the last reset.
    pub peak_nodes: u64,
}

impl SearchStats {
    fn merge(&mut self, other: SearchStats) {
        self.nodes += other.nodes;
        self.cache_hits += other.cache_hits;
        self.cache_size += other.cache_size;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// Best move with a default-configured search. Builds the heuristic table on
/// every call; hold an [`Expectimax`] to reuse it.
///
/// `deck` is the deck *before* `tile` was dealt.
pub fn find_best_move(board: Board, deck: Deck, tile: NextTile) -> Option<Move> {
    Expectimax::new().best_move(board, deck, tile)
}

static DEFAULT_HEURISTIC: OnceLock<Heuristic> = OnceLock::new();

/// Heuristic value of `board` under the default weights.
pub fn score_heuristic(board: Board) -> f64 {
    DEFAULT_HEURISTIC.get_or_init(Heuristic::default).score(board)
}
