//! threes-ai: a Threes! board engine + Expectimax move selection
//!
//! This crate provides:
//! - A compact `Board` type (16 four-bit ranks in a `u64`) with table-driven moves (`engine`)
//! - The virtual tile deck model (`deck`)
//! - An Expectimax search over moves, dealt tiles and tile placements (`expectimax`)
//! - JSON configuration for the search and its heuristic weights (`config`)
//! - A simulated game loop for running a policy end to end (`game`)
//!
//! Quick start:
//! ```
//! use threes_ai::deck::Deck;
//! use threes_ai::engine::{self as GameEngine, Board, Move};
//! use threes_ai::expectimax::{Expectimax, ExpectimaxConfig, NextTile};
//!
//! // One-time table init (optional, happens on first use otherwise)
//! GameEngine::new();
//!
//! let board = Board::from_ranks([
//!     3, 3, 0, 0,
//!     0, 1, 0, 0,
//!     0, 0, 2, 0,
//!     0, 0, 0, 0,
//! ]);
//! let (next, changed) = board.execute(Move::Left);
//! assert_eq!(next.rank_at(0, 0), 4);
//! assert!(!changed.is_empty());
//!
//! let mut ex = Expectimax::with_config(ExpectimaxConfig { depth_cap: Some(2), ..Default::default() });
//! assert!(ex.best_move(board, Deck::INITIAL, NextTile::One).is_some());
//! ```
//!
pub mod config;
pub mod deck;
pub mod engine;
pub mod expectimax;
pub mod game;
