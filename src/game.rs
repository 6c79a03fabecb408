//! A simulated game for driving a policy end to end.
//!
//! This is the outer loop the search plugs into: it owns the randomness
//! (dealing from the deck, the occasional bonus tile, which freed line the
//! tile lands in) and asks a policy for a move each turn.

use rand::Rng;
use tracing::{trace, warn};

use crate::deck::Deck;
use crate::engine::{Board, Move};
use crate::expectimax::{bonus_choices, NextTile, BONUS_BASE_RANK, BONUS_MIN_MAX_RANK, HIGH_CARD_FREQ};

/// Tiles dealt onto the starting board.
const INITIAL_TILES: usize = 9;

/// How a finished game ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameSummary {
    pub score: f64,
    pub max_rank: u8,
    pub moves: u32,
    pub board: Board,
}

pub struct Game<R: Rng> {
    board: Board,
    deck: Deck,
    moves: u32,
    rng: R,
}

impl<R: Rng> Game<R> {
    /// Deal a fresh starting board.
    ///
    /// ```
    /// use threes_ai::game::Game;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let game = Game::new(StdRng::seed_from_u64(1));
    /// assert_eq!(game.board().count_empty(), 7);
    /// assert_eq!(game.deck().total(), 3);
    /// ```
    pub fn new(mut rng: R) -> Self {
        let mut deck = Deck::INITIAL;
        let board = initial_board(&mut deck, &mut rng);
        Self { board, deck, moves: 0, rng }
    }

    /// Resume from a known position.
    pub fn from_state(board: Board, deck: Deck, rng: R) -> Self {
        Self { board, deck, moves: 0, rng }
    }

    #[inline]
    pub fn board(&self) -> Board { self.board }

    #[inline]
    pub fn deck(&self) -> Deck { self.deck }

    #[inline]
    pub fn moves(&self) -> u32 { self.moves }

    /// Deal the next tile.
    ///
    /// Returns the tile's rank and the deck as it stood *before* the deal,
    /// which is what the search expects to be handed.
    pub fn deal(&mut self) -> (u8, Deck) {
        self.deck = self.deck.refilled();
        let before = self.deck;
        let max_rank = self.board.max_rank();
        if max_rank >= BONUS_MIN_MAX_RANK && self.rng.gen_range(0..HIGH_CARD_FREQ) == 0 {
            let offset = self.rng.gen_range(0..bonus_choices(max_rank)) as u8;
            return (BONUS_BASE_RANK + offset, before);
        }
        let (tile, rest) = self.deck.draw(&mut self.rng);
        self.deck = rest;
        (tile, before)
    }

    /// Play `dir` and drop `tile` into one of the freed lines at random.
    ///
    /// Returns false, leaving the board as is, if the move is illegal.
    pub fn apply(&mut self, dir: Move, tile: u8) -> bool {
        let (moved, changed) = self.board.execute(dir);
        if changed.is_empty() {
            return false;
        }
        let choice = self.rng.gen_range(0..changed.count()) as usize;
        let Some(pos) = changed.lines().nth(choice) else { return false };
        self.board = moved.insert_tile(dir, pos, tile);
        self.moves += 1;
        true
    }

    /// Run until the policy gives up, the board locks, or `max_moves` is reached.
    pub fn play<P>(mut self, mut policy: P, max_moves: Option<u32>) -> GameSummary
    where
        P: FnMut(Board, Deck, NextTile) -> Option<Move>,
    {
        while max_moves.map_or(true, |limit| self.moves < limit) {
            let (tile, deck) = self.deal();
            let Some(next) = NextTile::from_rank(tile) else { break };
            let Some(dir) = policy(self.board, deck, next) else { break };
            if !self.apply(dir, tile) {
                warn!(direction = %dir, board = ?self.board, "policy chose an illegal move");
                break;
            }
            trace!(moves = self.moves, direction = %dir, tile, board = ?self.board, "applied move");
        }
        self.summary()
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary { score: self.board.score(), max_rank: self.board.max_rank(), moves: self.moves, board: self.board }
    }
}

/// Nine tiles dealt from `deck`, shuffled over the sixteen cells.
fn initial_board<R: Rng + ?Sized>(deck: &mut Deck, rng: &mut R) -> Board {
    let mut cells = [0u8; 16];
    for cell in cells.iter_mut().take(INITIAL_TILES) {
        let (tile, rest) = deck.draw(rng);
        *cell = tile;
        *deck = rest;
    }
    // Fisher-Yates
    for i in (1..cells.len()).rev() {
        let j = rng.gen_range(0..=i);
        cells.swap(i, j);
    }
    Board::from_ranks(cells)
}
