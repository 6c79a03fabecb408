use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::deck::Deck;
use crate::engine::{self as GameEngine, Board, Changed, Move, Tables};

use super::heuristic::Heuristic;
use super::{
    bonus_choices, BranchEval, ExpectimaxConfig, NextTile, SearchStats, BONUS_BASE_RANK, BONUS_MIN_MAX_RANK,
    HIGH_CARD_FREQ,
};

/// Added to every legal top-level result so it beats an illegal move's 0.
const TOPLEVEL_EPSILON: f64 = 1e-6;

/// Per-evaluation state. Lives for one top-level move and is then dropped;
/// nothing here is shared between directions.
///
/// The transposition table is keyed on the board alone, ignoring the deck,
/// which trades some accuracy for far fewer expansions.
struct EvalState {
    trans_table: HashMap<Board, f64>,
    cur_depth: u32,
    max_depth: u32,
    depth_limit: u32,
    cache_hits: u64,
    moves_evaled: u64,
}

impl EvalState {
    fn new(depth_limit: u32) -> Self {
        Self { trans_table: HashMap::new(), cur_depth: 0, max_depth: 0, depth_limit, cache_hits: 0, moves_evaled: 0 }
    }

    fn stats(&self) -> SearchStats {
        SearchStats {
            nodes: self.moves_evaled,
            cache_hits: self.cache_hits,
            cache_size: self.trans_table.len(),
            max_depth: self.max_depth,
            peak_nodes: 0,
        }
    }
}

/// Single-threaded Expectimax search.
///
/// Holds the heuristic table built from the configured weights and borrows
/// the shared move tables. Searches are deterministic.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    tables: &'static Tables,
    heuristic: Heuristic,
    stats: SearchStats,
}

impl Expectimax {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        let heuristic = Heuristic::new(&cfg.weights);
        Self { cfg, tables: GameEngine::tables(), heuristic, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Pick the move with the highest expected value.
    ///
    /// `deck` is the deck *before* `tile` was dealt; the search takes the
    /// tile out itself. Returns `None` when no move is legal. Ties go to the
    /// earlier direction in `Up, Down, Left, Right` order.
    pub fn best_move(&mut self, board: Board, deck: Deck, tile: NextTile) -> Option<Move> {
        let branches = self.branch_evals(board, deck, tile);
        let mut best = f64::NEG_INFINITY;
        let mut best_move = None;
        for branch in branches.iter().filter(|branch| branch.legal) {
            if branch.ev > best {
                best = branch.ev;
                best_move = Some(branch.dir);
            }
        }
        best_move
    }

    /// Compute EV for each direction.
    ///
    /// Returns a fixed array in order: `[Up, Down, Left, Right]`; illegal
    /// moves are marked `legal=false` with `ev = 0`. Each direction gets a
    /// fresh transposition table.
    pub fn branch_evals(&mut self, board: Board, deck: Deck, tile: NextTile) -> [BranchEval; 4] {
        let mut total = SearchStats::default();
        let out = Move::ALL.map(|dir| match self.evaluate(board, deck, tile, dir) {
            Some((ev, stats)) => {
                total.merge(stats);
                BranchEval { dir, ev, legal: true }
            }
            None => BranchEval { dir, ev: 0.0, legal: false },
        });
        self.record(total);
        out
    }

    /// Expected value of playing `dir`; 0 if the move is illegal.
    pub fn score_toplevel_move(&mut self, board: Board, deck: Deck, tile: NextTile, dir: Move) -> f64 {
        match self.evaluate(board, deck, tile, dir) {
            Some((ev, stats)) => {
                self.record(stats);
                ev
            }
            None => 0.0,
        }
    }

    /// Actual game score of `board`.
    #[inline]
    pub fn score_board(&self, board: Board) -> f64 { self.tables.score(board) }

    /// Heuristic value of `board` under the configured weights.
    #[inline]
    pub fn score_heuristic(&self, board: Board) -> f64 { self.heuristic.score(board) }

    /// Statistics collected from the last call to [`Self::best_move`],
    /// [`Self::branch_evals`] or [`Self::score_toplevel_move`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    fn record(&mut self, stats: SearchStats) {
        let peak_nodes = self.stats.peak_nodes.max(stats.nodes);
        self.stats = SearchStats { peak_nodes, ..stats };
    }

    fn evaluate(&self, board: Board, deck: Deck, tile: NextTile, dir: Move) -> Option<(f64, SearchStats)> {
        let start = Instant::now();
        let mut state = EvalState::new(self.cfg.depth_limit(board));
        let ev = self.score_toplevel(&mut state, board, deck, tile, dir)?;
        debug!(
            direction = %dir,
            ev,
            nodes = state.moves_evaled,
            cache_hits = state.cache_hits,
            cache_size = state.trans_table.len(),
            max_depth = state.max_depth,
            elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
            "evaluated move"
        );
        Some((ev, state.stats()))
    }

    fn score_toplevel(&self, state: &mut EvalState, board: Board, deck: Deck, tile: NextTile, dir: Move) -> Option<f64> {
        let (new_board, changed) = self.tables.execute(dir, board);
        if changed.is_empty() {
            return None;
        }
        let max_rank = board.max_rank();
        let deck = deck.with_max_rank(max_rank);
        let result = match tile.rank() {
            Some(rank) => self.score_tileinsert_node(state, new_board, deck.without(rank), 1.0, dir, changed, rank),
            None => {
                // the exact bonus rank is hidden; average over every candidate
                let choices = bonus_choices(max_rank).max(1);
                let mut res = 0.0;
                for offset in 0..choices {
                    let rank = BONUS_BASE_RANK + offset as u8;
                    res += self.score_tileinsert_node(state, new_board, deck, 1.0, dir, changed, rank);
                }
                res / choices as f64
            }
        };
        Some(result + TOPLEVEL_EPSILON)
    }

    /// Max over legal moves, which may be negative on crowded high boards.
    /// A board with no legal move is lost and worth 0.
    fn score_move_node(&self, state: &mut EvalState, board: Board, deck: Deck, cprob: f32) -> f64 {
        if cprob < self.cfg.prob_cutoff || state.cur_depth >= state.depth_limit {
            state.max_depth = state.max_depth.max(state.cur_depth);
            return self.heuristic.score(board);
        }

        let cacheable = self.cfg.cache_enabled && state.cur_depth < self.cfg.cache_depth_limit;
        if cacheable {
            if let Some(&score) = state.trans_table.get(&board) {
                state.cache_hits += 1;
                return score;
            }
        }

        let mut best = f64::NEG_INFINITY;
        state.cur_depth += 1;
        for dir in Move::ALL {
            let (new_board, changed) = self.tables.execute(dir, board);
            state.moves_evaled += 1;
            if !changed.is_empty() {
                best = best.max(self.score_tilechoose_node(state, new_board, deck, cprob, dir, changed));
            }
        }
        state.cur_depth -= 1;
        if best == f64::NEG_INFINITY {
            best = 0.0;
        }

        if cacheable {
            state.trans_table.insert(board, best);
        }
        best
    }

    /// Expectation over which tile is dealt next.
    fn score_tilechoose_node(
        &self,
        state: &mut EvalState,
        board: Board,
        deck: Deck,
        cprob: f32,
        dir: Move,
        changed: Changed,
    ) -> f64 {
        let deck = deck.refilled();
        let max_rank = deck.max_rank();
        let mut div = deck.total() as f64;
        let mut bonus = 0.0;

        if max_rank >= BONUS_MIN_MAX_RANK {
            let choices = bonus_choices(max_rank);
            let share = cprob / choices as f32 / HIGH_CARD_FREQ as f32;
            for offset in 0..choices {
                let rank = BONUS_BASE_RANK + offset as u8;
                bonus += self.score_tileinsert_node(state, board, deck, share, dir, changed, rank);
            }
            bonus /= (choices * HIGH_CARD_FREQ) as f64;
            // standard tiles only get (FREQ - 1) / FREQ of the mass
            div *= HIGH_CARD_FREQ as f64 / (HIGH_CARD_FREQ - 1) as f64;
        }

        let mut res = 0.0;
        for tile in 1..=3u8 {
            let count = deck.count(tile) as f64;
            if count == 0.0 {
                continue;
            }
            let share = cprob * (count / div) as f32;
            res += self.score_tileinsert_node(state, board, deck.without(tile), share, dir, changed, tile) * count;
        }

        res / div + bonus
    }

    /// Expectation over which freed-up line the tile lands in.
    fn score_tileinsert_node(
        &self,
        state: &mut EvalState,
        board: Board,
        deck: Deck,
        cprob: f32,
        dir: Move,
        changed: Changed,
        tile: u8,
    ) -> f64 {
        let slots = changed.count();
        let cprob = cprob / slots as f32;
        let mut res = 0.0;
        for pos in changed.lines() {
            res += self.score_move_node(state, board.insert_tile(dir, pos, tile), deck, cprob);
        }
        res / slots as f64
    }
}

impl Default for Expectimax { fn default() -> Self { Self::new() } }

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> Expectimax {
        Expectimax::with_config(ExpectimaxConfig { prob_cutoff: 1e-2, depth_cap: Some(2), ..Default::default() })
    }

    fn sample_board() -> Board {
        Board::from_ranks([
            1, 0, 3, 0, //
            0, 2, 0, 0, //
            3, 0, 0, 1, //
            0, 0, 2, 0,
        ])
    }

    #[test]
    fn illegal_moves_score_zero() {
        let mut ex = quick();
        let b = Board::from_ranks([3, 4, 5, 6, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(ex.score_toplevel_move(b, Deck::INITIAL, NextTile::One, Move::Up), 0.0);
        assert_eq!(ex.score_toplevel_move(b, Deck::INITIAL, NextTile::One, Move::Left), 0.0);
        assert!(ex.score_toplevel_move(b, Deck::INITIAL, NextTile::One, Move::Down) > 0.0);
    }

    #[test]
    fn no_move_on_stuck_board() {
        let mut ex = quick();
        let stuck = Board::from_ranks([3, 4, 3, 4, 4, 3, 4, 3, 3, 4, 3, 4, 4, 3, 4, 3]);
        assert_eq!(ex.best_move(stuck, Deck::INITIAL, NextTile::Three), None);
        assert!(ex.branch_evals(stuck, Deck::INITIAL, NextTile::Three).iter().all(|b| !b.legal && b.ev == 0.0));
    }

    #[test]
    fn leaf_is_heuristic_when_cut_off() {
        // a cutoff above 1 turns every move node into a leaf, so a single
        // freed line gives back exactly the heuristic of the landed board
        let mut ex = Expectimax::with_config(ExpectimaxConfig { prob_cutoff: 2.0, ..Default::default() });
        let b = Board::from_ranks([0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let (moved, changed) = b.execute(Move::Left);
        assert_eq!(changed.count(), 1);
        let landed = moved.insert_tile(Move::Left, 0, 2);
        let ev = ex.score_toplevel_move(b, Deck::INITIAL, NextTile::Two, Move::Left);
        assert!((ev - (ex.score_heuristic(landed) + TOPLEVEL_EPSILON)).abs() < 1e-6);
    }

    fn crowded_high_board() -> Board {
        // only Down is legal, and every landed board has a negative heuristic
        Board::from_ranks([
            12, 13, 12, 13, //
            13, 12, 13, 12, //
            12, 13, 12, 13, //
            0, 0, 0, 0,
        ])
    }

    #[test]
    fn negative_legal_move_is_still_chosen() {
        let mut ex = Expectimax::with_config(ExpectimaxConfig { depth_cap: Some(0), ..Default::default() });
        let b = crowded_high_board();
        let branches = ex.branch_evals(b, Deck::INITIAL, NextTile::One);
        let legal: Vec<Move> = branches.iter().filter(|br| br.legal).map(|br| br.dir).collect();
        assert_eq!(legal, vec![Move::Down]);
        assert!(branches[Move::Down as usize].ev < 0.0);
        assert_eq!(ex.best_move(b, Deck::INITIAL, NextTile::One), Some(Move::Down));
    }

    #[test]
    fn move_node_keeps_negative_maximum() {
        let ex = Expectimax::new();
        let b = crowded_high_board();
        let mut state = EvalState::new(1);
        let score = ex.score_move_node(&mut state, b, Deck::INITIAL.with_max_rank(13), 1.0);
        assert!(score < 0.0, "{score}");
        assert_eq!(state.trans_table.get(&b), Some(&score));
    }

    #[test]
    fn tile_choice_weights_deck_and_bonus() {
        // every move node becomes a heuristic leaf
        let ex = Expectimax::with_config(ExpectimaxConfig { prob_cutoff: 2.0, ..Default::default() });
        let b = Board::from_ranks([
            0, 3, 0, 0, //
            0, 0, 0, 0, //
            0, 1, 0, 0, //
            0, 0, 0, 0,
        ]);
        let (moved, changed) = b.execute(Move::Left);
        assert_eq!(changed.count(), 2);
        let leaf = |rank: u8| {
            changed.lines().map(|pos| ex.score_heuristic(moved.insert_tile(Move::Left, pos, rank))).sum::<f64>() / 2.0
        };
        let close = |x: f64, y: f64| (x - y).abs() <= 1e-9 * y.abs().max(1.0);

        // max rank 8 unlocks bonus ranks 4 and 5
        let deck = Deck::from_counts(2, 1, 3).with_max_rank(8);
        let div = 6.0 * 21.0 / 20.0;
        let standard = (2.0 * leaf(1) + leaf(2) + 3.0 * leaf(3)) / div;
        let bonus = (leaf(4) + leaf(5)) / (2.0 * 21.0);
        let mut state = EvalState::new(3);
        let ev = ex.score_tilechoose_node(&mut state, moved, deck, 1.0, Move::Left, changed);
        assert!(close(ev, standard + bonus), "{ev} vs {}", standard + bonus);

        // no bonus below rank 7
        let deck = Deck::from_counts(2, 1, 3).with_max_rank(6);
        let plain = (2.0 * leaf(1) + leaf(2) + 3.0 * leaf(3)) / 6.0;
        let mut state = EvalState::new(3);
        let ev = ex.score_tilechoose_node(&mut state, moved, deck, 1.0, Move::Left, changed);
        assert!(close(ev, plain), "{ev} vs {plain}");
    }

    #[test]
    fn lost_board_is_worth_zero() {
        let ex = quick();
        let stuck = Board::from_ranks([3, 4, 3, 4, 4, 3, 4, 3, 3, 4, 3, 4, 4, 3, 4, 3]);
        let mut state = EvalState::new(3);
        assert_eq!(ex.score_move_node(&mut state, stuck, Deck::INITIAL, 1.0), 0.0);
        assert_eq!(state.moves_evaled, 4);
    }

    #[test]
    fn exhausted_deck_matches_fresh_deck() {
        let ex = quick();
        let b = sample_board();
        let (moved, changed) = b.execute(Move::Left);
        let mut s1 = EvalState::new(2);
        let mut s2 = EvalState::new(2);
        let empty = Deck::from_counts(0, 0, 0).with_max_rank(3);
        let fresh = Deck::INITIAL.with_max_rank(3);
        let a = ex.score_tilechoose_node(&mut s1, moved, empty, 1.0, Move::Left, changed);
        let c = ex.score_tilechoose_node(&mut s2, moved, fresh, 1.0, Move::Left, changed);
        assert_eq!(a, c);
    }

    #[test]
    fn cache_hits_reuse_values() {
        let mut ex = Expectimax::with_config(ExpectimaxConfig { prob_cutoff: 1e-3, ..Default::default() });
        let b = sample_board();
        let with_cache = ex.branch_evals(b, Deck::INITIAL, NextTile::One);
        assert!(ex.last_stats().cache_hits > 0);
        assert!(ex.last_stats().cache_size > 0);
        let cached_nodes = ex.last_stats().nodes;

        let mut ex = Expectimax::with_config(ExpectimaxConfig {
            prob_cutoff: 1e-3,
            cache_enabled: false,
            ..Default::default()
        });
        let without = ex.branch_evals(b, Deck::INITIAL, NextTile::One);
        assert_eq!(ex.last_stats().cache_hits, 0);
        assert!(ex.last_stats().nodes > cached_nodes);
        for (x, y) in with_cache.iter().zip(without.iter()) {
            assert_eq!(x.legal, y.legal);
        }
    }

    #[test]
    fn stats_track_peak() {
        let mut ex = quick();
        ex.best_move(sample_board(), Deck::INITIAL, NextTile::Three);
        let first = ex.last_stats();
        assert!(first.nodes > 0);
        assert_eq!(first.peak_nodes, first.nodes);
        assert!(first.max_depth <= 2);
        ex.reset_stats();
        assert_eq!(ex.last_stats(), SearchStats::default());
    }

    #[test]
    fn bonus_tile_searches_every_candidate() {
        let mut ex = quick();
        // max rank 8 -> bonus ranks 4 and 5
        let b = Board::from_ranks([8, 0, 0, 0, 0, 3, 0, 0, 0, 0, 1, 0, 0, 0, 0, 2]);
        let ev = ex.score_toplevel_move(b, Deck::INITIAL, NextTile::Bonus, Move::Down);
        assert!(ev > 0.0);
        // a bonus on a board without high tiles still evaluates
        let low = sample_board();
        assert!(ex.score_toplevel_move(low, Deck::INITIAL, NextTile::Bonus, Move::Left) > 0.0);
    }
}
