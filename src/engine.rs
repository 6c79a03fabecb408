use std::fmt;
use std::sync::OnceLock;

use thiserror::Error;

/// A direction to slide tiles.
///
/// Discriminants double as indices into the move tables and match the
/// order the search visits directions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Move {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Move {
    /// All directions in search order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    #[inline]
    pub fn index(self) -> usize { self as usize }

    /// Map `0..4` onto a direction; anything else is `None`.
    #[inline]
    pub fn from_index(idx: usize) -> Option<Move> { Move::ALL.get(idx).copied() }

    /// Single-letter label (`U`, `D`, `L`, `R`).
    pub fn as_char(self) -> char {
        match self {
            Move::Up => 'U',
            Move::Down => 'D',
            Move::Left => 'L',
            Move::Right => 'R',
        }
    }
}

impl TryFrom<u8> for Move {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Move::from_index(value as usize).ok_or(EngineError::InvalidDirection(value))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid direction index {0} (expected 0..=3)")]
    InvalidDirection(u8),
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines
const ROW_MASK: u64 = 0xFFFF;
const COL_MASK: u64 = 0x000F_000F_000F_000F;

/// Highest rank a nibble can hold. Merging two of these yields one of these.
pub const MAX_RANK: u8 = 15;

type BoardRaw = u64;
type Line = u16;

/// Packed 4x4 Threes board: 16 nibbles in a `u64`, cell `(row, col)` at bit
/// offset `4 * (4 * row + col)`.
///
/// A nibble holds a rank: 0 is empty, 1 and 2 are the literal tiles, and
/// rank `r >= 3` is the tile `3 * 2^(r - 3)` (3, 6, 12, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Sentinel returned for an out-of-range direction index.
    pub const INVALID: Board = Board(!0);

    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    #[inline]
    pub fn into_raw(self) -> BoardRaw { self.0 }

    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from row-major ranks. Values above 15 are masked to a nibble.
    ///
    /// ```
    /// use threes_ai::engine::Board;
    /// let b = Board::from_ranks([
    ///     1, 2, 3, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 5,
    /// ]);
    /// assert_eq!(b.rank_at(0, 2), 3);
    /// assert_eq!(b.rank_at(3, 3), 5);
    /// ```
    pub fn from_ranks(ranks: [u8; 16]) -> Self {
        let raw = ranks
            .iter()
            .enumerate()
            .fold(0u64, |acc, (idx, &rank)| acc | ((rank as u64 & 0xf) << (4 * idx)));
        Board(raw)
    }

    /// Row-major ranks.
    pub fn ranks(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = ((self.0 >> (4 * idx)) & 0xf) as u8;
        }
        out
    }

    #[inline]
    pub fn rank_at(self, row: usize, col: usize) -> u8 {
        ((self.0 >> (4 * (4 * row + col))) & 0xf) as u8
    }

    /// Row `idx` as a dense line, column 0 in the low nibble.
    #[inline]
    pub fn row(self, idx: usize) -> Line { extract_row(self.0, idx) }

    /// Column `idx` packed into a dense line, row 0 in the low nibble.
    #[inline]
    pub fn col(self, idx: usize) -> Line { extract_col(self.0, idx) }

    #[inline]
    pub fn transpose(self) -> Board { Board(transpose(self.0)) }

    /// Slide in `dir`, returning the new board and which lines moved.
    ///
    /// ```
    /// use threes_ai::engine::{Board, Move};
    /// let b = Board::from_ranks([3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    /// let (next, changed) = b.execute(Move::Left);
    /// assert_eq!(next.rank_at(0, 0), 4);
    /// assert_eq!(changed.count(), 1);
    /// ```
    #[inline]
    pub fn execute(self, dir: Move) -> (Board, Changed) { tables().execute(dir, self) }

    /// Slide in `dir`, discarding the changed-descriptor.
    #[inline]
    pub fn shift(self, dir: Move) -> Board { self.execute(dir).0 }

    /// Place `tile` in the cell a move in `dir` vacates on line `pos`.
    ///
    /// `pos` must be below 4 and the target cell must be empty; this only ORs
    /// the rank in.
    #[inline]
    pub fn insert_tile(self, dir: Move, pos: usize, tile: u8) -> Board {
        let shift = match dir {
            Move::Up => 48 + 4 * pos,
            Move::Down => 4 * pos,
            Move::Left => 12 + 16 * pos,
            Move::Right => 16 * pos,
        };
        Board(self.0 | ((tile as u64 & 0xf) << shift))
    }

    /// Game score: every tile of rank `r >= 3` is worth `3^(r - 2)`.
    #[inline]
    pub fn score(self) -> f64 { tables().score(self) }

    /// True if no direction changes the board.
    #[inline]
    pub fn is_game_over(self) -> bool { is_game_over(self) }

    pub fn max_rank(self) -> u8 {
        let mut board = self.0;
        let mut max_rank = 0;
        while board != 0 {
            max_rank = max_rank.max((board & 0xf) as u8);
            board >>= 4;
        }
        max_rank
    }

    // https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
    /// Count the number of empty cells.
    pub fn count_empty(self) -> u32 {
        let mut board = self.0;
        board |= board >> 1;
        board |= board >> 2;
        board &= 0x1111_1111_1111_1111;
        16 - board.count_ones()
    }

    /// Number of distinct ranks `>= 3` on the board.
    pub fn count_distinct_high_tiles(self) -> u32 {
        let mut bitset = 0u16;
        let mut board = self.0;
        while board != 0 {
            bitset |= 1 << (board & 0xf);
            board >>= 4;
        }
        // don't count empty, 1 or 2
        (bitset >> 3).count_ones()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..4 {
            let cells: Vec<String> = (0..4).map(|col| format_val(self.rank_at(row, col))).collect();
            writeln!(f, "{}", cells.join("|"))?;
            if row < 3 {
                writeln!(f, "{}", "-".repeat(31))?;
            }
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }

/// Which lines a move touched: `(count << 8) | mask`, bit `i` of `mask` set
/// iff row/column `i` moved.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Changed(u32);

impl Changed {
    pub const NONE: Changed = Changed(0);

    #[inline]
    pub fn from_raw(raw: u32) -> Self { Changed(raw) }

    #[inline]
    pub fn raw(self) -> u32 { self.0 }

    /// Number of lines that moved.
    #[inline]
    pub fn count(self) -> u32 { self.0 >> 8 }

    #[inline]
    pub fn mask(self) -> u8 { (self.0 & 0xf) as u8 }

    /// True when the move was illegal.
    #[inline]
    pub fn is_empty(self) -> bool { self.0 == 0 }

    /// Indices of the lines that moved, ascending.
    pub fn lines(self) -> impl Iterator<Item = usize> {
        let mask = self.mask();
        (0..4).filter(move |line| mask & (1 << line) != 0)
    }

    #[inline]
    fn mark(&mut self, line: usize) { self.0 += 0x100 + (1 << line); }
}

impl fmt::Debug for Changed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Changed(count={}, mask={:04b})", self.count(), self.mask())
    }
}

/// Precomputed lookup tables over every 16-bit line.
///
/// `shift[dir]` maps a line (a row, or a packed column) to `old ^ new` for a
/// slide toward that direction, so a zero entry means the line cannot move.
/// The row tables hold 16-bit deltas; the column tables hold deltas already
/// spread out to column 0 of a full board. `score[line]` is the line's game
/// score.
pub struct Tables {
    shift: [Box<[u64]>; 4],
    score: Box<[f64]>,
}

impl Tables {
    /// Build every table from scratch. Prefer [`tables`] for the shared copy.
    pub fn build() -> Self {
        // Allocate on the heap to avoid large stack frames
        let mut up = vec![0u64; LINE_TABLE_SIZE];
        let mut down = vec![0u64; LINE_TABLE_SIZE];
        let mut left = vec![0u64; LINE_TABLE_SIZE];
        let mut right = vec![0u64; LINE_TABLE_SIZE];
        let mut score = vec![0f64; LINE_TABLE_SIZE];

        for idx in 0..LINE_TABLE_SIZE {
            let row = idx as Line;
            score[idx] = calc_score(row);

            let Some(result) = slide_line(row) else { continue };
            let rev_row = reverse_row(row);
            let rev_result = reverse_row(result);

            left[row as usize] = (row ^ result) as u64;
            right[rev_row as usize] = (rev_row ^ rev_result) as u64;
            up[row as usize] = unpack_col(row) ^ unpack_col(result);
            down[rev_row as usize] = unpack_col(rev_row) ^ unpack_col(rev_result);
        }

        Tables {
            shift: [
                up.into_boxed_slice(),
                down.into_boxed_slice(),
                left.into_boxed_slice(),
                right.into_boxed_slice(),
            ],
            score: score.into_boxed_slice(),
        }
    }

    /// Apply a move with one lookup per line.
    pub fn execute(&self, dir: Move, board: Board) -> (Board, Changed) {
        let table = &self.shift[dir.index()];
        let raw = board.raw();
        let mut result = raw;
        let mut changed = Changed::NONE;
        for line in 0..4 {
            let (key, offset) = match dir {
                Move::Left | Move::Right => (extract_row(raw, line), 16 * line),
                Move::Up | Move::Down => (extract_col(raw, line), 4 * line),
            };
            let delta = get_line_entry(table, key);
            if delta != 0 {
                changed.mark(line);
                result ^= delta << offset;
            }
        }
        (Board(result), changed)
    }

    /// Raw XOR delta for `line` under `dir`.
    #[inline]
    pub fn line_delta(&self, dir: Move, line: Line) -> u64 {
        get_line_entry(&self.shift[dir.index()], line)
    }

    /// Sum of the four row scores.
    pub fn score(&self, board: Board) -> f64 {
        (0..4).fold(0.0, |acc, idx| acc + self.line_score(extract_row(board.raw(), idx)))
    }

    #[inline]
    pub fn line_score(&self, line: Line) -> f64 {
        // tables always hold LINE_TABLE_SIZE entries and `line` is 16 bits
        unsafe { *self.score.get_unchecked(line as usize) }
    }
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Initialize the shared tables. Safe to call multiple times.
pub fn new() {
    let _ = tables();
}

/// The process-wide tables, built on first use and read-only afterwards.
#[inline]
pub fn tables() -> &'static Tables {
    TABLES.get_or_init(Tables::build)
}

/// Apply `dir` to `board` using the shared tables.
#[inline]
pub fn execute_move(dir: Move, board: Board) -> (Board, Changed) { tables().execute(dir, board) }

/// Untyped variant of [`execute_move`] for callers holding a raw index.
///
/// An index outside `0..4` is a caller bug; it yields
/// `(Board::INVALID, Changed::NONE)` rather than a recoverable error.
pub fn execute_move_index(idx: usize, board: Board) -> (Board, Changed) {
    match Move::from_index(idx) {
        Some(dir) => execute_move(dir, board),
        None => (Board::INVALID, Changed::NONE),
    }
}

/// Untyped variant of [`Board::insert_tile`]; an out-of-range direction or
/// line yields `Board::INVALID`.
pub fn insert_tile_index(idx: usize, board: Board, pos: usize, tile: u8) -> Board {
    match Move::from_index(idx) {
        Some(dir) if pos < 4 => board.insert_tile(dir, pos, tile),
        _ => Board::INVALID,
    }
}

/// Actual game score of a board.
#[inline]
pub fn score_board(board: Board) -> f64 { tables().score(board) }

/// True if no move in any direction changes the board.
pub fn is_game_over(board: Board) -> bool {
    Move::ALL.iter().all(|&dir| execute_move(dir, board).1.is_empty())
}

/// Face value of a rank: 1, 2, then 3, 6, 12, ...
pub fn tile_value(rank: u8) -> u32 {
    match rank {
        0..=2 => rank as u32,
        r => 3 << (r - 3),
    }
}

#[inline]
pub fn extract_row(board: BoardRaw, idx: usize) -> Line {
    ((board >> (16 * idx)) & ROW_MASK) as Line
}

#[inline]
pub fn extract_col(board: BoardRaw, idx: usize) -> Line {
    pack_col((board >> (4 * idx)) & COL_MASK)
}

/// Squeeze the nibbles at bits 0, 16, 32, 48 into a dense line.
#[inline]
pub fn pack_col(col: BoardRaw) -> Line {
    (col | (col >> 12) | (col >> 24) | (col >> 36)) as Line
}

/// Inverse of [`pack_col`]: spread a dense line over column 0.
#[inline]
pub fn unpack_col(row: Line) -> BoardRaw {
    let tmp = row as u64;
    (tmp | (tmp << 12) | (tmp << 24) | (tmp << 36)) & COL_MASK
}

#[inline]
pub fn reverse_row(row: Line) -> Line {
    (row >> 12) | ((row >> 4) & 0x00F0) | ((row << 4) & 0x0F00) | (row << 12)
}

// Credit to Nneonneo
/// Swap rows and columns.
#[inline]
pub fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

#[inline(always)]
fn get_line_entry(table: &[u64], idx: Line) -> u64 {
    debug_assert!((idx as usize) < LINE_TABLE_SIZE);
    unsafe { *table.get_unchecked(idx as usize) }
}

fn line_to_ranks(line: Line) -> [u8; 4] {
    [
        (line & 0xf) as u8,
        ((line >> 4) & 0xf) as u8,
        ((line >> 8) & 0xf) as u8,
        ((line >> 12) & 0xf) as u8,
    ]
}

fn ranks_to_line(ranks: [u8; 4]) -> Line {
    (ranks[0] as Line) | (ranks[1] as Line) << 4 | (ranks[2] as Line) << 8 | (ranks[3] as Line) << 12
}

/// One slide toward index 0. Threes moves every tile at most one cell and
/// performs at most one merge per line: the first cell that is empty, or can
/// absorb its neighbour, takes it and everything behind shifts up by one.
///
/// Returns `None` when no cell can absorb its neighbour.
fn slide_line(line: Line) -> Option<Line> {
    let mut ranks = line_to_ranks(line);
    let mut slot = None;
    for i in 0..3 {
        let (cur, next) = (ranks[i], ranks[i + 1]);
        let merged = match (cur, next) {
            (0, _) => Some(next),
            (1, 2) | (2, 1) => Some(3),
            (a, b) if a == b && a >= 3 => Some(if a < MAX_RANK { a + 1 } else { a }),
            _ => None,
        };
        if let Some(rank) = merged {
            ranks[i] = rank;
            slot = Some(i);
            break;
        }
    }
    let i = slot?;
    for j in i + 1..3 {
        ranks[j] = ranks[j + 1];
    }
    ranks[3] = 0;
    Some(ranks_to_line(ranks))
}

fn calc_score(line: Line) -> f64 {
    line_to_ranks(line)
        .iter()
        .filter(|&&rank| rank >= 3)
        .map(|&rank| 3f64.powi(rank as i32 - 2))
        .sum()
}

fn format_val(rank: u8) -> String {
    match rank {
        0 => " ".repeat(7),
        r => format!("{:^7}", tile_value(r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn row_board(row: usize, ranks: [u8; 4]) -> Board {
        let mut cells = [0u8; 16];
        cells[4 * row..4 * row + 4].copy_from_slice(&ranks);
        Board::from_ranks(cells)
    }

    fn row_ranks(board: Board, row: usize) -> [u8; 4] {
        line_to_ranks(board.row(row))
    }

    fn col_board(col: usize, ranks: [u8; 4]) -> Board {
        let mut cells = [0u8; 16];
        for (row, &rank) in ranks.iter().enumerate() {
            cells[4 * row + col] = rank;
        }
        Board::from_ranks(cells)
    }

    fn col_ranks(board: Board, col: usize) -> [u8; 4] {
        [board.rank_at(0, col), board.rank_at(1, col), board.rank_at(2, col), board.rank_at(3, col)]
    }

    fn left(ranks: [u8; 4]) -> [u8; 4] { row_ranks(row_board(1, ranks).shift(Move::Left), 1) }

    fn right(ranks: [u8; 4]) -> [u8; 4] { row_ranks(row_board(1, ranks).shift(Move::Right), 1) }

    #[test]
    fn it_slides_rows_left() {
        new();
        assert_eq!(left([0, 0, 0, 0]), [0, 0, 0, 0]);
        assert_eq!(left([1, 2, 0, 0]), [3, 0, 0, 0]);
        assert_eq!(left([2, 1, 3, 3]), [3, 3, 3, 0]);
        assert_eq!(left([3, 3, 3, 3]), [4, 3, 3, 0]);
        assert_eq!(left([1, 1, 2, 2]), [1, 3, 2, 0]);
        assert_eq!(left([0, 5, 0, 5]), [5, 0, 5, 0]);
        assert_eq!(left([0, 3, 3, 0]), [3, 3, 0, 0]);
        assert_eq!(left([3, 4, 5, 6]), [3, 4, 5, 6]);
        assert_eq!(left([1, 1, 1, 1]), [1, 1, 1, 1]);
        assert_eq!(left([2, 2, 0, 0]), [2, 2, 0, 0]);
    }

    #[test]
    fn it_slides_rows_right() {
        new();
        assert_eq!(right([0, 0, 2, 1]), [0, 0, 0, 3]);
        assert_eq!(right([3, 3, 3, 3]), [0, 3, 3, 4]);
        assert_eq!(right([5, 0, 5, 0]), [0, 5, 0, 5]);
        assert_eq!(right([1, 2, 3, 4]), [0, 3, 3, 4]);
        assert_eq!(right([3, 4, 5, 6]), [3, 4, 5, 6]);
        assert_eq!(right([6, 6, 0, 2]), [0, 6, 6, 2]);
    }

    #[test]
    fn it_saturates_at_max_rank() {
        new();
        assert_eq!(left([15, 15, 0, 0]), [15, 0, 0, 0]);
        assert_eq!(left([14, 14, 15, 0]), [15, 15, 0, 0]);
        for idx in 0..LINE_TABLE_SIZE {
            if let Some(result) = slide_line(idx as Line) {
                assert!(line_to_ranks(result).iter().all(|&r| r <= MAX_RANK));
            }
        }
    }

    #[test]
    fn it_slides_columns() {
        new();
        let b = col_board(1, [1, 2, 0, 0]);
        assert_eq!(col_ranks(b.shift(Move::Up), 1), [3, 0, 0, 0]);
        assert_eq!(col_ranks(b.shift(Move::Down), 1), [0, 1, 2, 0]);

        let b = col_board(3, [0, 4, 4, 7]);
        assert_eq!(col_ranks(b.shift(Move::Up), 3), [4, 4, 7, 0]);
        assert_eq!(col_ranks(b.shift(Move::Down), 3), [0, 0, 5, 7]);
    }

    #[test]
    fn merges_adjacent_threes_to_the_left() {
        new();
        let b = row_board(2, [3, 3, 0, 0]);
        let (next, changed) = b.execute(Move::Left);
        assert_eq!(next, row_board(2, [4, 0, 0, 0]));
        assert_eq!(changed.count(), 1);
        assert_eq!(changed.mask(), 0b0100);
        assert_eq!(changed.lines().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn illegal_move_leaves_board_untouched() {
        new();
        let b = row_board(0, [3, 4, 5, 6]);
        let (next, changed) = b.execute(Move::Left);
        assert!(changed.is_empty());
        assert_eq!(next, b);
        // column moves only have a single tile per column here, pinned to row 0
        let (next, changed) = b.execute(Move::Up);
        assert!(changed.is_empty());
        assert_eq!(next, b);
        let (_, changed) = b.execute(Move::Down);
        assert_eq!(changed.count(), 4);
        assert_eq!(changed.mask(), 0b1111);
    }

    #[test]
    fn moves_on_full_board() {
        new();
        let b = Board::from_ranks([
            1, 2, 3, 3, //
            3, 4, 5, 6, //
            0, 2, 2, 1, //
            6, 5, 4, 3,
        ]);
        let (next, changed) = b.execute(Move::Left);
        assert_eq!(
            next,
            Board::from_ranks([
                3, 3, 3, 0, //
                3, 4, 5, 6, //
                2, 2, 1, 0, //
                6, 5, 4, 3,
            ])
        );
        assert_eq!(changed.count(), 2);
        assert_eq!(changed.mask(), 0b0101);
    }

    #[test]
    fn changed_lines_leave_trailing_cell_empty() {
        new();
        let mut rng = StdRng::seed_from_u64(0x9E37_79B9);
        for _ in 0..2000 {
            // keep ranks small so boards have merges and gaps
            let board = Board::from_raw(rng.gen::<u64>() & 0x7777_7777_7777_7777);
            for dir in Move::ALL {
                let (next, changed) = board.execute(dir);
                if changed.is_empty() {
                    assert_eq!(next, board);
                    continue;
                }
                assert_eq!(changed.count(), changed.mask().count_ones());
                for line in changed.lines() {
                    let trailing = match dir {
                        Move::Up => next.rank_at(3, line),
                        Move::Down => next.rank_at(0, line),
                        Move::Left => next.rank_at(line, 3),
                        Move::Right => next.rank_at(line, 0),
                    };
                    assert_eq!(trailing, 0, "{dir:?} on {board:?}");
                    assert_ne!(next.insert_tile(dir, line, 1), next);
                }
            }
        }
    }

    #[test]
    fn inserts_into_vacated_cells() {
        let b = Board::EMPTY;
        assert_eq!(b.insert_tile(Move::Up, 2, 1).rank_at(3, 2), 1);
        assert_eq!(b.insert_tile(Move::Down, 1, 2).rank_at(0, 1), 2);
        assert_eq!(b.insert_tile(Move::Left, 3, 3).rank_at(3, 3), 3);
        assert_eq!(b.insert_tile(Move::Right, 0, 4).rank_at(0, 0), 4);
        assert_eq!(insert_tile_index(4, b, 0, 1), Board::INVALID);
        assert_eq!(insert_tile_index(2, b, 4, 1), Board::INVALID);
        assert_eq!(insert_tile_index(2, b, 3, 1).rank_at(3, 3), 1);
    }

    #[test]
    fn column_packing_round_trips() {
        for row in 0..=u16::MAX {
            let sparse = unpack_col(row);
            assert_eq!(sparse & !COL_MASK, 0);
            assert_eq!(pack_col(sparse), row);
            assert_eq!(unpack_col(pack_col(sparse)), sparse);
            assert_eq!(reverse_row(reverse_row(row)), row);
        }
        assert_eq!(reverse_row(0x4321), 0x1234);
    }

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let b = Board::from_raw(0xfedc_ba98_7654_3210);
        let t = b.transpose();
        for row in 0..4 {
            for col in 0..4 {
                assert_eq!(t.rank_at(col, row), b.rank_at(row, col));
            }
            assert_eq!(t.row(row), b.col(row));
        }
        assert_eq!(t.transpose(), b);
    }

    #[test]
    fn it_scores_boards() {
        new();
        let mut cells = [0u8; 16];
        cells[6] = 5;
        assert_eq!(Board::from_ranks(cells).score(), 27.0);
        assert_eq!(row_board(3, [1, 2, 3, 4]).score(), 12.0);
        assert_eq!(Board::EMPTY.score(), 0.0);
    }

    #[test]
    fn it_counts_cells() {
        let b = Board::from_ranks([1, 2, 3, 3, 5, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(b.count_empty(), 10);
        assert_eq!(b.count_distinct_high_tiles(), 3);
        assert_eq!(b.max_rank(), 7);
        assert_eq!(Board::EMPTY.count_empty(), 16);
        assert_eq!(Board::EMPTY.max_rank(), 0);
    }

    #[test]
    fn it_detects_game_over() {
        new();
        let stuck = Board::from_ranks([
            3, 4, 3, 4, //
            4, 3, 4, 3, //
            3, 4, 3, 4, //
            4, 3, 4, 3,
        ]);
        assert!(stuck.is_game_over());
        assert!(Board::EMPTY.is_game_over());
        assert!(!row_board(0, [1, 2, 0, 0]).is_game_over());
    }

    #[test]
    fn rejects_bad_direction_indices() {
        new();
        let b = row_board(0, [1, 2, 0, 0]);
        assert_eq!(execute_move_index(7, b), (Board::INVALID, Changed::NONE));
        assert_eq!(execute_move_index(2, b), b.execute(Move::Left));
        assert_eq!(Move::try_from(4), Err(EngineError::InvalidDirection(4)));
        assert_eq!(Move::try_from(3), Ok(Move::Right));
    }

    #[test]
    fn standalone_tables_match_shared() {
        let own = Tables::build();
        let b = Board::from_raw(0x1203_0456_3300_2100);
        for dir in Move::ALL {
            assert_eq!(own.execute(dir, b), b.execute(dir));
        }
        assert_eq!(own.line_delta(Move::Left, 0x0021), 0x0021 ^ 0x0003);
    }

    #[test]
    fn it_formats_tile_values() {
        assert_eq!(tile_value(0), 0);
        assert_eq!(tile_value(2), 2);
        assert_eq!(tile_value(3), 3);
        assert_eq!(tile_value(5), 12);
        assert_eq!(tile_value(15), 12288);
    }
}
