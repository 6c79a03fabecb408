use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::engine::{self as GameEngine, Board};

const LINE_TABLE_SIZE: usize = 0x1_0000;

/// Weights for the per-line heuristic.
///
/// Emptiness and merge opportunities add to a line's value; the sum of rank
/// powers and any break in monotonic ordering subtract from it.
/// `lost_penalty` is a flat per-line offset that lifts most live boards above
/// the 0 assigned to lost ones; lines of very high ranks still go negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    pub lost_penalty: f64,
    pub monotonicity_power: f64,
    pub monotonicity_weight: f64,
    pub sum_power: f64,
    pub sum_weight: f64,
    pub merges_weight: f64,
    pub empty_weight: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            lost_penalty: 200_000.0,
            monotonicity_power: 4.0,
            monotonicity_weight: 47.0,
            sum_power: 3.5,
            sum_weight: 11.0,
            merges_weight: 700.0,
            empty_weight: 270.0,
        }
    }
}

impl HeuristicWeights {
    /// Build from a tuning vector
    /// `[monotonicity_power, monotonicity_weight, sum_power, sum_weight, merges_weight, empty_weight]`.
    /// `lost_penalty` keeps its default.
    pub fn from_vector(v: &[f64]) -> Result<Self, ConfigError> {
        let &[monotonicity_power, monotonicity_weight, sum_power, sum_weight, merges_weight, empty_weight] = v else {
            return Err(ConfigError::WeightCount(v.len()));
        };
        Ok(Self {
            monotonicity_power,
            monotonicity_weight,
            sum_power,
            sum_weight,
            merges_weight,
            empty_weight,
            ..Self::default()
        })
    }

    pub fn to_vector(&self) -> [f64; 6] {
        [
            self.monotonicity_power,
            self.monotonicity_weight,
            self.sum_power,
            self.sum_weight,
            self.merges_weight,
            self.empty_weight,
        ]
    }
}

/// Precomputed heuristic value of every 16-bit line for one set of weights.
pub struct Heuristic {
    table: Box<[f64]>,
}

impl Heuristic {
    pub fn new(weights: &HeuristicWeights) -> Self {
        let mut table = vec![0.0f64; LINE_TABLE_SIZE];
        for (line, slot) in table.iter_mut().enumerate() {
            *slot = calc_heuristic_score(line as u16, weights);
        }
        Self { table: table.into_boxed_slice() }
    }

    #[inline]
    pub fn line_score(&self, line: u16) -> f64 {
        unsafe { *self.table.get_unchecked(line as usize) }
    }

    /// Rows and columns both contribute, so the board is scored alongside
    /// its transpose.
    #[inline]
    pub fn score(&self, board: Board) -> f64 {
        let raw = board.raw();
        let transposed = GameEngine::transpose(raw);
        (0..4).fold(0.0, |score, idx| {
            score
                + self.line_score(GameEngine::extract_row(raw, idx))
                + self.line_score(GameEngine::extract_row(transposed, idx))
        })
    }
}

impl Default for Heuristic {
    fn default() -> Self { Self::new(&HeuristicWeights::default()) }
}

// Credit to Nneonneo for heuristic structure
fn calc_heuristic_score(line: u16, w: &HeuristicWeights) -> f64 {
    let ranks = [
        (line & 0xf) as u8,
        ((line >> 4) & 0xf) as u8,
        ((line >> 8) & 0xf) as u8,
        ((line >> 12) & 0xf) as u8,
    ];
    w.lost_penalty + w.empty_weight * calc_empty(&ranks) + w.merges_weight * calc_merges(&ranks)
        - w.monotonicity_weight * calc_monotonicity(&ranks, w.monotonicity_power)
        - w.sum_weight * calc_sum(&ranks, w.sum_power)
}

fn calc_sum(line: &[u8; 4], power: f64) -> f64 {
    line.iter().fold(0., |acc, &rank| acc + (rank as f64).powf(power))
}

fn calc_empty(line: &[u8; 4]) -> f64 {
    line.iter().filter(|&&rank| rank == 0).count() as f64
}

/// Runs of equal ranks score `1 + extra` each; empty cells are skipped, so
/// `3 0 3` still counts as a run.
fn calc_merges(line: &[u8; 4]) -> f64 {
    let mut prev = 0;
    let mut counter = 0.;
    let mut merges = 0.;
    for &rank in line.iter().filter(|&&rank| rank != 0) {
        if prev == rank {
            counter += 1.;
        } else if counter > 0. {
            merges += 1. + counter;
            counter = 0.;
        }
        prev = rank;
    }
    if counter > 0. {
        merges += 1. + counter;
    }
    merges
}

fn calc_monotonicity(line: &[u8; 4], power: f64) -> f64 {
    let mut monotonicity_left = 0.;
    let mut monotonicity_right = 0.;
    for i in 1..4 {
        let tile1 = line[i - 1] as f64;
        let tile2 = line[i] as f64;
        if tile1 > tile2 {
            monotonicity_left += tile1.powf(power) - tile2.powf(power);
        } else {
            monotonicity_right += tile2.powf(power) - tile1.powf(power);
        }
    }
    monotonicity_left.min(monotonicity_right)
}
