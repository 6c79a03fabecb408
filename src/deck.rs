//! The virtual tile deck.
//!
//! Threes deals its 1, 2 and 3 tiles from a deck of twelve (four of each)
//! that reshuffles once empty. [`Deck`] packs the three remaining counts into
//! the low three bytes of a `u32` and the highest rank seen on the board into
//! the top byte; the search uses the latter to decide whether bonus tiles can
//! appear.

use std::fmt;

use rand::Rng;

/// Copies of each standard tile in a fresh deck.
pub const REFILL_COUNT: u32 = 4;

const COUNTS_MASK: u32 = 0x00ff_ffff;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Deck(u32);

impl Deck {
    /// Four of each standard tile, no max rank recorded.
    pub const INITIAL: Deck = Deck(0x0004_0404);

    #[inline]
    pub fn from_raw(raw: u32) -> Self { Deck(raw) }

    #[inline]
    pub fn raw(self) -> u32 { self.0 }

    pub fn from_counts(ones: u8, twos: u8, threes: u8) -> Self {
        Deck(ones as u32 | (twos as u32) << 8 | (threes as u32) << 16)
    }

    /// Remaining copies of `tile` (1, 2 or 3). Other ranks never sit in the deck.
    #[inline]
    pub fn count(self, tile: u8) -> u32 {
        match tile {
            1..=3 => (self.0 >> (8 * (tile - 1))) & 0xff,
            _ => 0,
        }
    }

    #[inline]
    pub fn total(self) -> u32 { self.count(1) + self.count(2) + self.count(3) }

    /// The deck after dealing one `tile`. A counter already at zero, or a
    /// rank outside 1..=3, leaves the deck unchanged.
    #[inline]
    pub fn without(self, tile: u8) -> Deck {
        if self.count(tile) == 0 {
            return self;
        }
        Deck(self.0 - (1 << (8 * (tile - 1))))
    }

    /// Replace the max-rank byte, keeping the counters.
    #[inline]
    pub fn with_max_rank(self, rank: u8) -> Deck {
        Deck((self.0 & COUNTS_MASK) | (rank as u32) << 24)
    }

    #[inline]
    pub fn max_rank(self) -> u8 { (self.0 >> 24) as u8 }

    /// True once every standard tile has been dealt.
    #[inline]
    pub fn is_exhausted(self) -> bool { self.0 & COUNTS_MASK == 0 }

    /// The deck to draw from next: a fresh 4/4/4 deck (max rank kept) if this
    /// one is exhausted, otherwise unchanged.
    #[inline]
    pub fn refilled(self) -> Deck {
        if self.is_exhausted() {
            Deck::INITIAL.with_max_rank(self.max_rank())
        } else {
            self
        }
    }

    /// Deal one standard tile uniformly from the remaining cards.
    ///
    /// ```
    /// use threes_ai::deck::Deck;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(3);
    /// let (tile, rest) = Deck::INITIAL.draw(&mut rng);
    /// assert!((1..=3).contains(&tile));
    /// assert_eq!(rest.total(), 11);
    /// ```
    pub fn draw<R: Rng + ?Sized>(self, rng: &mut R) -> (u8, Deck) {
        let deck = self.refilled();
        let (ones, twos) = (deck.count(1), deck.count(2));
        let pick = rng.gen_range(0..deck.total());
        let tile = if pick < ones {
            1
        } else if pick - ones < twos {
            2
        } else {
            3
        };
        (tile, deck.without(tile))
    }
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deck")
            .field("ones", &self.count(1))
            .field("twos", &self.count(2))
            .field("threes", &self.count(3))
            .field("max_rank", &self.max_rank())
            .finish()
    }
}
