//! # Denomination Counter
//!
//! Physical cash counted note by note.
//!
//! The same count type is used for cash received from the customer and for
//! change handed back, so the drawer reconciles to the note.
//!
//! ```rust
//! use exchange_core::denomination::{Denomination, DenominationCount};
//!
//! let received = DenominationCount::new()
//!     .with_count(Denomination::Thousand, 1)
//!     .with_count(Denomination::FiveHundred, 1)
//!     .with_count(Denomination::Hundred, 2);
//!
//! assert_eq!(received.total().major(), 1700);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Denomination
// =============================================================================

/// A fixed note or coin face value, in major units.
///
/// Serialized as its face value (`1000`, `500`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Denomination {
    Thousand,
    FiveHundred,
    TwoHundred,
    Hundred,
    Fifty,
    Twenty,
    Ten,
    Five,
    Two,
    One,
}

impl Denomination {
    /// Every denomination, largest first.
    pub const ALL: [Denomination; 10] = [
        Denomination::Thousand,
        Denomination::FiveHundred,
        Denomination::TwoHundred,
        Denomination::Hundred,
        Denomination::Fifty,
        Denomination::Twenty,
        Denomination::Ten,
        Denomination::Five,
        Denomination::Two,
        Denomination::One,
    ];

    /// Face value in major units.
    pub const fn face_value(&self) -> u32 {
        match self {
            Denomination::Thousand => 1000,
            Denomination::FiveHundred => 500,
            Denomination::TwoHundred => 200,
            Denomination::Hundred => 100,
            Denomination::Fifty => 50,
            Denomination::Twenty => 20,
            Denomination::Ten => 10,
            Denomination::Five => 5,
            Denomination::Two => 2,
            Denomination::One => 1,
        }
    }

    /// Face value as Money.
    #[inline]
    pub const fn value(&self) -> Money {
        Money::from_major(self.face_value() as i64)
    }
}

impl TryFrom<u32> for Denomination {
    type Error = ValidationError;

    fn try_from(face: u32) -> Result<Self, Self::Error> {
        Denomination::ALL
            .into_iter()
            .find(|d| d.face_value() == face)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: format!("denomination {}", face),
                min: 1,
                max: 1000,
            })
    }
}

impl From<Denomination> for u32 {
    fn from(d: Denomination) -> Self {
        d.face_value()
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.face_value())
    }
}

// =============================================================================
// Denomination Count
// =============================================================================

/// Count of notes per denomination. Zero counts are never stored.
///
/// An immutable value: every change returns a new count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DenominationCount {
    #[ts(type = "Record<number, number>")]
    notes: BTreeMap<Denomination, u32>,
}

impl DenominationCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a count from `(face value, count)` pairs. Repeated faces add up.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        pairs.into_iter().try_fold(Self::new(), |acc, (face, count)| {
            Ok(acc.with_added(Denomination::try_from(face)?, count))
        })
    }

    /// Returns a copy with the count for `denomination` replaced.
    #[must_use]
    pub fn with_count(&self, denomination: Denomination, count: u32) -> Self {
        let mut notes = self.notes.clone();
        if count == 0 {
            notes.remove(&denomination);
        } else {
            notes.insert(denomination, count);
        }
        DenominationCount { notes }
    }

    /// Returns a copy with `count` more notes of `denomination`.
    #[must_use]
    pub fn with_added(&self, denomination: Denomination, count: u32) -> Self {
        let current = self.count(denomination);
        self.with_count(denomination, current.saturating_add(count))
    }

    pub fn count(&self, denomination: Denomination) -> u32 {
        self.notes.get(&denomination).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Σ face value × count.
    pub fn total(&self) -> Money {
        self.notes
            .iter()
            .map(|(d, count)| d.value().multiply_quantity(*count as i64))
            .sum()
    }

    /// Non-zero entries, largest denomination first.
    pub fn iter(&self) -> impl Iterator<Item = (Denomination, u32)> + '_ {
        self.notes.iter().map(|(d, c)| (*d, *c))
    }

    /// Suggests notes for `amount`, largest first.
    ///
    /// Returns the suggestion and the part of `amount` no note can cover
    /// (the minor-unit remainder). Negative amounts yield an empty suggestion.
    pub fn suggest(amount: Money) -> (Self, Money) {
        let mut remaining = amount.floor_zero();
        let mut count = Self::new();
        for d in Denomination::ALL {
            let notes = remaining.minor() / d.value().minor();
            if notes > 0 {
                count = count.with_count(d, notes as u32);
                remaining -= d.value().multiply_quantity(notes);
            }
        }
        (count, remaining)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
