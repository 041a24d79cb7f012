//! Harvard designation to international designator conversion.
//!
//! GCAT identifies pre-1963 objects by Harvard designation: launch year, a
//! Greek-letter word giving the launch's order within the year, and a piece
//! number (`1957 ALP 2`). CelesTrak uses the international designator for
//! every object (`1957-001B`). Before the catalogs can be joined every ID is
//! brought into the international form.
//!
//! Conversion is best effort. An ID that cannot be parsed is returned as-is
//! and simply fails to join with the other sources.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProcessingError, Result};
use crate::table::{Cell, Table};

static CANONICAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{3}[A-Z]+$").expect("Invalid regex: canonical ID"));

/// The 24 Greek-letter abbreviations in launch order.
pub const GREEK_LETTERS: [&str; 24] = [
    "ALP", "BET", "GAM", "DEL", "EPS", "ZET", "ETA", "THE", "IOT", "KAP", "LAM", "MU", "NU", "XI",
    "OMI", "PI", "RHO", "SIG", "TAU", "UPS", "PHI", "CHI", "PSI", "OME",
];

/// Piece letters: the Latin alphabet without I and O.
pub const PIECE_ALPHABET: &[u8; 24] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

// ============================================================================
// GREEK ORDER
// ============================================================================

/// Bidirectional mapping between Greek-order words and launch numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct GreekOrder {
    names: Vec<String>,
    numbers: HashMap<String, u32>,
}

impl GreekOrder {
    /// Build an order from names listed for launch numbers `1..=n`.
    pub fn new(names: Vec<String>) -> Result<Self> {
        let mut numbers = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ProcessingError::InvalidConfig(format!(
                    "Greek order entry {} is empty",
                    idx + 1
                )));
            }
            if numbers.insert(name.clone(), idx as u32 + 1).is_some() {
                return Err(ProcessingError::InvalidConfig(format!(
                    "Greek order entry '{name}' appears twice"
                )));
            }
        }
        Ok(Self { names, numbers })
    }

    /// The 72-entry order: 24 letters, then the same prefixed by `A ` and
    /// by `B ` for the 25th to 72nd launches of a year.
    pub fn standard() -> Self {
        let names: Vec<String> = ["", "A ", "B "]
            .iter()
            .flat_map(|prefix| GREEK_LETTERS.iter().map(move |letter| format!("{prefix}{letter}")))
            .collect();
        let numbers = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx as u32 + 1))
            .collect();
        Self { names, numbers }
    }

    pub fn number(&self, name: &str) -> Option<u32> {
        self.numbers.get(name).copied()
    }

    pub fn name(&self, number: u32) -> Option<&str> {
        let idx = usize::try_from(number).ok()?.checked_sub(1)?;
        self.names.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for GreekOrder {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<String>> for GreekOrder {
    type Error = ProcessingError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<GreekOrder> for Vec<String> {
    fn from(order: GreekOrder) -> Self {
        order.names
    }
}

// ============================================================================
// PIECE LETTERS
// ============================================================================

/// Encode a piece number in bijective base 24 over [`PIECE_ALPHABET`].
///
/// `1 → A`, `24 → Z`, `25 → AA`. Zero has no encoding.
pub fn piece_letters(piece: u32) -> Option<String> {
    if piece == 0 {
        return None;
    }
    let mut n = piece;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(PIECE_ALPHABET[(n % 24) as usize]);
        n /= 24;
    }
    letters.reverse();
    String::from_utf8(letters).ok()
}

/// Decode piece letters back into a piece number.
pub fn piece_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.bytes().try_fold(0u32, |acc, byte| {
        let digit = PIECE_ALPHABET.iter().position(|b| *b == byte)? as u32 + 1;
        acc.checked_mul(24)?.checked_add(digit)
    })
}

// ============================================================================
// CONVERTER
// ============================================================================

/// A Harvard designation split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HarvardParts<'a> {
    year: &'a str,
    word: String,
    piece: u32,
}

fn split_harvard(id: &str) -> Option<HarvardParts<'_>> {
    let parts: Vec<&str> = id.split_whitespace().collect();
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let (year, word, piece) = match parts.as_slice() {
        [year, word] => (*year, word.to_string(), 1),
        [year, word, last] if is_digits(last) => (*year, word.to_string(), last.parse().ok()?),
        [year, prefix, word] => (*year, format!("{prefix} {word}"), 1),
        [year, prefix, word, last] if is_digits(last) => {
            (*year, format!("{prefix} {word}"), last.parse().ok()?)
        }
        _ => return None,
    };

    if year.len() != 4 || !is_digits(year) {
        return None;
    }
    Some(HarvardParts { year, word, piece })
}

/// Normalizes object IDs to the international designator form.
#[derive(Debug, Clone, Default)]
pub struct DesignationConverter {
    order: GreekOrder,
}

impl DesignationConverter {
    pub fn new(order: GreekOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &GreekOrder {
        &self.order
    }

    /// Whether `id` is already in `YYYY-NNNL…` form.
    pub fn is_canonical(id: &str) -> bool {
        CANONICAL_ID.is_match(id)
    }

    /// Convert a Harvard designation, `None` if it cannot be parsed.
    ///
    /// Canonical IDs are returned unchanged.
    pub fn try_convert(&self, id: &str) -> Option<String> {
        if Self::is_canonical(id) {
            return Some(id.to_string());
        }
        let parts = split_harvard(id)?;
        let launch = self.order.number(&parts.word)?;
        let letters = piece_letters(parts.piece)?;
        Some(format!("{}-{:03}{}", parts.year, launch, letters))
    }

    /// Convert an ID, falling back to the input when it cannot be parsed.
    pub fn convert(&self, id: &str) -> String {
        self.try_convert(id).unwrap_or_else(|| id.to_string())
    }

    /// Convert every text ID of `column` in place, returning how many changed.
    pub fn convert_column(&self, table: &mut Table, column: &str) -> Result<usize> {
        let label = table.label().to_string();
        let cells = &mut table
            .column_mut(column)
            .ok_or_else(|| ProcessingError::missing_column(&label, column))?
            .cells;

        let mut changed = 0;
        let mut unparsed = 0;
        for cell in cells.iter_mut() {
            let Cell::Text(id) = cell else { continue };
            match self.try_convert(id) {
                Some(converted) if converted != *id => {
                    *id = converted;
                    changed += 1;
                }
                Some(_) => {}
                None => unparsed += 1,
            }
        }
        debug!(
            "Converted {} designations in '{}.{}' ({} left unparsed)",
            changed, label, column, unparsed
        );
        Ok(changed)
    }
}
