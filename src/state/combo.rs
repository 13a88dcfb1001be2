//! Combo universe and draw history.
//!
//! The universe is every `column + number` pair across the five bingo
//! columns, minus the free slot. Draw history starts with the free marker
//! and only ever grows.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ComboParseError;

/// Numbers per column.
pub const COLUMN_SPAN: u8 = 15;

/// The N-column number that is replaced by the free space.
pub const FREE_SLOT_NUMBER: u8 = 38;

/// Wire label of the free marker.
pub const FREE_LABEL: &str = "FREE";

/// Bingo column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    B,
    I,
    N,
    G,
    O,
}

impl Column {
    /// All columns in card order.
    pub const ALL: [Column; 5] = [Column::B, Column::I, Column::N, Column::G, Column::O];

    /// Column letter as printed on the card.
    pub fn letter(&self) -> char {
        match self {
            Self::B => 'B',
            Self::I => 'I',
            Self::N => 'N',
            Self::G => 'G',
            Self::O => 'O',
        }
    }

    /// Parse a column letter, case-insensitive.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'B' => Some(Self::B),
            'I' => Some(Self::I),
            'N' => Some(Self::N),
            'G' => Some(Self::G),
            'O' => Some(Self::O),
            _ => None,
        }
    }

    fn index(&self) -> u8 {
        match self {
            Self::B => 0,
            Self::I => 1,
            Self::N => 2,
            Self::G => 3,
            Self::O => 4,
        }
    }

    /// Lowest number in this column (B is 1..=15, I is 16..=30, ...).
    pub fn first_number(&self) -> u8 {
        self.index() * COLUMN_SPAN + 1
    }

    /// Highest number in this column.
    pub fn last_number(&self) -> u8 {
        (self.index() + 1) * COLUMN_SPAN
    }

    /// Numbers that may be drawn or placed on a board in this column.
    pub fn numbers(&self) -> impl Iterator<Item = u8> {
        let column = *self;
        (self.first_number()..=self.last_number()).filter(move |n| column.is_drawable(*n))
    }

    /// Check if `number` belongs to this column and is not the free slot.
    pub fn is_drawable(&self, number: u8) -> bool {
        (self.first_number()..=self.last_number()).contains(&number)
            && !(*self == Self::N && number == FREE_SLOT_NUMBER)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A single drawable unit, or the always-called free marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Combo {
    Free,
    Number { column: Column, number: u8 },
}

impl Combo {
    /// Build a numbered combo, validating the column range.
    pub fn new(column: Column, number: u8) -> Result<Self, ComboParseError> {
        if !column.is_drawable(number) {
            return Err(ComboParseError::OutOfRange {
                column: column.letter(),
                number,
            });
        }
        Ok(Self::Number { column, number })
    }

    /// Check if this is the free marker.
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "{}", FREE_LABEL),
            Self::Number { column, number } => write!(f, "{}{}", column, number),
        }
    }
}

impl FromStr for Combo {
    type Err = ComboParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(FREE_LABEL) {
            return Ok(Self::Free);
        }

        let mut chars = s.chars();
        let letter = chars.next().ok_or(ComboParseError::Empty)?;
        let column = Column::from_letter(letter).ok_or(ComboParseError::UnknownColumn(letter))?;
        let digits = chars.as_str();
        let number: u8 = digits
            .parse()
            .map_err(|_| ComboParseError::InvalidNumber(digits.to_string()))?;

        Self::new(column, number)
    }
}

impl From<Combo> for String {
    fn from(combo: Combo) -> Self {
        combo.to_string()
    }
}

impl TryFrom<String> for Combo {
    type Error = ComboParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Result of a draw request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn(Combo),
    /// Every combo has been called; nothing changed.
    Exhausted,
}

/// Catch-up view of the draw history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub called_combos: Vec<Combo>,
    pub current_combo: Combo,
}

/// The combo universe plus the ordered record of what has been drawn.
#[derive(Debug, Clone)]
pub struct ComboPool {
    universe: Vec<Combo>,
    drawn: Vec<Combo>,
    drawn_index: HashSet<Combo>,
}

impl Default for ComboPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ComboPool {
    /// Create a pool with a populated universe and only the free marker drawn.
    pub fn new() -> Self {
        let mut pool = Self {
            universe: Vec::new(),
            drawn: vec![Combo::Free],
            drawn_index: HashSet::from([Combo::Free]),
        };
        pool.initialize();
        pool
    }

    /// Populate the universe from the column ranges. Calling it again
    /// rebuilds the same universe and leaves draw history alone.
    pub fn initialize(&mut self) {
        self.universe = Column::ALL
            .iter()
            .flat_map(|column| {
                let column = *column;
                column
                    .numbers()
                    .map(move |number| Combo::Number { column, number })
            })
            .collect();
    }

    /// Draw one not-yet-called combo uniformly at random.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> DrawOutcome {
        let available: Vec<Combo> = self
            .universe
            .iter()
            .filter(|c| !self.drawn_index.contains(*c))
            .copied()
            .collect();

        match available.choose(rng) {
            Some(&combo) => {
                self.drawn.push(combo);
                self.drawn_index.insert(combo);
                DrawOutcome::Drawn(combo)
            }
            None => DrawOutcome::Exhausted,
        }
    }

    /// Full draw history plus the current combo, for late joiners.
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            called_combos: self.drawn.clone(),
            current_combo: self.current(),
        }
    }

    /// Most recent draw, or the free marker before the first draw.
    pub fn current(&self) -> Combo {
        self.drawn.last().copied().unwrap_or(Combo::Free)
    }

    /// Draw history, free marker first.
    pub fn drawn(&self) -> &[Combo] {
        &self.drawn
    }

    /// Every drawable combo.
    pub fn universe(&self) -> &[Combo] {
        &self.universe
    }

    /// Check if a combo has been called.
    pub fn is_drawn(&self, combo: &Combo) -> bool {
        self.drawn_index.contains(combo)
    }

    /// Count of combos still available.
    pub fn remaining(&self) -> usize {
        self.universe
            .iter()
            .filter(|c| !self.drawn_index.contains(*c))
            .count()
    }

    /// Check if nothing is left to draw.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_column_ranges() {
        assert_eq!((Column::B.first_number(), Column::B.last_number()), (1, 15));
        assert_eq!((Column::N.first_number(), Column::N.last_number()), (31, 45));
        assert_eq!((Column::O.first_number(), Column::O.last_number()), (61, 75));
        assert_eq!(Column::N.numbers().count(), 14);
        assert_eq!(Column::G.numbers().count(), 15);
    }

    #[test]
    fn test_combo_parse_display() {
        assert_eq!("B12".parse::<Combo>().unwrap().to_string(), "B12");
        assert_eq!("o75".parse::<Combo>().unwrap().to_string(), "O75");
        assert_eq!("free".parse::<Combo>().unwrap(), Combo::Free);

        assert_eq!("".parse::<Combo>(), Err(ComboParseError::Empty));
        assert_eq!("X1".parse::<Combo>(), Err(ComboParseError::UnknownColumn('X')));
        assert!(matches!("Bxx".parse::<Combo>(), Err(ComboParseError::InvalidNumber(_))));
        assert_eq!(
            "B16".parse::<Combo>(),
            Err(ComboParseError::OutOfRange { column: 'B', number: 16 })
        );
        assert_eq!(
            "N38".parse::<Combo>(),
            Err(ComboParseError::OutOfRange { column: 'N', number: 38 })
        );
    }

    #[test]
    fn test_combo_json() {
        let combo = Combo::new(Column::G, 50).unwrap();
        assert_eq!(serde_json::to_value(combo).unwrap(), serde_json::json!("G50"));
        assert_eq!(serde_json::to_value(Combo::Free).unwrap(), serde_json::json!("FREE"));

        let parsed: Combo = serde_json::from_value(serde_json::json!("I20")).unwrap();
        assert_eq!(parsed, Combo::new(Column::I, 20).unwrap());
        assert!(serde_json::from_value::<Combo>(serde_json::json!("I2")).is_err());
    }

    #[test]
    fn test_new_pool() {
        let pool = ComboPool::new();
        assert_eq!(pool.universe().len(), 74);
        assert_eq!(pool.drawn(), &[Combo::Free]);
        assert_eq!(pool.current(), Combo::Free);
        assert!(!pool.universe().contains(&Combo::Free));
        assert_eq!(pool.remaining(), 74);
    }

    #[test]
    fn test_initialize_idempotent() {
        let mut pool = ComboPool::new();
        let mut rng = StdRng::seed_from_u64(1);
        pool.draw(&mut rng);
        pool.initialize();
        assert_eq!(pool.universe().len(), 74);
        assert_eq!(pool.drawn().len(), 2);
    }

    #[test]
    fn test_draw_until_exhausted() {
        let mut pool = ComboPool::new();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..74 {
            assert!(matches!(pool.draw(&mut rng), DrawOutcome::Drawn(_)));
        }

        assert_eq!(pool.drawn().len(), 75);
        assert_eq!(pool.drawn()[0], Combo::Free);
        let unique: HashSet<Combo> = pool.drawn().iter().copied().collect();
        assert_eq!(unique.len(), 75);
        assert!(pool.universe().iter().all(|c| pool.is_drawn(c)));
        assert!(pool.is_exhausted());

        let before = pool.drawn().to_vec();
        assert_eq!(pool.draw(&mut rng), DrawOutcome::Exhausted);
        assert_eq!(pool.drawn(), before.as_slice());
    }

    #[test]
    fn test_snapshot() {
        let mut pool = ComboPool::new();
        let mut rng = StdRng::seed_from_u64(3);

        let DrawOutcome::Drawn(combo) = pool.draw(&mut rng) else {
            panic!("expected a draw");
        };

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.called_combos, vec![Combo::Free, combo]);
        assert_eq!(snapshot.current_combo, combo);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["currentCombo"], serde_json::json!(combo.to_string()));
        assert_eq!(json["calledCombos"][0], serde_json::json!("FREE"));
    }
}
