//! Player boards.
//!
//! A board holds five distinct numbers per column. It is generated once when
//! a player is first registered and never regenerated.

use std::collections::BTreeMap;

use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::combo::{Column, Combo};

/// Numbers per column on a board.
pub const BOARD_SIZE: usize = 5;

/// Column letter to the five numbers in that column, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    columns: BTreeMap<Column, [u8; BOARD_SIZE]>,
}

impl Board {
    /// Generate a fresh board.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let columns = Column::ALL
            .iter()
            .map(|column| {
                let mut picked = [0u8; BOARD_SIZE];
                // Sampling without replacement keeps the column pairwise distinct.
                let sample = column.numbers().choose_multiple(rng, BOARD_SIZE);
                for (slot, number) in picked.iter_mut().zip(sample) {
                    *slot = number;
                }
                picked.shuffle(rng);
                (*column, picked)
            })
            .collect();

        Self { columns }
    }

    /// Numbers in one column, top to bottom.
    pub fn column(&self, column: Column) -> &[u8] {
        self.columns.get(&column).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Check if the board has a cell for `combo`. The free marker is always on the board.
    pub fn contains(&self, combo: &Combo) -> bool {
        match combo {
            Combo::Free => true,
            Combo::Number { column, number } => self.column(*column).contains(number),
        }
    }

    /// Columns in card order.
    pub fn columns(&self) -> impl Iterator<Item = (Column, &[u8])> {
        self.columns.iter().map(|(c, n)| (*c, n.as_slice()))
    }
}
