use serde::{Deserialize, Serialize};

/// Symbol identifier in `[0, K)` where `K` is the alphabet size.
pub type SymbolId = u8;

/// Identifier reserved for "no symbol". It never completes a payline.
pub const BLANK: SymbolId = 0;

/// Visible rows per reel: top, middle, bottom.
pub const ROWS: usize = 3;

/// The three visible identifiers of one reel, top to bottom.
pub type Column = [SymbolId; ROWS];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Row {
    Top,
    Middle,
    Bottom,
}

impl Row {
    pub const ALL: [Row; ROWS] = [Row::Top, Row::Middle, Row::Bottom];

    pub fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(Row::Top),
            1 => Some(Row::Middle),
            2 => Some(Row::Bottom),
            _ => None,
        }
    }

    pub fn to_index(self) -> usize {
        match self {
            Row::Top => 0,
            Row::Middle => 1,
            Row::Bottom => 2,
        }
    }
}

/// Final symbols of a round, one column per reel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    columns: Vec<Column>,
}

impl Grid {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn reels(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, reel: usize, row: usize) -> Option<SymbolId> {
        self.columns.get(reel).and_then(|c| c.get(row)).copied()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Row-major copy (rows x reels), the layout front-ends print.
    pub fn rows(&self) -> Vec<Vec<SymbolId>> {
        (0..ROWS)
            .map(|r| self.columns.iter().map(|c| c[r]).collect())
            .collect()
    }
}

impl From<Vec<Column>> for Grid {
    fn from(columns: Vec<Column>) -> Self {
        Self::new(columns)
    }
}
