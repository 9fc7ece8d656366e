use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::symbols::{Grid, Row, SymbolId, BLANK};

/// Three `(reel, row)` positions that pay when they all show the same symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Payline(pub [(usize, Row); 3]);

impl Payline {
    pub const MIDDLE: Payline = Payline([(0, Row::Middle), (1, Row::Middle), (2, Row::Middle)]);
    pub const TOP: Payline = Payline([(0, Row::Top), (1, Row::Top), (2, Row::Top)]);
    pub const BOTTOM: Payline = Payline([(0, Row::Bottom), (1, Row::Bottom), (2, Row::Bottom)]);
    pub const DIAGONAL_DOWN: Payline = Payline([(0, Row::Top), (1, Row::Middle), (2, Row::Bottom)]);
    pub const DIAGONAL_UP: Payline = Payline([(0, Row::Bottom), (1, Row::Middle), (2, Row::Top)]);

    fn symbols(&self, grid: &Grid) -> Option<[SymbolId; 3]> {
        let mut out = [BLANK; 3];
        for (slot, (reel, row)) in out.iter_mut().zip(self.0) {
            *slot = grid.get(reel, row.to_index())?;
        }
        Some(out)
    }
}

/// Middle row, top row, bottom row, then both diagonals.
pub fn default_paylines() -> Vec<Payline> {
    vec![
        Payline::MIDDLE,
        Payline::TOP,
        Payline::BOTTOM,
        Payline::DIAGONAL_DOWN,
        Payline::DIAGONAL_UP,
    ]
}

/// Multiplier per symbol identifier. Entry 0 belongs to the blank symbol and
/// is never consulted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutTable(pub Vec<u64>);

impl PayoutTable {
    pub fn classic() -> Self {
        Self(vec![0, 2, 3, 5, 10, 20, 50, 100, 200])
    }

    pub fn multiplier(&self, symbol: SymbolId) -> u64 {
        if symbol == BLANK {
            return 0;
        }
        self.0.get(symbol as usize).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineWin {
    /// Index into the payline list.
    pub line: usize,
    pub symbol: SymbolId,
    pub amount: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub line_wins: Vec<LineWin>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct PaylineEvaluator {
    paylines: Vec<Payline>,
    payouts: PayoutTable,
}

impl PaylineEvaluator {
    pub fn new(
        paylines: Vec<Payline>,
        payouts: PayoutTable,
        symbol_count: u8,
        reel_count: usize,
    ) -> Result<Self, ConfigError> {
        if symbol_count == 0 {
            return Err(ConfigError::EmptyAlphabet);
        }
        if paylines.is_empty() {
            return Err(ConfigError::NoPaylines);
        }
        for (line, payline) in paylines.iter().enumerate() {
            if let Some(&(reel, _)) = payline.0.iter().find(|(reel, _)| *reel >= reel_count) {
                return Err(ConfigError::PaylineOutOfBounds {
                    line,
                    reel,
                    reels: reel_count,
                });
            }
        }
        if payouts.0.len() != symbol_count as usize {
            return Err(ConfigError::PayoutTable {
                expected: symbol_count as usize,
                found: payouts.0.len(),
            });
        }
        Ok(Self { paylines, payouts })
    }

    /// Five classic lines over three reels, multipliers `[0, 2, 3, 5, 10, 20, 50, 100, 200]`.
    pub fn classic() -> Self {
        Self {
            paylines: default_paylines(),
            payouts: PayoutTable::classic(),
        }
    }

    pub fn paylines(&self) -> &[Payline] {
        &self.paylines
    }

    pub fn payouts(&self) -> &PayoutTable {
        &self.payouts
    }

    /// Every payline is checked independently; wins add up.
    pub fn evaluate(&self, grid: &Grid, bet: u64) -> Evaluation {
        let mut eval = Evaluation::default();
        for (line, payline) in self.paylines.iter().enumerate() {
            let Some([a, b, c]) = payline.symbols(grid) else {
                continue;
            };
            if a == BLANK || a != b || b != c {
                continue;
            }
            let amount = bet.saturating_mul(self.payouts.multiplier(a));
            eval.total = eval.total.saturating_add(amount);
            eval.line_wins.push(LineWin {
                line,
                symbol: a,
                amount,
            });
        }
        eval
    }

    pub fn score(&self, grid: &Grid, bet: u64) -> u64 {
        self.evaluate(grid, bet).total
    }
}
