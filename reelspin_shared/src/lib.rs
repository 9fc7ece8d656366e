use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One settled round, as front-ends store and export it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoundLogEntry {
    pub round: u64,
    pub ts: DateTime<Utc>,
    pub bet: u64,
    pub win: u64,
    pub balance: u64,
    pub reels: Vec<Vec<u8>>, // rows x reels, symbol identifiers
    pub winning_lines: Vec<usize>,
}

impl RoundLogEntry {
    pub fn reels_json(&self) -> LogResult<String> {
        Ok(serde_json::to_string(&self.reels)?)
    }

    /// Flat record for CSV export.
    pub fn csv_record(&self) -> LogResult<Vec<String>> {
        Ok(vec![
            self.round.to_string(),
            self.ts.to_rfc3339(),
            self.bet.to_string(),
            self.win.to_string(),
            self.balance.to_string(),
            self.reels_json()?,
            serde_json::to_string(&self.winning_lines)?,
        ])
    }

    pub const CSV_HEADER: [&'static str; 7] = [
        "round",
        "ts",
        "bet",
        "win",
        "balance",
        "reels_json",
        "winning_lines",
    ];
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub rounds: u64,
    pub total_bet: u64,
    pub total_win: u64,
    pub winning_rounds: u64,
    pub final_balance: u64,
}

impl SessionSummary {
    pub fn record(&mut self, entry: &RoundLogEntry) {
        self.rounds += 1;
        self.total_bet += entry.bet;
        self.total_win += entry.win;
        if entry.win > 0 {
            self.winning_rounds += 1;
        }
        self.final_balance = entry.balance;
    }

    /// Share of the total bet paid back.
    pub fn return_ratio(&self) -> f64 {
        if self.total_bet == 0 {
            return 0.0;
        }
        self.total_win as f64 / self.total_bet as f64
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("could not encode log entry: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type LogResult<T> = Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(win: u64) -> RoundLogEntry {
        RoundLogEntry {
            round: 1,
            ts: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            bet: 10,
            win,
            balance: 990 + win,
            reels: vec![vec![1, 5, 7], vec![4, 4, 4], vec![3, 6, 1]],
            winning_lines: if win > 0 { vec![0] } else { vec![] },
        }
    }

    #[test]
    fn csv_record_matches_header() {
        let record = entry(100).csv_record().unwrap();
        assert_eq!(record.len(), RoundLogEntry::CSV_HEADER.len());
        assert_eq!(record[1], "2024-05-01T12:00:00+00:00");
        assert_eq!(record[5], "[[1,5,7],[4,4,4],[3,6,1]]");
        assert_eq!(record[6], "[0]");
    }

    #[test]
    fn summary_tracks_return_ratio() {
        let mut summary = SessionSummary::default();
        summary.record(&entry(0));
        summary.record(&entry(100));
        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.winning_rounds, 1);
        assert_eq!(summary.final_balance, 1090);
        assert!((summary.return_ratio() - 5.0).abs() < f64::EPSILON);
    }
}
