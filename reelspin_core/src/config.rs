//! Static configuration, loaded once before the first round.

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paytable::{default_paylines, Payline, PaylineEvaluator, PayoutTable};

/// Reel timing. Distances are in display units, durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinTiming {
    /// Distance between two resting slots (H).
    pub slot_spacing: f64,
    /// Distance every slot moves per tick.
    pub slide_distance: f64,
    /// Closed range the per-session tick target is drawn from.
    pub min_ticks: u32,
    pub max_ticks: u32,
    /// Inter-tick delay at the start of a session.
    pub base_tick_delay_ms: f64,
    /// Floor for the inter-tick delay near the end of a session.
    pub min_tick_delay_ms: f64,
    pub settle_duration_ms: f64,
    pub settle_frames: u32,
    /// Start delay added per reel index.
    pub stagger_ms: f64,
}

impl Default for SpinTiming {
    fn default() -> Self {
        Self {
            slot_spacing: 150.0,
            slide_distance: 20.0,
            min_ticks: 20,
            max_ticks: 30,
            base_tick_delay_ms: 150.0,
            min_tick_delay_ms: 30.0,
            settle_duration_ms: 300.0,
            settle_frames: 10,
            stagger_ms: 200.0,
        }
    }
}

impl SpinTiming {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.slot_spacing.is_finite() && self.slot_spacing > 0.0) {
            return Err(ConfigError::SlotSpacing(self.slot_spacing));
        }
        if !(self.slide_distance > 0.0 && self.slide_distance <= self.slot_spacing) {
            return Err(ConfigError::SlideDistance(self.slide_distance));
        }
        if self.min_ticks == 0 || self.min_ticks > self.max_ticks {
            return Err(ConfigError::TickRange {
                min: self.min_ticks,
                max: self.max_ticks,
            });
        }
        for (field, value) in [
            ("base_tick_delay_ms", self.base_tick_delay_ms),
            ("min_tick_delay_ms", self.min_tick_delay_ms),
            ("settle_duration_ms", self.settle_duration_ms),
            ("stagger_ms", self.stagger_ms),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Timing { field, value });
            }
        }
        if self.settle_frames == 0 {
            return Err(ConfigError::Timing {
                field: "settle_frames",
                value: 0.0,
            });
        }
        Ok(())
    }

    pub fn tick_range(&self) -> RangeInclusive<u32> {
        self.min_ticks..=self.max_ticks
    }

    /// `max(min_delay, base_delay * (1 - progress))`; never increases with progress.
    pub fn tick_delay(&self, progress: f64) -> Duration {
        let p = progress.clamp(0.0, 1.0);
        millis(self.min_tick_delay_ms.max(self.base_tick_delay_ms * (1.0 - p)))
    }

    pub fn settle_frame_delay(&self) -> Duration {
        millis(self.settle_duration_ms / self.settle_frames as f64)
    }

    pub fn stagger(&self) -> Duration {
        millis(self.stagger_ms)
    }

    /// Scale every duration by `factor` (< 1.0 = faster, 0.0 = no waiting).
    pub fn scaled(&self, factor: f64) -> Self {
        let factor = factor.max(0.0);
        Self {
            base_tick_delay_ms: self.base_tick_delay_ms * factor,
            min_tick_delay_ms: self.min_tick_delay_ms * factor,
            settle_duration_ms: self.settle_duration_ms * factor,
            stagger_ms: self.stagger_ms * factor,
            ..self.clone()
        }
    }
}

fn millis(ms: f64) -> Duration {
    Duration::from_nanos((ms.max(0.0) * 1_000_000.0).round() as u64)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetConfig {
    pub initial: u64,
    pub step: u64,
    pub min: u64,
}

impl Default for BetConfig {
    fn default() -> Self {
        Self {
            initial: 10,
            step: 10,
            min: 10,
        }
    }
}

impl BetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min == 0 {
            return Err(ConfigError::Bet("minimum bet must be positive"));
        }
        if self.step == 0 {
            return Err(ConfigError::Bet("bet step must be positive"));
        }
        if self.initial < self.min {
            return Err(ConfigError::Bet("initial bet is below the minimum"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Alphabet size K. Identifier 0 is the blank symbol.
    pub symbol_count: u8,
    pub reel_count: usize,
    pub timing: SpinTiming,
    pub paylines: Vec<Payline>,
    pub payouts: PayoutTable,
    pub bet: BetConfig,
    /// Cap on consecutive auto-spin rounds; `None` keeps spinning until a win
    /// or until the balance runs out.
    pub max_auto_rounds: Option<u32>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            symbol_count: 9,
            reel_count: 3,
            timing: SpinTiming::default(),
            paylines: default_paylines(),
            payouts: PayoutTable::classic(),
            bet: BetConfig::default(),
            max_auto_rounds: None,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol_count == 0 {
            return Err(ConfigError::EmptyAlphabet);
        }
        if self.reel_count == 0 {
            return Err(ConfigError::NoReels);
        }
        if self.max_auto_rounds == Some(0) {
            return Err(ConfigError::AutoRoundCap);
        }
        self.timing.validate()?;
        self.bet.validate()?;
        self.evaluator().map(|_| ())
    }

    pub fn evaluator(&self) -> Result<PaylineEvaluator, ConfigError> {
        PaylineEvaluator::new(
            self.paylines.clone(),
            self.payouts.clone(),
            self.symbol_count,
            self.reel_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(GameConfig::default().validate(), Ok(()));
    }

    #[test]
    fn tick_delay_decelerates_down_to_the_floor() {
        let timing = SpinTiming::default();
        assert_eq!(timing.tick_delay(0.0), Duration::from_millis(150));
        assert_eq!(timing.tick_delay(0.5), Duration::from_millis(75));
        assert_eq!(timing.tick_delay(0.9), Duration::from_millis(30));
        assert_eq!(timing.tick_delay(1.0), Duration::from_millis(30));
        let mut last = timing.tick_delay(0.0);
        for i in 1..=30 {
            let next = timing.tick_delay(i as f64 / 30.0);
            assert!(next <= last);
            last = next;
        }
    }

    #[test]
    fn scaled_to_zero_removes_all_waiting() {
        let timing = SpinTiming::default().scaled(0.0);
        assert_eq!(timing.tick_delay(0.0), Duration::ZERO);
        assert_eq!(timing.settle_frame_delay(), Duration::ZERO);
        assert_eq!(timing.stagger(), Duration::ZERO);
        assert_eq!(timing.validate(), Ok(()));
    }

    #[test]
    fn malformed_timing_rejected() {
        let timing = SpinTiming {
            slot_spacing: 0.0,
            ..SpinTiming::default()
        };
        assert_eq!(timing.validate(), Err(ConfigError::SlotSpacing(0.0)));

        let timing = SpinTiming {
            min_ticks: 31,
            ..SpinTiming::default()
        };
        assert_eq!(
            timing.validate(),
            Err(ConfigError::TickRange { min: 31, max: 30 })
        );
    }

    #[test]
    fn zero_auto_round_cap_rejected() {
        let config = GameConfig {
            max_auto_rounds: Some(0),
            ..GameConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::AutoRoundCap));
        let json = r#"{ "max_auto_rounds": 0 }"#;
        assert_eq!(GameConfig::from_json(json), Err(ConfigError::AutoRoundCap));
        let json = r#"{ "max_auto_rounds": 1 }"#;
        assert_eq!(GameConfig::from_json(json).map(|c| c.max_auto_rounds), Ok(Some(1)));
    }

    #[test]
    fn payout_table_must_cover_alphabet() {
        let config = GameConfig {
            symbol_count: 10,
            ..GameConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::PayoutTable {
                expected: 10,
                found: 9
            })
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = GameConfig::from_json(
            r#"{ "timing": { "stagger_ms": 50.0 }, "bet": { "initial": 20 } }"#,
        )
        .unwrap();
        assert_eq!(config.timing.stagger(), Duration::from_millis(50));
        assert_eq!(config.timing.slot_spacing, 150.0);
        assert_eq!(config.bet.initial, 20);
        assert_eq!(config.bet.step, 10);
        assert_eq!(config.paylines.len(), 5);
    }

    #[test]
    fn empty_payline_json_rejected() {
        let err = GameConfig::from_json(r#"{ "paylines": [] }"#).unwrap_err();
        assert_eq!(err, ConfigError::NoPaylines);
    }
}
