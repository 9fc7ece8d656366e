pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod ledger;
pub mod paytable;
pub mod reel;
pub mod rng;
pub mod symbols;

pub use crate::config::{BetConfig, GameConfig, SpinTiming};
pub use crate::engine::{RoundOrchestrator, RoundOutcome, RoundReport, StopReason};
pub use crate::error::{ConfigError, ReelError, RoundError, RoundResult};
pub use crate::events::RoundEvent;
pub use crate::handle::{ReelHandle, ReelStop, SpinReel, StopSender};
pub use crate::ledger::{InMemoryLedger, Ledger};
pub use crate::paytable::{default_paylines, Evaluation, LineWin, Payline, PaylineEvaluator, PayoutTable};
pub use crate::reel::{ReelSpinMachine, ReelState, Slot, SpinSession, Step};
pub use crate::rng::{derive_floats, derive_hash_hex, ProvablyFairRng, RandomSource, SeededRandom, SymbolRng};
pub use crate::symbols::{Column, Grid, Row, SymbolId, BLANK, ROWS};
