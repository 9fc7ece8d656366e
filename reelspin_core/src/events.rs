use crate::engine::{RoundOutcome, StopReason};
use crate::symbols::Column;

/// Fire-and-forget notifications for UI collaborators. Nobody has to listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEvent {
    RoundStarted { round: u64, bet: u64, balance: u64 },
    ReelStopped { round: u64, reel: usize, symbols: Column },
    RoundFinished { outcome: RoundOutcome },
    BalanceChanged { balance: u64 },
    BetChanged { bet: u64 },
    AutoSpinStopped { rounds: u32, reason: StopReason },
}
