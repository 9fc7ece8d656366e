use thiserror::Error;

/// Rejected configuration. Raised at construction, never mid-spin.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("symbol alphabet is empty")]
    EmptyAlphabet,
    #[error("slot spacing must be a positive number, got {0}")]
    SlotSpacing(f64),
    #[error("slide distance must be in (0, slot spacing], got {0}")]
    SlideDistance(f64),
    #[error("tick range {min}..={max} is empty or starts at zero")]
    TickRange { min: u32, max: u32 },
    #[error("invalid timing value for {field}: {value}")]
    Timing { field: &'static str, value: f64 },
    #[error("no reels configured")]
    NoReels,
    #[error("payline set is empty")]
    NoPaylines,
    #[error("payline {line} addresses reel {reel}, but only {reels} reels exist")]
    PaylineOutOfBounds { line: usize, reel: usize, reels: usize },
    #[error("payout table has {found} entries, expected one per symbol ({expected})")]
    PayoutTable { expected: usize, found: usize },
    #[error("auto-spin cap must allow at least one round")]
    AutoRoundCap,
    #[error("invalid bet configuration: {0}")]
    Bet(&'static str),
    #[error("could not parse configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReelError {
    #[error("reel is already spinning")]
    Busy,
    #[error("reel has not stopped yet")]
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("a round is already in flight")]
    Busy,
    #[error("insufficient funds: balance {balance}, bet {bet}")]
    InsufficientFunds { balance: u64, bet: u64 },
    #[error("reel {reel}: {source}")]
    Reel {
        reel: usize,
        #[source]
        source: ReelError,
    },
}

pub type RoundResult<T> = Result<T, RoundError>;
