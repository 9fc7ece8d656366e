//! Round orchestration: debit, staggered launch, completion barrier, scoring,
//! credit, and the auto-spin loop.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::{BetConfig, GameConfig};
use crate::error::{ConfigError, RoundError, RoundResult};
use crate::events::RoundEvent;
use crate::handle::{ReelHandle, SpinReel};
use crate::ledger::Ledger;
use crate::paytable::{LineWin, PaylineEvaluator};
use crate::reel::ReelSpinMachine;
use crate::rng::{RandomSource, SymbolRng};
use crate::symbols::Grid;

pub const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: u64,
    pub bet: u64,
    pub grid: Grid,
    pub line_wins: Vec<LineWin>,
    pub win: u64,
    /// Balance after the win was credited.
    pub balance: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    /// Auto-continue was off.
    Single,
    Won,
    InsufficientFunds,
    CapReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    /// Outcome of the last round played.
    pub outcome: RoundOutcome,
    /// Every round this call played, oldest first; ends with `outcome`.
    pub history: Vec<RoundOutcome>,
    pub rounds_played: u32,
    pub stop: StopReason,
}

impl RoundReport {
    pub fn win(&self) -> u64 {
        self.outcome.win
    }
}

struct Bank<L> {
    ledger: L,
    bet: u64,
    in_flight: bool,
    rounds: u64,
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    round: u64,
    bet: u64,
    balance: u64,
}

/// Clears the in-flight flag when a `play_round` call ends, however it ends.
struct InFlight<'a, L> {
    bank: &'a Mutex<Bank<L>>,
    held: bool,
}

impl<'a, L> InFlight<'a, L> {
    /// Clear the flag now, handing back the still-locked bank.
    fn release(mut self) -> MutexGuard<'a, Bank<L>> {
        self.held = false;
        let bank = self.bank;
        let mut guard = bank.lock();
        guard.in_flight = false;
        guard
    }
}

impl<L> Drop for InFlight<'_, L> {
    fn drop(&mut self) {
        if self.held {
            self.bank.lock().in_flight = false;
        }
    }
}

/// A debited round that has not been credited yet. Dropped while armed, by an
/// early return or by the caller abandoning the future, it stops the reels it
/// started and refunds the bet.
struct PendingRound<'a, R: SpinReel, L: Ledger> {
    orchestrator: &'a RoundOrchestrator<R, L>,
    ticket: Option<Ticket>,
    started: usize,
}

impl<R: SpinReel, L: Ledger> PendingRound<'_, R, L> {
    fn settle(mut self) {
        self.ticket = None;
    }
}

impl<R: SpinReel, L: Ledger> Drop for PendingRound<'_, R, L> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        warn!(round = ticket.round, started = self.started, "round unwound before scoring, bet refunded");
        for reel in &self.orchestrator.reels[..self.started] {
            reel.cancel();
        }
        self.orchestrator.refund(ticket);
    }
}

/// Owns the reels and the ledger of one machine. Construct once and share by
/// reference (or `Arc`) with whatever issues rounds.
pub struct RoundOrchestrator<R, L> {
    reels: Vec<R>,
    evaluator: PaylineEvaluator,
    bet_config: BetConfig,
    max_auto_rounds: Option<u32>,
    bank: Mutex<Bank<L>>,
    events: broadcast::Sender<RoundEvent>,
}

impl<L: Ledger> RoundOrchestrator<ReelHandle, L> {
    /// Build `reel_count` spinning reels; `source_for(i)` seeds reel `i`.
    pub fn from_config<S, F>(config: &GameConfig, ledger: L, mut source_for: F) -> Result<Self, ConfigError>
    where
        S: RandomSource + 'static,
        F: FnMut(usize) -> S,
    {
        config.validate()?;
        let reels = (0..config.reel_count)
            .map(|i| {
                let rng = SymbolRng::new(config.symbol_count, source_for(i))?;
                let machine = ReelSpinMachine::new(i, config.timing.clone(), rng)?;
                Ok(ReelHandle::new(machine))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Self::new(
            reels,
            config.evaluator()?,
            ledger,
            config.bet.clone(),
            config.max_auto_rounds,
        )
    }
}

impl<R: SpinReel, L: Ledger> RoundOrchestrator<R, L> {
    pub fn new(
        reels: Vec<R>,
        evaluator: PaylineEvaluator,
        ledger: L,
        bet_config: BetConfig,
        max_auto_rounds: Option<u32>,
    ) -> Result<Self, ConfigError> {
        if reels.is_empty() {
            return Err(ConfigError::NoReels);
        }
        bet_config.validate()?;
        if max_auto_rounds == Some(0) {
            return Err(ConfigError::AutoRoundCap);
        }
        for (line, payline) in evaluator.paylines().iter().enumerate() {
            if let Some(&(reel, _)) = payline.0.iter().find(|(reel, _)| *reel >= reels.len()) {
                return Err(ConfigError::PaylineOutOfBounds {
                    line,
                    reel,
                    reels: reels.len(),
                });
            }
        }
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Ok(Self {
            reels,
            evaluator,
            bank: Mutex::new(Bank {
                ledger,
                bet: bet_config.initial,
                in_flight: false,
                rounds: 0,
            }),
            bet_config,
            max_auto_rounds,
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    pub fn reels(&self) -> &[R] {
        &self.reels
    }

    pub fn evaluator(&self) -> &PaylineEvaluator {
        &self.evaluator
    }

    pub fn balance(&self) -> u64 {
        self.bank.lock().ledger.balance()
    }

    pub fn bet(&self) -> u64 {
        self.bank.lock().bet
    }

    /// Rounds that got past the debit step since construction.
    pub fn rounds_played(&self) -> u64 {
        self.bank.lock().rounds
    }

    pub fn is_round_in_flight(&self) -> bool {
        self.bank.lock().in_flight
    }

    /// Play one round, and with `auto_continue` keep playing while rounds
    /// lose, until a win, an empty balance, or the configured cap.
    ///
    /// A call made while another is in flight fails with `Busy`; a call that
    /// cannot cover the bet fails with `InsufficientFunds`. Neither touches the
    /// ledger. Dropping the returned future before a round is credited refunds
    /// that round's bet.
    pub async fn play_round(&self, stagger: Duration, auto_continue: bool) -> RoundResult<RoundReport> {
        let mut ticket = match self.begin_round(true) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(error = %e, "round rejected");
                return Err(e);
            }
        };
        let flight = InFlight {
            bank: &self.bank,
            held: true,
        };
        let mut history = Vec::new();
        loop {
            let outcome = self.run_round(ticket, stagger).await?;
            history.push(outcome.clone());
            let rounds_played = history.len() as u32;

            let stop = if !auto_continue {
                Some(StopReason::Single)
            } else if outcome.win > 0 {
                Some(StopReason::Won)
            } else if self.max_auto_rounds.is_some_and(|cap| rounds_played >= cap) {
                Some(StopReason::CapReached)
            } else {
                // debit the next round before reporting this one
                match self.begin_round(false) {
                    Ok(next) => {
                        ticket = next;
                        None
                    }
                    Err(RoundError::InsufficientFunds { .. }) => Some(StopReason::InsufficientFunds),
                    Err(e) => return Err(e),
                }
            };
            match stop {
                Some(stop) => return Ok(self.finish(flight, outcome, history, stop, auto_continue)),
                None => {
                    let _ = self.events.send(RoundEvent::RoundFinished { outcome });
                    debug!(round = ticket.round, "auto-spin continuing");
                }
            }
        }
    }

    /// Raise the bet by one step while it is below the balance.
    pub fn raise_bet(&self) -> RoundResult<u64> {
        let mut bank = self.bank.lock();
        if bank.in_flight {
            return Err(RoundError::Busy);
        }
        if bank.bet < bank.ledger.balance() {
            bank.bet = bank.bet.saturating_add(self.bet_config.step);
            let _ = self.events.send(RoundEvent::BetChanged { bet: bank.bet });
        }
        Ok(bank.bet)
    }

    /// Lower the bet by one step, never below the minimum.
    pub fn lower_bet(&self) -> RoundResult<u64> {
        let mut bank = self.bank.lock();
        if bank.in_flight {
            return Err(RoundError::Busy);
        }
        if bank.bet > self.bet_config.min {
            bank.bet = bank
                .bet
                .saturating_sub(self.bet_config.step)
                .max(self.bet_config.min);
            let _ = self.events.send(RoundEvent::BetChanged { bet: bank.bet });
        }
        Ok(bank.bet)
    }

    /// Force every reel to stop where it is.
    pub fn shutdown(&self) {
        for reel in &self.reels {
            reel.cancel();
        }
    }

    /// Debit the bet and mark the machine busy, atomically. Only the first
    /// round of a call checks the flag; auto-spin rounds already hold it.
    fn begin_round(&self, first: bool) -> RoundResult<Ticket> {
        let mut bank = self.bank.lock();
        if first && bank.in_flight {
            return Err(RoundError::Busy);
        }
        let bet = bank.bet;
        if !bank.ledger.debit(bet) {
            return Err(RoundError::InsufficientFunds {
                balance: bank.ledger.balance(),
                bet,
            });
        }
        bank.in_flight = true;
        bank.rounds += 1;
        Ok(Ticket {
            round: bank.rounds,
            bet,
            balance: bank.ledger.balance(),
        })
    }

    /// Undo a debit for a round that never got to score.
    fn refund(&self, ticket: Ticket) {
        let balance = {
            let mut bank = self.bank.lock();
            bank.ledger.credit(ticket.bet);
            bank.rounds -= 1;
            bank.ledger.balance()
        };
        let _ = self.events.send(RoundEvent::BalanceChanged { balance });
    }

    async fn run_round(&self, ticket: Ticket, stagger: Duration) -> RoundResult<RoundOutcome> {
        let Ticket { round, bet, balance } = ticket;
        let mut pending = PendingRound {
            orchestrator: self,
            ticket: Some(ticket),
            started: 0,
        };
        info!(round, bet, balance, "round started");
        let _ = self.events.send(RoundEvent::RoundStarted { round, bet, balance });
        let _ = self.events.send(RoundEvent::BalanceChanged { balance });

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        for (i, reel) in self.reels.iter().enumerate() {
            if let Err(source) = reel.start(stagger * i as u32, done_tx.clone()) {
                warn!(round, reel = i, error = %source, "reel refused to start, round aborted");
                return Err(RoundError::Reel { reel: i, source });
            }
            pending.started += 1;
        }
        drop(done_tx);

        // each reel signals exactly once
        let mut remaining = self.reels.len();
        while remaining > 0 {
            match done_rx.recv().await {
                Some(stop) => {
                    remaining -= 1;
                    debug!(round, reel = stop.reel, symbols = ?stop.symbols, remaining, "reel stopped");
                    let _ = self.events.send(RoundEvent::ReelStopped {
                        round,
                        reel: stop.reel,
                        symbols: stop.symbols,
                    });
                }
                None => {
                    warn!(round, remaining, "reels went silent, forcing stop");
                    self.shutdown();
                    break;
                }
            }
        }

        let columns = self
            .reels
            .iter()
            .enumerate()
            .map(|(i, reel)| {
                reel.final_symbols()
                    .map_err(|source| RoundError::Reel { reel: i, source })
            })
            .collect::<RoundResult<Vec<_>>>()?;
        let grid = Grid::new(columns);
        let eval = self.evaluator.evaluate(&grid, bet);

        let balance = {
            let mut bank = self.bank.lock();
            if eval.total > 0 {
                bank.ledger.credit(eval.total);
            }
            bank.ledger.balance()
        };
        pending.settle();
        let outcome = RoundOutcome {
            round,
            bet,
            grid,
            line_wins: eval.line_wins,
            win: eval.total,
            balance,
        };
        info!(round, win = outcome.win, balance, "round finished");
        if outcome.win > 0 {
            let _ = self.events.send(RoundEvent::BalanceChanged { balance });
        }
        Ok(outcome)
    }

    /// Release the machine, then report the call's last round. Listeners may
    /// start the next round as soon as they see `RoundFinished`.
    fn finish(
        &self,
        flight: InFlight<'_, L>,
        outcome: RoundOutcome,
        history: Vec<RoundOutcome>,
        stop: StopReason,
        auto: bool,
    ) -> RoundReport {
        let rounds_played = history.len() as u32;
        let _bank = flight.release();
        let _ = self.events.send(RoundEvent::RoundFinished {
            outcome: outcome.clone(),
        });
        if auto {
            info!(rounds = rounds_played, reason = ?stop, "auto-spin stopped");
            let _ = self.events.send(RoundEvent::AutoSpinStopped {
                rounds: rounds_played,
                reason: stop,
            });
        }
        RoundReport {
            outcome,
            history,
            rounds_played,
            stop,
        }
    }
}

impl<R: SpinReel, L: Ledger> std::fmt::Debug for RoundOrchestrator<R, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bank = self.bank.lock();
        f.debug_struct("RoundOrchestrator")
            .field("reels", &self.reels.len())
            .field("bet", &bank.bet)
            .field("balance", &bank.ledger.balance())
            .field("in_flight", &bank.in_flight)
            .field("rounds", &bank.rounds)
            .finish_non_exhaustive()
    }
}
