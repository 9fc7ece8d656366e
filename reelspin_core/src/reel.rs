//! Per-reel spin state machine.
//!
//! The machine is synchronous: every call to [`ReelSpinMachine::advance`]
//! performs one scheduled step and returns how long to wait before the next
//! one. [`crate::handle::ReelHandle`] supplies the clock.

use std::time::Duration;

use tracing::{debug, trace};

use crate::config::SpinTiming;
use crate::error::{ConfigError, ReelError};
use crate::rng::SymbolRng;
use crate::symbols::{Column, SymbolId, ROWS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub symbol: SymbolId,
    /// Vertical offset relative to the middle row, positive is up.
    pub offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReelState {
    Idle,
    Starting,
    Sliding,
    Settling,
    Stopped,
}

impl ReelState {
    pub fn is_spinning(self) -> bool {
        matches!(
            self,
            ReelState::Starting | ReelState::Sliding | ReelState::Settling
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinSession {
    pub generation: u64,
    pub delay: Duration,
    pub tick_count: u32,
    /// Drawn when sliding begins; zero while still Starting.
    pub max_spins: u32,
}

impl SpinSession {
    pub fn progress(&self) -> f64 {
        if self.max_spins == 0 {
            return 0.0;
        }
        self.tick_count as f64 / self.max_spins as f64
    }
}

/// What the driver should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Wait(Duration),
    Stopped,
}

pub struct ReelSpinMachine {
    index: usize,
    timing: SpinTiming,
    rng: SymbolRng,
    slots: [Slot; ROWS],
    state: ReelState,
    session: Option<SpinSession>,
    generation: u64,
    settle_from: [f64; ROWS],
    settle_frame: u32,
    locked: Option<Column>,
}

impl ReelSpinMachine {
    pub fn new(index: usize, timing: SpinTiming, mut rng: SymbolRng) -> Result<Self, ConfigError> {
        timing.validate()?;
        let column = rng.column();
        let mut slots = [Slot {
            symbol: 0,
            offset: 0.0,
        }; ROWS];
        for (i, slot) in slots.iter_mut().enumerate() {
            slot.symbol = column[i];
            slot.offset = resting_offset(&timing, i);
        }
        Ok(Self {
            index,
            timing,
            rng,
            slots,
            state: ReelState::Idle,
            session: None,
            generation: 0,
            settle_from: [0.0; ROWS],
            settle_frame: 0,
            locked: None,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> ReelState {
        self.state
    }

    pub fn session(&self) -> Option<&SpinSession> {
        self.session.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn timing(&self) -> &SpinTiming {
        &self.timing
    }

    pub fn alphabet(&self) -> u8 {
        self.rng.alphabet()
    }

    /// Slots ordered top to bottom.
    pub fn slots(&self) -> &[Slot; ROWS] {
        &self.slots
    }

    /// Currently visible identifiers, top to bottom, whatever the state.
    pub fn visible_symbols(&self) -> Column {
        let mut column = [0; ROWS];
        for (out, slot) in column.iter_mut().zip(&self.slots) {
            *out = slot.symbol;
        }
        column
    }

    /// Open a new session. Rejected with `Busy` unless Idle or Stopped, in
    /// which case nothing changes. Returns the session generation.
    pub fn start(&mut self, delay: Duration) -> Result<u64, ReelError> {
        if self.state.is_spinning() {
            return Err(ReelError::Busy);
        }
        self.generation += 1;
        self.session = Some(SpinSession {
            generation: self.generation,
            delay,
            tick_count: 0,
            max_spins: 0,
        });
        self.locked = None;
        self.state = ReelState::Starting;
        debug!(reel = self.index, generation = self.generation, ?delay, "reel starting");
        Ok(self.generation)
    }

    /// Perform the next scheduled step. Call after the start delay has
    /// elapsed, then again after every returned `Wait`.
    pub fn advance(&mut self) -> Step {
        match self.state {
            ReelState::Idle | ReelState::Stopped => Step::Stopped,
            ReelState::Starting => {
                self.begin_sliding();
                self.tick()
            }
            ReelState::Sliding => self.tick(),
            ReelState::Settling => self.settle_frame(),
        }
    }

    /// Force Stopped, snapping to rest and locking whatever is visible.
    /// Returns false when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        if !self.state.is_spinning() {
            return false;
        }
        for i in 0..ROWS {
            self.slots[i].offset = resting_offset(&self.timing, i);
        }
        debug!(reel = self.index, from = ?self.state, "reel cancelled");
        self.lock();
        true
    }

    /// The locked result of the last session.
    pub fn final_symbols(&self) -> Result<Column, ReelError> {
        match (self.state, self.locked) {
            (ReelState::Stopped, Some(column)) => Ok(column),
            _ => Err(ReelError::NotReady),
        }
    }

    fn begin_sliding(&mut self) {
        let max_spins = self.rng.in_range(&self.timing.tick_range());
        for i in 0..ROWS {
            self.slots[i].offset = resting_offset(&self.timing, i);
        }
        if let Some(session) = self.session.as_mut() {
            session.max_spins = max_spins;
        }
        self.state = ReelState::Sliding;
        debug!(reel = self.index, max_spins, "reel sliding");
    }

    fn tick(&mut self) -> Step {
        self.slide();
        let Some(session) = self.session.as_mut() else {
            // sessions exist for the whole spin; treat a missing one as done
            self.lock();
            return Step::Stopped;
        };
        session.tick_count += 1;
        trace!(
            reel = self.index,
            tick = session.tick_count,
            max = session.max_spins,
            "tick"
        );
        if session.tick_count < session.max_spins {
            return Step::Wait(self.timing.tick_delay(session.progress()));
        }
        self.begin_settling()
    }

    fn slide(&mut self) {
        let h = self.timing.slot_spacing;
        for slot in self.slots.iter_mut() {
            let next = slot.offset - self.timing.slide_distance;
            if next < -1.5 * h {
                // new symbol enters at the top
                slot.offset = 1.5 * h;
                slot.symbol = self.rng.next();
            } else {
                slot.offset = next;
            }
        }
        self.slots.sort_by(|a, b| b.offset.total_cmp(&a.offset));
    }

    fn begin_settling(&mut self) -> Step {
        for (from, slot) in self.settle_from.iter_mut().zip(&self.slots) {
            *from = slot.offset;
        }
        self.settle_frame = 0;
        self.state = ReelState::Settling;
        debug!(reel = self.index, "reel settling");
        Step::Wait(self.timing.settle_frame_delay())
    }

    fn settle_frame(&mut self) -> Step {
        self.settle_frame += 1;
        let frames = self.timing.settle_frames;
        let t = ease_out_quad(self.settle_frame as f64 / frames as f64);
        for i in 0..ROWS {
            let target = resting_offset(&self.timing, i);
            self.slots[i].offset = self.settle_from[i] + (target - self.settle_from[i]) * t;
        }
        if self.settle_frame < frames {
            return Step::Wait(self.timing.settle_frame_delay());
        }
        self.lock();
        Step::Stopped
    }

    fn lock(&mut self) {
        let column = self.visible_symbols();
        self.locked = Some(column);
        self.session = None;
        self.state = ReelState::Stopped;
        debug!(reel = self.index, symbols = ?column, "reel stopped");
    }
}

impl std::fmt::Debug for ReelSpinMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReelSpinMachine")
            .field("index", &self.index)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

/// Row `i` rests at `H - i * H`: `{+H, 0, -H}`.
fn resting_offset(timing: &SpinTiming, row: usize) -> f64 {
    timing.slot_spacing - row as f64 * timing.slot_spacing
}

fn ease_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRandom;
    use proptest::prelude::*;

    fn machine(seed: u64) -> ReelSpinMachine {
        let rng = SymbolRng::new(9, SeededRandom::seed_from_u64(seed)).unwrap();
        ReelSpinMachine::new(0, SpinTiming::default(), rng).unwrap()
    }

    fn run_to_stop(m: &mut ReelSpinMachine) -> Vec<Duration> {
        let mut waits = Vec::new();
        while let Step::Wait(d) = m.advance() {
            waits.push(d);
        }
        waits
    }

    #[test]
    fn new_reel_rests_on_canonical_offsets() {
        let m = machine(1);
        assert_eq!(m.state(), ReelState::Idle);
        let offsets: Vec<f64> = m.slots().iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![150.0, 0.0, -150.0]);
    }

    #[test]
    fn final_symbols_not_ready_until_stopped() {
        let mut m = machine(2);
        assert_eq!(m.final_symbols(), Err(ReelError::NotReady));
        m.start(Duration::ZERO).unwrap();
        assert_eq!(m.final_symbols(), Err(ReelError::NotReady));
        m.advance();
        assert_eq!(m.state(), ReelState::Sliding);
        assert_eq!(m.final_symbols(), Err(ReelError::NotReady));
        run_to_stop(&mut m);
        let first = m.final_symbols().unwrap();
        assert_eq!(m.final_symbols().unwrap(), first);
        assert_eq!(m.advance(), Step::Stopped);
        assert_eq!(m.final_symbols().unwrap(), first);
    }

    #[test]
    fn start_while_sliding_changes_nothing() {
        let mut m = machine(3);
        m.start(Duration::from_millis(200)).unwrap();
        m.advance();
        m.advance();
        let session = *m.session().unwrap();
        let slots = *m.slots();
        assert_eq!(m.start(Duration::ZERO), Err(ReelError::Busy));
        assert_eq!(m.state(), ReelState::Sliding);
        assert_eq!(*m.session().unwrap(), session);
        assert_eq!(*m.slots(), slots);
        assert_eq!(m.generation(), 1);
    }

    #[test]
    fn stopped_reel_can_start_again() {
        let mut m = machine(4);
        m.start(Duration::ZERO).unwrap();
        run_to_stop(&mut m);
        assert_eq!(m.start(Duration::ZERO), Ok(2));
        assert_eq!(m.state(), ReelState::Starting);
        assert_eq!(m.final_symbols(), Err(ReelError::NotReady));
    }

    #[test]
    fn tick_delays_decelerate_then_settle_frames_follow() {
        let mut m = machine(5);
        m.start(Duration::ZERO).unwrap();
        m.advance();
        let max_spins = m.session().unwrap().max_spins;
        assert!((20..=30).contains(&max_spins));
        let mut waits = vec![];
        while m.state() == ReelState::Sliding {
            match m.advance() {
                Step::Wait(d) => waits.push(d),
                Step::Stopped => break,
            }
        }
        // first tick ran inside the Starting step, the last one moved to Settling
        assert_eq!(waits.len() as u32, max_spins - 1);
        assert!(waits.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(m.state(), ReelState::Settling);
        let settle = run_to_stop(&mut m);
        assert_eq!(settle.len(), 9);
        assert_eq!(m.state(), ReelState::Stopped);
    }

    #[test]
    fn settled_reel_rests_on_canonical_offsets() {
        let mut m = machine(6);
        m.start(Duration::ZERO).unwrap();
        run_to_stop(&mut m);
        let offsets: Vec<f64> = m.slots().iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![150.0, 0.0, -150.0]);
        assert_eq!(m.final_symbols().unwrap(), m.visible_symbols());
    }

    #[test]
    fn cancel_locks_visible_symbols() {
        let mut m = machine(7);
        assert!(!m.cancel());
        m.start(Duration::ZERO).unwrap();
        for _ in 0..5 {
            m.advance();
        }
        let visible = m.visible_symbols();
        assert!(m.cancel());
        assert_eq!(m.state(), ReelState::Stopped);
        assert_eq!(m.final_symbols(), Ok(visible));
        assert!(m.session().is_none());
    }

    proptest! {
        #[test]
        fn slots_stay_in_alphabet_and_ordered(seed in any::<u64>(), k in 1u8..=20) {
            let rng = SymbolRng::new(k, SeededRandom::seed_from_u64(seed)).unwrap();
            let mut m = ReelSpinMachine::new(0, SpinTiming::default(), rng).unwrap();
            m.start(Duration::ZERO).unwrap();
            loop {
                for slot in m.slots() {
                    prop_assert!(slot.symbol < k);
                }
                if m.state() == ReelState::Sliding {
                    let s = m.slots();
                    prop_assert!(s[0].offset > s[1].offset && s[1].offset > s[2].offset);
                }
                if m.advance() == Step::Stopped {
                    break;
                }
            }
            for symbol in m.final_symbols().unwrap() {
                prop_assert!(symbol < k);
            }
        }

        #[test]
        fn session_always_terminates(seed in any::<u64>(), min in 1u32..50, extra in 0u32..50) {
            let timing = SpinTiming { min_ticks: min, max_ticks: min + extra, ..SpinTiming::default() };
            let rng = SymbolRng::new(9, SeededRandom::seed_from_u64(seed)).unwrap();
            let mut m = ReelSpinMachine::new(0, timing.clone(), rng).unwrap();
            m.start(Duration::ZERO).unwrap();
            let steps = run_to_stop(&mut m).len() as u32 + 1;
            prop_assert_eq!(m.state(), ReelState::Stopped);
            // ticks plus settle frames
            prop_assert!(steps <= min + extra + timing.settle_frames);
        }
    }
}
