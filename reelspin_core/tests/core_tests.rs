use std::time::Duration;

use reelspin_core::{
    GameConfig, Grid, InMemoryLedger, PaylineEvaluator, ProvablyFairRng, RandomSource,
    ReelState, RoundEvent, RoundOrchestrator, SpinReel, SpinTiming,
};

fn fast_config() -> GameConfig {
    GameConfig {
        timing: SpinTiming::default().scaled(0.0),
        ..GameConfig::default()
    }
}

fn fair(seed: &'static str, client: &'static str) -> impl FnMut(usize) -> ProvablyFairRng {
    move |reel| ProvablyFairRng::new(seed, format!("{client}:reel{reel}"), 1)
}

#[test]
fn rng_repeatable() {
    let mut rng1 = ProvablyFairRng::new("s", "c", 42);
    let mut rng2 = ProvablyFairRng::new("s", "c", 42);
    for _ in 0..50 {
        assert_eq!(rng1.next_f64(), rng2.next_f64());
    }
}

#[test]
fn payout_basic() {
    let eval = PaylineEvaluator::classic();
    let grid = Grid::new(vec![[1, 4, 3], [5, 4, 6], [7, 4, 1]]);
    assert_eq!(eval.score(&grid, 10), 100);
}

#[tokio::test(start_paused = true)]
async fn same_seeds_replay_the_same_rounds() {
    let a = RoundOrchestrator::from_config(&fast_config(), InMemoryLedger::default(), fair("server", "client"))
        .unwrap();
    let b = RoundOrchestrator::from_config(&fast_config(), InMemoryLedger::default(), fair("server", "client"))
        .unwrap();
    for _ in 0..5 {
        let ra = a.play_round(Duration::ZERO, false).await.unwrap();
        let rb = b.play_round(Duration::ZERO, false).await.unwrap();
        assert_eq!(ra.outcome.grid, rb.outcome.grid);
        assert_eq!(ra.win(), rb.win());
    }
    assert_eq!(a.balance(), b.balance());
}

#[tokio::test(start_paused = true)]
async fn real_reels_report_every_stop_before_the_round_finishes() {
    let orch = RoundOrchestrator::from_config(&GameConfig::default(), InMemoryLedger::default(), fair("s", "c"))
        .unwrap();
    let mut rx = orch.subscribe();
    let report = orch.play_round(Duration::from_millis(200), false).await.unwrap();

    let mut stops = 0;
    let mut finished = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            RoundEvent::ReelStopped { reel, symbols, .. } => {
                assert!(!finished);
                assert_eq!(orch.reels()[reel].final_symbols(), Ok(symbols));
                stops += 1;
            }
            RoundEvent::RoundFinished { outcome } => {
                assert_eq!(outcome, report.outcome);
                finished = true;
            }
            _ => {}
        }
    }
    assert_eq!(stops, 3);
    assert!(finished);
    for (reel, column) in orch.reels().iter().zip(report.outcome.grid.columns()) {
        assert_eq!(reel.state(), ReelState::Stopped);
        assert_eq!(reel.final_symbols(), Ok(*column));
    }
}

#[tokio::test(start_paused = true)]
async fn rtp_simulation_smoke() {
    let config = fast_config();
    let orch = RoundOrchestrator::from_config(&config, InMemoryLedger::new(1_000_000), fair("server", "smoke"))
        .unwrap();
    let mut total_bet = 0u64;
    let mut total_win = 0u64;
    for _ in 0..300 {
        let report = orch.play_round(Duration::ZERO, false).await.unwrap();
        total_bet += report.outcome.bet;
        total_win += report.win();
        for column in report.outcome.grid.columns() {
            assert!(column.iter().all(|s| *s < config.symbol_count));
        }
    }
    assert_eq!(orch.balance(), 1_000_000 - total_bet + total_win);
    assert_eq!(orch.rounds_played(), 300);
}
