use reelspin_core::{GameConfig, InMemoryLedger, ProvablyFairRng, RoundOrchestrator};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example end-to-end round on reproducible reels
    let server_seed = "example-server-seed";
    let client_seed = "example-client-seed";
    let config = GameConfig::default();
    let orchestrator = RoundOrchestrator::from_config(&config, InMemoryLedger::default(), |reel| {
        ProvablyFairRng::new(server_seed, format!("{client_seed}:reel{reel}"), 1)
    })?;
    let report = orchestrator
        .play_round(config.timing.stagger(), false)
        .await?;
    println!(
        "server_seed_hash={} win={} balance={} grid={:?}",
        ProvablyFairRng::new(server_seed, client_seed, 1).server_seed_hash_hex(),
        report.win(),
        report.outcome.balance,
        report.outcome.grid.rows()
    );
    Ok(())
}
