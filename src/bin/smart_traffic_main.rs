use smart_traffic::monitoring::run_cli;
use smart_traffic::{EngineConfig, TrafficEngine};
use std::sync::Arc;
use tokio::io::{stdin, BufReader};
use tokio::task;
use tokio::time::{interval, Duration, MissedTickBehavior};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = EngineConfig::from_env();
    config.validate()?;
    let refresh_secs = config.auto_refresh_interval_secs.max(1);

    println!("Starting smart traffic engine...");
    let engine = Arc::new(task::spawn_blocking(move || TrafficEngine::new(config)).await??);

    // Background simulation tick.
    let ticker = Arc::clone(&engine);
    let refresh_handle = tokio::spawn(async move {
        let mut clock = interval(Duration::from_secs(refresh_secs));
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
        clock.tick().await;
        loop {
            clock.tick().await;
            let engine = Arc::clone(&ticker);
            if let Err(e) = task::spawn_blocking(move || engine.update_traffic_simulation()).await {
                log::error!("Simulation tick panicked: {}", e);
            }
        }
    });

    let result = run_cli(engine, BufReader::new(stdin())).await;
    refresh_handle.abort();
    result?;
    Ok(())
}
