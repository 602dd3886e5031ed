// admin_cli.rs
//
// Numbered-menu console over the engine's query operations. Results are
// printed as pretty JSON, the same payloads a dashboard would receive.

use crate::engine::TrafficEngine;
use serde::Serialize;
use std::io::{stdout, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::task;

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serialising response: {}", e),
    }
}

fn prompt(text: &str) {
    print!("{}", text);
    if let Err(e) = stdout().flush() {
        eprintln!("Error flushing stdout: {}", e);
    }
}

async fn read_answer<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
) -> std::io::Result<Option<String>> {
    Ok(lines.next_line().await?.map(|l| l.trim().to_string()))
}

/// Runs until the user picks Exit or `input` is exhausted.
pub async fn run_cli<R: AsyncBufRead + Unpin>(
    engine: Arc<TrafficEngine>,
    input: R,
) -> std::io::Result<()> {
    let mut lines = input.lines();
    loop {
        println!("\nSmart Traffic Admin CLI");
        println!("1. Display Current Traffic");
        println!("2. Display Anomalies");
        println!("3. Plan Optimized Route");
        println!("4. Display Traffic Statistics");
        println!("5. List Available Locations");
        println!("6. Display ML Status");
        println!("7. Advance Simulation");
        println!("8. Reset Simulation");
        println!("9. Exit");
        prompt("Enter your choice: ");

        let Some(answer) = read_answer(&mut lines).await? else {
            break;
        };
        match answer.parse::<u32>().unwrap_or(0) {
            1 => print_json(&engine.get_current_traffic()),
            2 => match engine.detect_anomalies() {
                Ok(anomalies) => print_json(&anomalies),
                Err(e) => eprintln!("Error detecting anomalies: {}", e),
            },
            3 => {
                prompt("Start location: ");
                let start = read_answer(&mut lines).await?.unwrap_or_default();
                prompt("End location: ");
                let end = read_answer(&mut lines).await?.unwrap_or_default();
                match engine.get_optimized_route(&start, &end) {
                    Ok(route) => print_json(&route),
                    Err(e) => {
                        eprintln!("Error planning route: {}", e);
                        print_json(&e);
                    }
                }
            }
            4 => match engine.get_traffic_stats() {
                Some(stats) => print_json(&stats),
                None => println!("No traffic data available yet."),
            },
            5 => print_json(&engine.get_available_locations()),
            6 => print_json(&engine.get_ml_status()),
            7 => {
                let ticker = Arc::clone(&engine);
                match task::spawn_blocking(move || ticker.update_traffic_simulation()).await {
                    Ok(()) => println!("Simulation advanced one tick."),
                    Err(e) => eprintln!("Error advancing simulation: {}", e),
                }
            }
            8 => {
                let target = Arc::clone(&engine);
                match task::spawn_blocking(move || target.reset_simulation()).await {
                    Ok(()) => println!("Simulation reset."),
                    Err(e) => eprintln!("Error resetting simulation: {}", e),
                }
            }
            9 => {
                println!("Exiting CLI.");
                break;
            }
            _ => println!("Invalid choice. Try again."),
        }
    }
    Ok(())
}
