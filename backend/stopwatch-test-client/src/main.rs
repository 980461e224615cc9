// src/main.rs

use chrono::{Duration as ChronoDuration, Local};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use std::time::Duration;

// Response types
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    formatted: String,
    displayed_seconds: u64,
    running: bool,
    ticking: bool,
    closed: bool,
    external_control: Option<bool>,
    anomalies: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health_response = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check status: {}", health_response.status);

    // Test 2: Open interval clocked in ten seconds ago
    println!("\n🔍 Clocking in 10 seconds ago...");
    let clock_in = (Local::now() - ChronoDuration::seconds(10))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();
    let snapshot = put_boundary(&client, &base_url, Some(&clock_in), None).await?;
    print_snapshot("After clock-in", &snapshot);

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let snapshot = get_snapshot(&client, &base_url).await?;
        print_snapshot("Ticking", &snapshot);
    }

    // Test 3: Malformed clock-in must not disturb the running value
    println!("\n🔍 Sending malformed clock-in...");
    let snapshot = put_boundary(&client, &base_url, Some("not-a-date"), None).await?;
    print_snapshot("After malformed update", &snapshot);

    // Test 4: Clock-out closes the interval
    println!("\n🔍 Clocking out...");
    let clock_out = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let snapshot = put_boundary(&client, &base_url, Some(&clock_in), Some(&clock_out)).await?;
    print_snapshot("After clock-out", &snapshot);

    println!("Trying to restart via external control (should stay frozen)...");
    let snapshot = put_control(&client, &base_url, Some(true)).await?;
    print_snapshot("After external start", &snapshot);
    tokio::time::sleep(Duration::from_secs(2)).await;
    print_snapshot("Two seconds later", &get_snapshot(&client, &base_url).await?);

    // Test 5: Internal start/stop is refused while external control is set
    println!("\n🔍 Testing internal start while externally controlled...");
    let response = client
        .post(format!("{}/stopwatch/start", base_url))
        .send()
        .await?;
    println!("Internal start status: {}", response.status());

    // Test 6: Reset
    println!("\n🔍 Resetting...");
    put_control(&client, &base_url, None).await?;
    let snapshot = client
        .post(format!("{}/stopwatch/reset", base_url))
        .send()
        .await?
        .json::<Snapshot>()
        .await?;
    print_snapshot("After reset", &snapshot);

    println!("\n✅ Testing complete!");

    Ok(())
}

async fn put_boundary(
    client: &Client,
    base_url: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Snapshot, Box<dyn Error>> {
    let snapshot = client
        .put(format!("{}/stopwatch/boundary", base_url))
        .json(&json!({ "start": start, "end": end, "running": true }))
        .send()
        .await?
        .json::<Snapshot>()
        .await?;
    Ok(snapshot)
}

async fn put_control(
    client: &Client,
    base_url: &str,
    running: Option<bool>,
) -> Result<Snapshot, Box<dyn Error>> {
    let snapshot = client
        .put(format!("{}/stopwatch/control", base_url))
        .json(&json!({ "running": running }))
        .send()
        .await?
        .json::<Snapshot>()
        .await?;
    Ok(snapshot)
}

async fn get_snapshot(client: &Client, base_url: &str) -> Result<Snapshot, Box<dyn Error>> {
    let snapshot = client
        .get(format!("{}/stopwatch", base_url))
        .send()
        .await?
        .json::<Snapshot>()
        .await?;
    Ok(snapshot)
}

fn print_snapshot(label: &str, snapshot: &Snapshot) {
    println!(
        "{:<24} {} ({}s) running={} ticking={} closed={} external={:?} anomalies={}",
        label,
        snapshot.formatted,
        snapshot.displayed_seconds,
        snapshot.running,
        snapshot.ticking,
        snapshot.closed,
        snapshot.external_control,
        snapshot.anomalies
    );
}
