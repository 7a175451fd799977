//! End-to-end exerciser for a running telemetry hub.
//!
//! Walks the whole pipeline against a live server: health check, WebSocket
//! subscription, batch ingestion with fan-out, CRUD round trip, not-found
//! contract, and timestamp validation. Run it with the server already
//! listening, e.g.:
//!
//! ```text
//! cargo run -p servers --bin server_telemetry -- --memory-store true
//! cargo run -p project_tests --bin test_telemetry_live
//! ```

use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use futures_util::{Stream, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use lib_common::core::model::{Motion, NewRecord, Position, ProcessedRecord};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the running hub
    #[clap(long, default_value = "http://127.0.0.1:8000")]
    base_url: String,

    /// Agent id used for the subscription checks
    #[clap(long, default_value_t = 7001)]
    agent_id: i32,
}

fn ws_url(base_url: &str, agent_id: i32) -> Result<String> {
    let mut url = Url::parse(base_url).context("base-url is not a valid URL")?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot derive WebSocket scheme from {}", base_url))?;
    Ok(format!("{}ws/{}", url, agent_id))
}

fn sample(agent_id: i32, road_state: &str, timestamp: &str) -> NewRecord {
    NewRecord {
        agent_id,
        road_state: road_state.to_string(),
        motion: Motion { x: 1.0, y: 2.0, z: 3.0 },
        position: Position { latitude: 10.5, longitude: 20.5 },
        timestamp: timestamp.to_string(),
    }
}

async fn next_record(
    read: &mut (impl Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
) -> Result<ProcessedRecord> {
    loop {
        let msg = timeout(Duration::from_secs(5), read.next())
            .await
            .context("timed out waiting for a WebSocket push")?
            .context("WebSocket closed unexpectedly")??;
        match msg {
            Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
            // Keep-alive traffic is fair game on this connection.
            Message::Ping(_) | Message::Pong(_) => continue,
            other => bail!("unexpected WebSocket frame: {:?}", other),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let base = args.base_url.trim_end_matches('/').to_string();
    let crud = format!("{}/processed_agent_data/", base);
    let client = reqwest::Client::new();

    // --- Health ---
    let health = client.get(format!("{}/health", base)).send().await?;
    ensure!(health.status().is_success(), "health check failed: {}", health.status());
    println!("[PASS] /health");

    // --- Subscribe before writing ---
    let (socket, _) = connect_async(ws_url(&base, args.agent_id)?).await?;
    let (_write, mut read) = socket.split();
    let (other_socket, _) = connect_async(ws_url(&base, args.agent_id + 1)?).await?;
    let (_other_write, mut other_read) = other_socket.split();
    println!("[PASS] WebSocket connections for agents {} and {}", args.agent_id, args.agent_id + 1);

    // --- Batch create with fan-out ---
    let batch = vec![
        sample(args.agent_id, "dry", "2024-01-01T12:00:00"),
        sample(args.agent_id, "wet", "2024-01-01T12:00:01"),
    ];
    let resp = client.post(&crud).json(&batch).send().await?;
    ensure!(resp.status().is_success(), "batch create failed: {}", resp.status());
    let stored: Vec<ProcessedRecord> = resp.json().await?;
    ensure!(stored.len() == 2, "expected 2 stored records, got {}", stored.len());

    let first = next_record(&mut read).await?;
    let second = next_record(&mut read).await?;
    ensure!(first.id == stored[0].id && second.id == stored[1].id,
        "fan-out order mismatch: got [{}, {}], stored [{}, {}]",
        first.id, second.id, stored[0].id, stored[1].id);
    println!("[PASS] batch create broadcast both records in write order");

    ensure!(
        timeout(Duration::from_secs(1), other_read.next()).await.is_err(),
        "agent {} listener received a record for agent {}", args.agent_id + 1, args.agent_id
    );
    println!("[PASS] no cross-agent delivery");

    // --- Read back ---
    let fetched: ProcessedRecord = client
        .get(format!("{}{}", crud, stored[0].id))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    ensure!(fetched == stored[0], "stored and fetched records differ");
    println!("[PASS] create-then-read round trip");

    // --- Update ---
    let updated: ProcessedRecord = client
        .put(format!("{}{}", crud, stored[0].id))
        .json(&sample(args.agent_id, "icy", "2024-01-01T13:00:00"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    ensure!(updated.id == stored[0].id && updated.road_state == "icy", "update did not apply");
    println!("[PASS] update replaces fields in place");

    // --- Delete and not-found contract ---
    let removed: ProcessedRecord = client
        .delete(format!("{}{}", crud, stored[0].id))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    ensure!(removed.id == stored[0].id, "delete returned the wrong record");

    let gone = client.get(format!("{}{}", crud, stored[0].id)).send().await?;
    ensure!(gone.status() == reqwest::StatusCode::NOT_FOUND, "deleted record still readable");
    let missing_update = client
        .put(format!("{}{}", crud, stored[0].id))
        .json(&sample(args.agent_id, "dry", "2024-01-01T13:00:00"))
        .send()
        .await?;
    ensure!(missing_update.status() == reqwest::StatusCode::NOT_FOUND, "update of a deleted id succeeded");
    println!("[PASS] delete and not-found contract");

    // --- Timestamp validation ---
    let rejected = client
        .post(&crud)
        .json(&vec![sample(args.agent_id, "dry", "not-a-date")])
        .send()
        .await?;
    ensure!(
        rejected.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY,
        "malformed timestamp was not rejected: {}", rejected.status()
    );
    ensure!(
        timeout(Duration::from_secs(1), read.next()).await.is_err(),
        "rejected item was broadcast anyway"
    );
    println!("[PASS] timestamp validation with no side effects");

    println!("All live checks passed.");
    Ok(())
}
