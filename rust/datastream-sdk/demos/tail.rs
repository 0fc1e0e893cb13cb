//! Prints the last few datapoints of a stream, then follows it live.
//!
//! ```text
//! DATASTREAM_URL=http://localhost:8000/api/v1 \
//! DATASTREAM_PUSH_URL=ws://localhost:8000/api/v1/websocket \
//! DATASTREAM_API_KEY=... \
//! cargo run --example tail -- alice/phone/steps
//! ```

use chrono::{TimeZone, Utc};
use datastream_sdk::prelude::*;
use tracing_subscriber::EnvFilter;

fn format_time(t: Option<f64>) -> String {
    t.and_then(|t| Utc.timestamp_millis_opt((t * 1000.0) as i64).single())
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "-".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let name = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: tail <user/device/stream>"))?;

    let client = DataStreamClient::connect(ClientConfig::from_env()?).await?;
    let stream = client.open_stream(&name).await?;

    println!(
        "{} ({} datapoints, schema {})",
        stream.nickname().filter(|n| !n.is_empty()).unwrap_or(name.as_str()),
        stream.length().await?,
        stream.schema()?
    );

    for dp in stream.slice_to_end(-5).await? {
        println!("{}  {}", format_time(dp.t), dp.d);
    }

    let mut updates = stream.watch(false).await?;
    while let Some(update) = updates.next().await {
        for dp in update.data {
            println!("{}  {}", format_time(dp.t), dp.d);
        }
    }

    Ok(())
}
