//! Type prompts line by line and watch the session settle.
//!
//! Run a gateway first (`cargo run`), then:
//! `cargo run --example live_prompt -- http://127.0.0.1:3000`
//!
//! Lines starting with `:` are commands: `:iter on|off`, `:key <key>`,
//! `:show <index>`, `:save <dir>`, `:quit`.

use futures::StreamExt;
use neuropaint::{logger, Coalescer, CoalescerSettings, GatewayClient, Phase};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    logger::init()?;

    if dotenv_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found");
    }

    let base_url = env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:3000".to_string());
    let client = GatewayClient::new(&base_url);
    log::info!("🌐 Using gateway at {}", client.endpoint());

    let mut coalescer = Coalescer::spawn(Arc::new(client), CoalescerSettings::default());

    let mut updates = coalescer.snapshots();
    tokio::spawn(async move {
        while let Some(snapshot) = updates.next().await {
            match &snapshot.phase {
                Phase::Fetching(key) => log::info!("⏳ Generating {:?}", key),
                Phase::Displaying(image) => log::info!(
                    "🖼️  Showing #{:?} ({} history entries, {:.2}s inference)",
                    snapshot.active_index,
                    snapshot.history.len(),
                    image.timings.inference
                ),
                _ => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let mut parts = line.splitn(2, ' ');
                match (parts.next(), parts.next()) {
                    (Some(":quit"), _) => break,
                    (Some(":iter"), Some(flag)) => coalescer.set_iterative_mode(flag == "on")?,
                    (Some(":key"), key) => coalescer.set_api_key(key.map(String::from))?,
                    (Some(":show"), Some(index)) => {
                        if let Err(e) = coalescer.select(index.trim().parse()?).await {
                            log::warn!("⚠️  {}", e);
                        }
                    }
                    (Some(":save"), dir) => match coalescer.snapshot().displayed() {
                        Some(record) => {
                            let path = record.save_png(dir.unwrap_or("."))?;
                            log::info!("💾 Image saved to: {}", path.display());
                        }
                        None => log::warn!("⚠️  Nothing to save yet"),
                    },
                    _ => coalescer.set_prompt(line.clone())?,
                }
            }
            Some(notice) = coalescer.next_notification() => {
                log::error!("❌ {}", notice.message);
            }
        }
    }

    let last = coalescer.shutdown().await;
    log::info!("🎉 Session closed with {} entries", last.history.len());
    Ok(())
}
