// Secure Remit - Dev Backend
// Local stand-in for the remote API: PIN, transfers and exchange rates

use anyhow::{Context, Result};
use secure_remit::dev_backend::{default_state, router};
use tracing_subscriber::EnvFilter;

const ADDR_ENV: &str = "REMIT_DEV_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:8787";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("REMIT_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("🧪 Secure Remit - Dev Backend");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let addr = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Dev backend running on http://{}", addr);
    println!("   PIN:   /api/pin/status, /api/pin/setup, /api/pin/verify, /api/pin/change");
    println!("   Money: /api/transactions/send, /api/transactions/withdraw");
    println!("   Rates: /api/rates/:currency");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(default_state()))
        .await
        .context("Dev backend stopped")?;

    Ok(())
}
