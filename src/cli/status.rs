//! Status command implementation

use clap::Args;
use serde_json::Value;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Base URL of a running server
    #[arg(short, long, default_value = "http://127.0.0.1:5000")]
    pub url: String,
}

impl StatusArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let url = format!("{}/api/bot/status", self.url.trim_end_matches('/'));
        let status: Value = reqwest::get(&url).await?.error_for_status()?.json().await?;

        println!("scalp-hub status ({})", self.url);
        println!("  State:          {}", status["state"].as_str().unwrap_or("unknown"));
        println!("  Connected:      {}", status["connected"]);
        println!("  Current price:  {}", status["currentPrice"]);
        println!("  Open positions: {}", status["openPositions"]);
        println!("  Daily PnL:      {}", status["cumulativePnl"]);
        Ok(())
    }
}
