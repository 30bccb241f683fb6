use clap::Subcommand;
use serde_json::Value;

use crate::cli::{utils, OutputFormat};
use crate::config;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health status from the /health endpoint")]
    Health {
        #[arg(long, help = "Server base URL (defaults to the configured local port)")]
        url: Option<String>,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Health { url } => {
            let base = url
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", config::config().server.port));
            let endpoint = format!("{}/health", base.trim_end_matches('/'));

            let client = reqwest::Client::new();
            let response = client
                .get(&endpoint)
                .timeout(std::time::Duration::from_secs(5))
                .send()
                .await?;
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);

            if status.is_success() {
                utils::output_success(&output_format, &format!("{} is healthy", base), Some(body))
            } else {
                let message = format!("{} returned {}", base, status);
                utils::output_error(&output_format, &message, Some("UNHEALTHY"))?;
                anyhow::bail!("server unhealthy");
            }
        }
    }
}
