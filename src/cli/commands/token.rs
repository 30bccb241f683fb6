use anyhow::Context;
use chrono::Duration;
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{Principal, TokenService};
use crate::cli::{utils, OutputFormat};
use crate::config;
use crate::types::Role;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Decode and verify a bearer token with the configured secret")]
    Verify {
        #[arg(help = "Bearer token")]
        token: String,
    },

    #[command(about = "Mint a bearer token with the configured secret")]
    Issue {
        #[arg(long, help = "User id")]
        id: Uuid,
        #[arg(long, help = "User email")]
        email: String,
        #[arg(long, help = "superadmin, admin or user")]
        role: Role,
        #[arg(long, help = "School id")]
        school: Option<Uuid>,
        #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
        hours: Option<i64>,
    },
}

fn token_service() -> anyhow::Result<TokenService> {
    let security = &config::config().security;
    let service = TokenService::new(&security.jwt_secret, security.token_ttl()?)?;
    Ok(service)
}

/// Explicit `--hours`, or the configured default
fn lifetime(hours: Option<i64>, default: Duration) -> anyhow::Result<Duration> {
    match hours {
        Some(hours) => Duration::try_hours(hours)
            .with_context(|| format!("--hours {} is out of range", hours)),
        None => Ok(default),
    }
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let tokens = token_service()?;

    match cmd {
        TokenCommands::Verify { token } => match tokens.verify(token.trim()) {
            Some(claims) => {
                utils::output_success(&output_format, "Token is valid", Some(json!(claims)))
            }
            None => {
                let message = "Token is invalid or expired";
                utils::output_error(&output_format, message, Some("INVALID_TOKEN"))?;
                anyhow::bail!("token rejected");
            }
        },
        TokenCommands::Issue {
            id,
            email,
            role,
            school,
            hours,
        } => {
            if role.requires_school() && school.is_none() {
                anyhow::bail!("--school is required for role {}", role);
            }
            let principal = Principal { id, email, role, school };
            let ttl = lifetime(hours, tokens.default_ttl())?;
            let token = tokens.issue_with_expiry(&principal, ttl)?;

            utils::output_success(
                &output_format,
                "Token issued",
                Some(json!({ "accessToken": token, "expiresInSeconds": ttl.num_seconds() })),
            )
        }
    }
}
