use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Scope;
use crate::cli::{utils, OutputFormat};
use crate::config;
use crate::database::{DatabaseManager, PgStore, Store};
use crate::services::{Accounts, NewAdmin};

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "Create an administrator directly in the database")]
    Create {
        #[arg(long, help = "Display name")]
        name: String,
        #[arg(long, help = "Login email")]
        email: String,
        #[arg(long, help = "Initial password")]
        password: String,
        #[arg(long, default_value = "admin", help = "admin or superadmin")]
        role: String,
        #[arg(long, help = "School id (required for admin)")]
        school: Option<Uuid>,
    },
}

pub async fn handle(cmd: AdminCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Create {
            name,
            email,
            password,
            role,
            school,
        } => {
            let config = config::config();
            let mut database = config.database.clone();
            database.run_migrations = true;

            let pool = DatabaseManager::connect(&database).await?;
            let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
            let accounts = Accounts::new(store.clone(), config.security.password_min_length);

            let request = NewAdmin {
                name,
                email,
                password,
                role,
                school,
            };
            let result = accounts.provision_admin(Scope::All, request).await;
            store.close().await;
            let user = result?;

            utils::output_success(
                &output_format,
                &format!("Created {} {}", user.role, user.email),
                Some(json!({
                    "id": user.id,
                    "email": user.email,
                    "role": user.role,
                    "school": user.school_id,
                })),
            )
        }
    }
}
