//! User CLI commands.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use uuid::Uuid;

use super::CliContext;
use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, Notification, User};

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a new user
    Create {
        /// Display name
        name: String,
        /// Phone number; non-digits are stripped
        phone: String,
    },
    /// Show a user's level, balance, streak and notifications
    Show {
        /// User ID
        id: Uuid,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct UserOutput {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub level: u32,
    pub experience_points: i64,
    pub coins: i64,
    pub consecutive_days: u32,
    pub last_check_in: Option<NaiveDate>,
}

impl From<&User> for UserOutput {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            phone: user.phone.clone(),
            level: user.level,
            experience_points: user.experience_points,
            coins: user.coins,
            consecutive_days: user.consecutive_days,
            last_check_in: user.last_check_in,
        }
    }
}

impl CommandOutput for UserOutput {
    fn to_human(&self) -> String {
        [
            format!("User: {}", self.name),
            format!("ID: {}", self.id),
            format!("Level: {} ({} XP)", self.level, self.experience_points),
            format!("Coins: {}", self.coins),
            format!(
                "Streak: {} day(s){}",
                self.consecutive_days,
                self.last_check_in
                    .map(|d| format!(", last check-in {d}"))
                    .unwrap_or_default()
            ),
        ]
        .join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct UserDetailOutput {
    pub user: UserOutput,
    pub notifications: Vec<Notification>,
}

impl CommandOutput for UserDetailOutput {
    fn to_human(&self) -> String {
        let mut text = self.user.to_human();
        if self.notifications.is_empty() {
            return text;
        }

        let mut table = list_table(&["kind", "payload", "created"]);
        for n in &self.notifications {
            table.add_row(vec![
                n.kind.as_str().to_string(),
                truncate(&n.payload.to_string(), 60),
                n.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]);
        }
        text.push_str(&format!("\n\nNotifications:\n{table}"));
        text
    }
}

pub async fn execute(args: UserArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open(config).await?;

    match args.command {
        UserCommands::Create { name, phone } => {
            let user = ctx.engine.register_user(&name, &phone).await?;
            output(&UserOutput::from(&user), json_mode);
        }
        UserCommands::Show { id } => {
            let user = ctx.engine.user(id).await?;
            let notifications = ctx.ledger.list_notifications(id).await?;
            output(
                &UserDetailOutput {
                    user: UserOutput::from(&user),
                    notifications,
                },
                json_mode,
            );
        }
    }

    Ok(())
}
