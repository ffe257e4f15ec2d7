//! Implementation of the `questline checkin` command.

use anyhow::Result;
use uuid::Uuid;

use super::{unlocked, unlocked_lines, CliContext, UnlockedBadge};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Debug, serde::Serialize)]
pub struct CheckInOutput {
    pub user_id: Uuid,
    pub consecutive_days: u32,
    pub milestone_bonus: Option<u32>,
    pub already_checked_in: bool,
    pub unlocked_badges: Vec<UnlockedBadge>,
}

impl CommandOutput for CheckInOutput {
    fn to_human(&self) -> String {
        if self.already_checked_in {
            return format!("Already checked in today ({} day streak).", self.consecutive_days);
        }
        let mut lines = vec![format!("Checked in. Streak: {} day(s).", self.consecutive_days)];
        if let Some(bonus) = self.milestone_bonus {
            lines.push(format!("Streak milestone reached: +{bonus} XP"));
        }
        lines.extend(unlocked_lines(&self.unlocked_badges));
        lines.join("\n")
    }
}

pub async fn execute(user_id: Uuid, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open(config).await?;
    let outcome = ctx.engine.check_in(user_id).await?;

    output(
        &CheckInOutput {
            user_id,
            consecutive_days: outcome.result.consecutive_days,
            milestone_bonus: outcome.result.milestone_bonus,
            already_checked_in: outcome.result.already_checked_in,
            unlocked_badges: unlocked(&outcome.unlocked_badges),
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_output() {
        let out = CheckInOutput {
            user_id: Uuid::nil(),
            consecutive_days: 7,
            milestone_bonus: Some(70),
            already_checked_in: false,
            unlocked_badges: vec![UnlockedBadge { badge_id: Uuid::nil() }],
        };
        let text = out.to_human();
        assert!(text.contains("Streak: 7 day(s)"));
        assert!(text.contains("+70 XP"));
        assert!(text.contains("Badge unlocked"));

        let repeat = CheckInOutput {
            already_checked_in: true,
            milestone_bonus: None,
            unlocked_badges: vec![],
            ..out
        };
        assert_eq!(repeat.to_human(), "Already checked in today (7 day streak).");
    }
}
