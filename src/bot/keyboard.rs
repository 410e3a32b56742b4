/// Inline buttons and their `action:arg` callback tokens
use crate::account::AccountStatus;
use serde::{Deserialize, Serialize};

pub const MAIN_MENU: &str = "menu:main";
pub const HELP: &str = "menu:help";
pub const MY_ACCOUNTS: &str = "accounts:list";
pub const CREATE_START: &str = "create:start";
pub const REDEEM_START: &str = "redeem:start";
pub const ADMIN_MENU: &str = "admin:menu";
pub const ADMIN_STATS: &str = "admin:stats";
pub const CANCEL: &str = "cancel";

/// Renewal presets offered on the renew screen
pub const RENEW_PRESETS: [i64; 4] = [7, 30, 90, 365];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    /// Callback token sent back on click
    pub data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

pub type Keyboard = Vec<Vec<Button>>;

pub fn account_info(id: i64) -> String {
    format!("account:info:{}", id)
}

pub fn account_renew(id: i64) -> String {
    format!("account:renew:{}", id)
}

pub fn account_days(id: i64) -> String {
    format!("account:days:{}", id)
}

pub fn account_password(id: i64) -> String {
    format!("account:pwd:{}", id)
}

pub fn account_delete(id: i64) -> String {
    format!("account:del:{}", id)
}

pub fn admin_suspend(id: i64) -> String {
    format!("admin:suspend:{}", id)
}

pub fn admin_activate(id: i64) -> String {
    format!("admin:activate:{}", id)
}

pub fn confirm_renew(id: i64, days: i64) -> String {
    format!("confirm:renew:{}:{}", id, days)
}

pub fn confirm_delete(id: i64) -> String {
    format!("confirm:delete:{}", id)
}

pub fn main_menu(is_admin: bool) -> Keyboard {
    let mut rows = vec![
        vec![Button::new("📋 My accounts", MY_ACCOUNTS)],
        vec![Button::new("➕ Create account", CREATE_START)],
        vec![Button::new("🎟️ Redeem invite code", REDEEM_START)],
        vec![Button::new("❓ Help", HELP)],
    ];
    if is_admin {
        rows.push(vec![Button::new("🔑 Admin menu", ADMIN_MENU)]);
    }
    rows
}

pub fn admin_menu() -> Keyboard {
    vec![
        vec![Button::new("📊 Statistics", ADMIN_STATS)],
        vec![Button::new("⬅️ Main menu", MAIN_MENU)],
    ]
}

pub fn back_to(data: &str) -> Keyboard {
    vec![vec![Button::new("⬅️ Back", data)]]
}

pub fn cancel_only() -> Keyboard {
    vec![vec![Button::new("❌ Cancel", CANCEL)]]
}

/// Actions on one account; admins also get status toggles and delete
pub fn account_actions(id: i64, status: AccountStatus, is_admin: bool) -> Keyboard {
    let mut rows = vec![vec![
        Button::new("🔄 Renew", account_renew(id)),
        Button::new("🔑 Password", account_password(id)),
    ]];

    if is_admin {
        match status {
            AccountStatus::Active => {
                rows.push(vec![Button::new("⏸️ Suspend", admin_suspend(id))]);
            }
            AccountStatus::Suspended => {
                rows.push(vec![Button::new("✅ Activate", admin_activate(id))]);
            }
            AccountStatus::Expired => {}
        }
        rows.push(vec![Button::new("❌ Delete", account_delete(id))]);
    }

    rows.push(vec![Button::new("⬅️ Back to list", MY_ACCOUNTS)]);
    rows
}

pub fn renew_options(id: i64) -> Keyboard {
    let presets = RENEW_PRESETS
        .iter()
        .map(|days| Button::new(format!("{} days", days), confirm_renew(id, *days)))
        .collect::<Vec<_>>();

    vec![
        presets[..2].to_vec(),
        presets[2..].to_vec(),
        vec![Button::new("✏️ Custom", account_days(id))],
        vec![Button::new("⬅️ Cancel", account_info(id))],
    ]
}

pub fn confirm(confirm_data: String, cancel_data: &str) -> Keyboard {
    vec![vec![
        Button::new("✅ Confirm", confirm_data),
        Button::new("❌ Cancel", cancel_data),
    ]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_sees_extra_rows() {
        let user_rows = account_actions(5, AccountStatus::Active, false);
        let admin_rows = account_actions(5, AccountStatus::Active, true);

        assert_eq!(user_rows.len(), 2);
        assert_eq!(admin_rows.len(), 4);
        assert_eq!(admin_rows[1][0].data, "admin:suspend:5");
        assert_eq!(admin_rows[2][0].data, "account:del:5");
    }

    #[test]
    fn test_renew_options_cover_presets() {
        let rows = renew_options(9);
        let tokens: Vec<&str> = rows
            .iter()
            .flatten()
            .map(|b| b.data.as_str())
            .collect();

        assert!(tokens.contains(&"confirm:renew:9:7"));
        assert!(tokens.contains(&"confirm:renew:9:365"));
        assert!(tokens.contains(&"account:days:9"));
    }
}
