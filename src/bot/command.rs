/// Command table
///
/// Every chat command maps to one variant; dispatch is a `match` in
/// `Bot::dispatch`, so adding a command is a compile-checked change.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Help,
    MyAccounts,
    Create,
    Info,
    Renew,
    ChangePassword,
    Quota,
    Redeem,
    Cancel,
    SyncStatus,
    Admin,
    Grant,
    Users,
    Accounts,
    DeleteAccount,
    Suspend,
    Activate,
    SetRole,
    BlockUser,
    UnblockUser,
    DeleteUser,
    Stats,
    PlayingStats,
    UpdatePolicies,
    CheckEmby,
    SyncAccount,
    EmbyUsers,
    SetDeviceLimit,
    GenerateCode,
    ListCodes,
    CodeInfo,
    RevokeCode,
}

impl Command {
    pub const ALL: [Command; 33] = [
        Command::Start,
        Command::Help,
        Command::MyAccounts,
        Command::Create,
        Command::Info,
        Command::Renew,
        Command::ChangePassword,
        Command::Quota,
        Command::Redeem,
        Command::Cancel,
        Command::SyncStatus,
        Command::Admin,
        Command::Grant,
        Command::Users,
        Command::Accounts,
        Command::DeleteAccount,
        Command::Suspend,
        Command::Activate,
        Command::SetRole,
        Command::BlockUser,
        Command::UnblockUser,
        Command::DeleteUser,
        Command::Stats,
        Command::PlayingStats,
        Command::UpdatePolicies,
        Command::CheckEmby,
        Command::SyncAccount,
        Command::EmbyUsers,
        Command::SetDeviceLimit,
        Command::GenerateCode,
        Command::ListCodes,
        Command::CodeInfo,
        Command::RevokeCode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::MyAccounts => "myaccounts",
            Command::Create => "create",
            Command::Info => "info",
            Command::Renew => "renew",
            Command::ChangePassword => "changepassword",
            Command::Quota => "quota",
            Command::Redeem => "redeem",
            Command::Cancel => "cancel",
            Command::SyncStatus => "syncstatus",
            Command::Admin => "admin",
            Command::Grant => "grant",
            Command::Users => "users",
            Command::Accounts => "accounts",
            Command::DeleteAccount => "deleteaccount",
            Command::Suspend => "suspend",
            Command::Activate => "activate",
            Command::SetRole => "setrole",
            Command::BlockUser => "blockuser",
            Command::UnblockUser => "unblockuser",
            Command::DeleteUser => "deleteuser",
            Command::Stats => "stats",
            Command::PlayingStats => "playingstats",
            Command::UpdatePolicies => "updatepolicies",
            Command::CheckEmby => "checkemby",
            Command::SyncAccount => "syncaccount",
            Command::EmbyUsers => "embyusers",
            Command::SetDeviceLimit => "setdevicelimit",
            Command::GenerateCode => "generatecode",
            Command::ListCodes => "listcodes",
            Command::CodeInfo => "codeinfo",
            Command::RevokeCode => "revokecode",
        }
    }

    /// Case-insensitive lookup by name, without the leading slash
    pub fn parse(name: &str) -> Option<Command> {
        let name = name.trim().trim_start_matches('/').to_ascii_lowercase();
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    pub fn admin_only(&self) -> bool {
        matches!(
            self,
            Command::Admin
                | Command::Grant
                | Command::Users
                | Command::Accounts
                | Command::DeleteAccount
                | Command::Suspend
                | Command::Activate
                | Command::SetRole
                | Command::BlockUser
                | Command::UnblockUser
                | Command::DeleteUser
                | Command::Stats
                | Command::PlayingStats
                | Command::UpdatePolicies
                | Command::CheckEmby
                | Command::SyncAccount
                | Command::EmbyUsers
                | Command::SetDeviceLimit
                | Command::GenerateCode
                | Command::ListCodes
                | Command::CodeInfo
                | Command::RevokeCode
        )
    }

    /// Commands that never reveal credentials and may run in group chats
    pub fn allowed_in_group(&self) -> bool {
        matches!(
            self,
            Command::Start
                | Command::Help
                | Command::Grant
                | Command::Stats
                | Command::PlayingStats
                | Command::CheckEmby
                | Command::GenerateCode
                | Command::ListCodes
        )
    }
}

/// Split `/name@bot arg1 arg2` into the command name and its arguments.
///
/// Returns `None` for text that is not a command.
pub fn parse_command_text(text: &str) -> Option<(String, Vec<String>)> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }

    Some((
        name.to_ascii_lowercase(),
        parts.map(str::to_string).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_round_trips() {
        for cmd in Command::ALL {
            assert_eq!(Command::parse(cmd.name()), Some(cmd));
        }
        assert_eq!(Command::parse("/CREATE"), Some(Command::Create));
        assert_eq!(Command::parse("nope"), None);
    }

    #[test]
    fn test_group_whitelist_hides_credentials() {
        assert!(Command::Grant.allowed_in_group());
        assert!(!Command::Create.allowed_in_group());
        assert!(!Command::ChangePassword.allowed_in_group());
        assert!(!Command::Redeem.allowed_in_group());
    }

    #[test]
    fn test_admin_only_split() {
        assert!(Command::DeleteUser.admin_only());
        assert!(Command::SetDeviceLimit.admin_only());
        assert!(!Command::Renew.admin_only());
        assert!(!Command::SyncStatus.admin_only());
    }

    #[test]
    fn test_parse_command_text() {
        assert_eq!(
            parse_command_text("/create@EmbyBot alice"),
            Some(("create".to_string(), vec!["alice".to_string()]))
        );
        assert_eq!(
            parse_command_text("  /Renew alice   30 "),
            Some((
                "renew".to_string(),
                vec!["alice".to_string(), "30".to_string()]
            ))
        );
        assert_eq!(parse_command_text("hello"), None);
        assert_eq!(parse_command_text("/"), None);
    }
}
