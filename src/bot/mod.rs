/// Chat presentation layer
///
/// Turns inbound commands, free text and button clicks into calls on the
/// domain services and renders HTML replies. It knows nothing about the
/// transport: the Telegram loop hands it plain values and sends back what
/// it returns.
///
/// Every event first resolves the sender to a local user (created on first
/// contact) and rejects blocked users before anything else runs.

mod callback;
mod command;
mod format;
mod handlers;
mod input;
pub mod keyboard;

pub use callback::CallbackResponse;
pub use command::{parse_command_text, Command};
pub use keyboard::{Button, Keyboard};

use crate::{
    account::Account,
    context::AppContext,
    error::{BotError, BotResult},
    user::{ExternalIdentity, User},
};
use tracing::{debug, error, info};

/// Inbound chat message
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub from: ExternalIdentity,
    pub is_group: bool,
    pub text: String,
    /// Sender of the message this one replies to, if any
    pub reply_to: Option<ExternalIdentity>,
}

/// Rendered reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub text: String,
    pub buttons: Keyboard,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: Keyboard) -> Self {
        self.buttons = buttons;
        self
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::text(text)
    }
}

/// One command after the sender has been resolved
pub struct Invocation {
    pub user: User,
    pub is_admin: bool,
    pub is_group: bool,
    pub args: Vec<String>,
    pub reply_to: Option<ExternalIdentity>,
}

impl Invocation {
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Argument or a validation error naming it
    pub fn require(&self, index: usize, name: &str, usage: &str) -> BotResult<&str> {
        self.arg(index)
            .ok_or_else(|| BotError::validation(name, format!("missing, usage: {}", usage)))
    }
}

#[derive(Clone)]
pub struct Bot {
    ctx: AppContext,
}

impl Bot {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Resolve the sender, rejecting blocked users
    async fn resolve(&self, identity: &ExternalIdentity) -> Result<User, String> {
        let user = match self.ctx.users.get_or_create(identity).await {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to resolve user {}: {}", identity.telegram_id, e);
                return Err("System error, please try again later".to_string());
            }
        };

        if !user.can_access() {
            return Err("🚫 You have been blocked and cannot use this bot".to_string());
        }
        Ok(user)
    }

    /// Route a chat message: commands first, then pending conversation input
    pub async fn handle_message(&self, msg: &IncomingMessage) -> Reply {
        let user = match self.resolve(&msg.from).await {
            Ok(user) => user,
            Err(text) => return Reply::text(text),
        };

        if let Some((name, args)) = parse_command_text(&msg.text) {
            return self
                .run_command(user, msg.is_group, &name, args, msg.reply_to.clone())
                .await;
        }

        let state = self.ctx.conversations.get_state(user.telegram_id).await;
        if !state.is_idle() && !msg.is_group {
            return input::handle(self, &user, state, &msg.text).await;
        }

        if msg.is_group {
            Reply::text("Please use commands, see /help")
        } else {
            Reply::text("Use the buttons below or /start to open the main menu")
        }
    }

    /// Run one command on behalf of `identity`
    pub async fn handle_command(
        &self,
        identity: &ExternalIdentity,
        is_group: bool,
        name: &str,
        args: Vec<String>,
    ) -> Reply {
        match self.resolve(identity).await {
            Ok(user) => self.run_command(user, is_group, name, args, None).await,
            Err(text) => Reply::text(text),
        }
    }

    /// Handle a button click carrying an `action:arg` token
    pub async fn handle_callback(&self, identity: &ExternalIdentity, data: &str) -> CallbackResponse {
        let user = match self.resolve(identity).await {
            Ok(user) => user,
            Err(text) => return CallbackResponse::alert(text),
        };

        debug!("Callback {} from {}", data, user.telegram_id);
        match callback::handle(self, &user, data).await {
            Ok(response) => response,
            Err(e) => {
                log_failure(data, &e);
                CallbackResponse::alert(e.user_message())
            }
        }
    }

    async fn run_command(
        &self,
        user: User,
        is_group: bool,
        name: &str,
        args: Vec<String>,
        reply_to: Option<ExternalIdentity>,
    ) -> Reply {
        let Some(command) = Command::parse(name) else {
            return Reply::text("Unknown command, use /help to see what is available");
        };

        if is_group && !command.allowed_in_group() {
            return Reply::text("❌ This command only works in a private chat with the bot");
        }

        let is_admin = self.ctx.users.is_admin(&user);
        if command.admin_only() && !is_admin {
            return Reply::text("❌ This command requires admin rights");
        }

        info!("{} ran /{}", user.display_name(), command.name());
        let inv = Invocation {
            user,
            is_admin,
            is_group,
            args,
            reply_to,
        };

        match self.dispatch(command, &inv).await {
            Ok(reply) => reply,
            Err(e) => {
                log_failure(command.name(), &e);
                Reply::text(format!("❌ {}", format::escape_html(&e.user_message())))
            }
        }
    }

    async fn dispatch(&self, command: Command, inv: &Invocation) -> BotResult<Reply> {
        use handlers::{admin, invite, media, user};

        match command {
            Command::Start => user::start(self, inv).await,
            Command::Help => user::help(self, inv).await,
            Command::MyAccounts => user::my_accounts(self, inv).await,
            Command::Create => user::create(self, inv).await,
            Command::Info => user::info(self, inv).await,
            Command::Renew => user::renew(self, inv).await,
            Command::ChangePassword => user::change_password(self, inv).await,
            Command::Quota => user::quota(self, inv).await,
            Command::Redeem => invite::redeem(self, inv).await,
            Command::Cancel => user::cancel(self, inv).await,
            Command::SyncStatus => media::sync_status(self, inv).await,
            Command::Admin => admin::menu(self, inv).await,
            Command::Grant => admin::grant(self, inv).await,
            Command::Users => admin::list_users(self, inv).await,
            Command::Accounts => admin::list_accounts(self, inv).await,
            Command::DeleteAccount => admin::delete_account(self, inv).await,
            Command::Suspend => admin::suspend(self, inv).await,
            Command::Activate => admin::activate(self, inv).await,
            Command::SetRole => admin::set_role(self, inv).await,
            Command::BlockUser => admin::block_user(self, inv).await,
            Command::UnblockUser => admin::unblock_user(self, inv).await,
            Command::DeleteUser => admin::delete_user(self, inv).await,
            Command::Stats => admin::stats(self, inv).await,
            Command::PlayingStats => media::playing_stats(self, inv).await,
            Command::UpdatePolicies => media::update_policies(self, inv).await,
            Command::CheckEmby => media::check_server(self, inv).await,
            Command::SyncAccount => media::sync_account(self, inv).await,
            Command::EmbyUsers => media::list_remote_users(self, inv).await,
            Command::SetDeviceLimit => media::set_device_limit(self, inv).await,
            Command::GenerateCode => invite::generate(self, inv).await,
            Command::ListCodes => invite::list(self, inv).await,
            Command::CodeInfo => invite::info(self, inv).await,
            Command::RevokeCode => invite::revoke(self, inv).await,
        }
    }

    /// Account the user may act on: any account for admins, otherwise own ones
    async fn accessible_account(&self, user: &User, account_id: i64) -> BotResult<Account> {
        if self.ctx.users.is_admin(user) {
            self.ctx.accounts.get(account_id).await
        } else {
            self.ctx.accounts.check_ownership(account_id, user.id).await
        }
    }

    async fn accessible_account_by_name(&self, user: &User, username: &str) -> BotResult<Account> {
        let account = self.ctx.accounts.get_by_username(username).await?;
        self.accessible_account(user, account.id).await
    }
}

fn log_failure(what: &str, err: &BotError) {
    if err.is_client_error() {
        debug!("{} rejected: {}", what, err);
    } else {
        error!("{} failed: {}", what, err);
    }
}
