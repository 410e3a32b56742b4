/// SQLite-backed store implementations
mod account;
mod invite;
mod user;

pub use account::SqliteAccountStore;
pub use invite::SqliteInviteCodeStore;
pub use user::SqliteUserStore;
