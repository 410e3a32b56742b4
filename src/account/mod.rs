/// Media-server account lifecycle
///
/// `AccountService` is the only writer of account rows. Local state is
/// authoritative; the remote mirror is updated best-effort after each local
/// write and the outcome is recorded in the account's sync fields.

mod model;
mod service;

pub use model::{Account, AccountStatus, AccountWithOwner, SyncStatus};
pub use service::{AccountService, SyncOptions, SyncOutcome};
