/// Invite codes
///
/// A code grants a user with no quota a quota of one, at most once per user.

mod model;
mod service;

pub use model::{
    InviteCode, InviteCodeStatus, InviteCodeUsage, InviteCodeWithUsage, UNLIMITED_USES,
};
pub use service::{generate_code, InviteCodeService, CODE_ALPHABET, CODE_LENGTH};
