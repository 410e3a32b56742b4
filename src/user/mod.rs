/// Principals: chat identities mapped 1:1 to local users, created on first contact

mod model;
mod service;

pub use model::{ExternalIdentity, Role, User};
pub use service::UserService;
