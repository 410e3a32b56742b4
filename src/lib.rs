/// Emby account bot
///
/// A chat-bot front-end that lets authorized users provision accounts on an
/// Emby media server. Accounts, users and invite codes live in SQLite; every
/// account mutation is mirrored to the server on a best-effort basis.

pub mod account;
pub mod bot;
pub mod config;
pub mod context;
pub mod conversation;
pub mod crypto;
pub mod db;
pub mod error;
pub mod invite;
pub mod jobs;
pub mod remote;
pub mod store;
pub mod telegram;
pub mod timeutil;
pub mod user;
pub mod validation;
