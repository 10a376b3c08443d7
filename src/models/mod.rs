pub mod chat;
pub mod transaction;
