//! parley-server: a chat relay that streams replies from a hosted
//! chat-completion API to the browser and keeps the conversation history in
//! SQLite.

pub mod chat;
pub mod completion;
pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod schemas;
pub mod state;
