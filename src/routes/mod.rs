//! Route definitions for the agentchat API.

pub mod chat;
pub mod documents;
pub mod health;
pub mod projects;
pub mod tasks;
