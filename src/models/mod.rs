//! Database models and DTOs for all domain entities.

pub mod chat;
pub mod document;
pub mod task;
