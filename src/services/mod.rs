//! Business logic services.

pub mod assessment;
pub mod chunker;
pub mod extraction;
pub mod llm;
pub mod metadata;
pub mod processing;
pub mod questions;
pub mod queue;
pub mod rag;
pub mod vector_index;
