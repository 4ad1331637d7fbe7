//! cram - personal interview preparation tracker.
//!
//! Tracks study materials and topics in SQLite, generates AI study
//! guidance with a two-tier cache, ingests cloud-folder documents and
//! compiles study guides and flashcard decks from them.

pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod flashcards;
pub mod guidance;
pub mod guide;
pub mod llm;
pub mod plan;
pub mod remote;
pub mod topics;

pub use error::{Error, Result};
