//! `recall` — a retrieval-augmented memory store.
//!
//! Grounds a conversational assistant's answers in a static knowledge
//! corpus plus an append-only, per-user conversational memory, backed by a
//! persistent similarity index. See [`memory::MemoryManager`] for the main
//! entry point.

pub mod cli;
pub mod config;
pub mod logging;
pub mod memory;
