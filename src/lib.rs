//! # Context QA
//!
//! Chat with a document. A loaded document is split into fixed-size word
//! segments; for every question the segment with the highest TF-IDF cosine
//! similarity is placed in a prompt together with the conversation so far,
//! and the prompt is sent to a generation service.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌──────────┐   ┌────────────┐
//! │  Extract  │──▶│  Segment  │──▶│   Rank   │──▶│   Prompt   │
//! │ pdf/ooxml │   │  N words  │   │  TF-IDF  │   │ + history  │
//! └───────────┘   └───────────┘   └──────────┘   └─────┬──────┘
//!                                                      ▼
//!                      ┌──────────┐              ┌────────────┐
//!                      │ CLI/HTTP │◀─────────────│ Generation │
//!                      │ (cqa)    │    reply     │  (Cohere)  │
//!                      └──────────┘              └────────────┘
//! ```
//!
//! Segmentation, ranking and prompt assembly are pure and live in the
//! `context-qa-core` crate. This crate adds I/O: extraction, the
//! generation client, sessions, the CLI and the HTTP server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF / text / OOXML text extraction |
//! | [`generation`] | Generation-service trait and Cohere client |
//! | [`session`] | Per-conversation document and transcript state |
//! | [`commands`] | CLI subcommand implementations |
//! | [`progress`] | Progress reporting on stderr |
//! | [`server`] | HTTP chat server |

pub mod commands;
pub mod config;
pub mod extract;
pub mod generation;
pub mod progress;
pub mod server;
pub mod session;

pub use context_qa_core::{error, models, prompt, rank, segment};
