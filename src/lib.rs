//! # DeepDive
//!
//! A local-first iterative research engine over a private document corpus.
//!
//! DeepDive indexes document chunks with a from-scratch TF-IDF vector index,
//! answers questions through a two-round retrieval pipeline against a
//! text-generation service, and produces a final answer with stable
//! `[Source N]` citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Ingest   │──▶│ IndexManager │◀──│    SQLite      │
//! │ txt / md  │   │ CoW snapshot │   │ docs+sessions │
//! └───────────┘   └──────┬───────┘   └───────▲───────┘
//!                        │                   │
//!                 ┌──────▼───────┐   ┌───────┴───────┐
//!                 │  Retrieval   │──▶│   Research    │──▶ GenerationClient
//!                 │ TF-IDF cosine│   │ 5-step pipeline│
//!                 └──────────────┘   └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`tokenize`] | Text normalization into index terms |
//! | [`index`] | Versioned TF-IDF vocabulary index |
//! | [`retrieve`] | Cosine-similarity top-K retrieval |
//! | [`citations`] | Stable source numbering and `[Source N]` markers |
//! | [`generation`] | Text-generation provider abstraction |
//! | [`research`] | The 5-step research pipeline |
//! | [`store`] | Document and session persistence |
//! | [`engine`] | Caller-facing facade |

pub mod citations;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod research;
pub mod retrieve;
pub mod store;
pub mod tokenize;
