//! # Summer
//!
//! Extract the readable content of a web page and summarize it through one
//! of several interchangeable LLM providers, keeping a short local history.
//!
//! The language models themselves live behind an opaque backend service
//! (`GET /providers`, `POST /summarize`). This crate is the client side:
//! extraction, provider configuration, the request lifecycle, and history.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌──────────────┐   ┌─────────┐
//! │ PageSource │──▶│ Extractor │──▶│ Orchestrator │──▶│ Backend │
//! │ URL / file │   └───────────┘   └──────┬───────┘   └─────────┘
//! └────────────┘                          │  ▲
//!                        ┌────────────────┘  │ capabilities
//!                        ▼                   │
//!                  ┌──────────┐        ┌───────────┐
//!                  │ History  │        │ Providers │
//!                  │ (SQLite) │        │ resolver  │
//!                  └──────────┘        └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! summer init
//! summer providers
//! summer summarize https://example.com/post --provider ollama --model llama3.2
//! summer history list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`page`] | Page sources (URL, file, in-memory) |
//! | [`extract`] | Main-content text extraction |
//! | [`providers`] | Capability cache and request resolution |
//! | [`backend`] | Summarization backend client |
//! | [`orchestrator`] | Summarization workflow and error taxonomy |
//! | [`progress`] | Progress reporting |
//! | [`history`] | Summary history and model suggestions |
//! | [`store`] | Key-value storage backends |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod backend;
pub mod config;
pub mod db;
pub mod extract;
pub mod history;
pub mod migrate;
pub mod models;
pub mod orchestrator;
pub mod page;
pub mod progress;
pub mod providers;
pub mod store;
