//! # Schema Scout
//!
//! Natural-language questions over any relational database, answered from the
//! database's own schema and a sample of its rows.
//!
//! Schema Scout discovers every table and view behind a connection string,
//! builds a cached per-item analysis (sample metrics, a column listing, a
//! preview, and two model-written descriptions), lets a model route a question
//! to the relevant subset, and answers from that subset. A second mode skips
//! the analyses and has a model write one SQL query that runs against live
//! data.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │ Catalog  │──▶│ Analyzer  │──▶│   Router   │──▶│ Answerer │
//! │ discover │   │ (+ cache) │   │ (selection)│   │          │
//! └────┬─────┘   └───────────┘   └────────────┘   └──────────┘
//!      │               ▲ fan-out: aggregator
//!      │         ┌───────────┐
//!      └────────▶│ SQL agent │  (mode = sql)
//!                └───────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//!     ┌──────────┐           ┌──────────┐
//!     │   CLI    │           │   HTTP   │
//!     │ (scout)  │           │  (axum)  │
//!     └──────────┘           └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scout connect "sqlite://shop.db"
//! scout analyze "sqlite://shop.db" orders
//! scout ask "sqlite://shop.db" "Which product sells best?"
//! scout ask "sqlite://shop.db" "How many orders were placed?" --mode sql
//! scout serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error kinds shared by every stage |
//! | [`models`] | Core data types |
//! | [`dialect`] | Per-engine SQL capabilities |
//! | [`db`] | Connection handles, catalog queries, query execution |
//! | [`cache`] | Persistent analysis cache |
//! | [`llm`] | Completion service abstraction |
//! | [`catalog`] | Table and view discovery |
//! | [`analyzer`] | Per-item analysis |
//! | [`aggregator`] | Bounded concurrent analysis fan-out |
//! | [`router`] | Relevance selection |
//! | [`answerer`] | Final answer synthesis |
//! | [`sql_agent`] | Query generation and execution |
//! | [`session`] | Request-scoped collaborators |
//! | [`orchestrator`] | Mode dispatch |
//! | [`commands`] | CLI command bodies |
//! | [`server`] | HTTP API |

pub mod aggregator;
pub mod analyzer;
pub mod answerer;
pub mod cache;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod router;
pub mod server;
pub mod session;
pub mod sql_agent;
