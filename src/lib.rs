//! # Folio
//!
//! Environment-aware access to a hosted document database and its local
//! emulator.
//!
//! Folio resolves a logical project and an environment (`emulator` or
//! `live`) to a cached client handle, and exposes path-based document
//! operations, chunked batch writes, and live listeners on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌─────────────────┐
//! │   Provider   │──▶│ ClientRegistry │──▶│ DocumentAdapter │
//! │ memory/REST  │   │ project::env   │   │ typed get/set/… │
//! └──────────────┘   └────────────────┘   └────────┬────────┘
//!                                                  │
//!                      ┌─────────────────┬─────────┴────────┐
//!                      ▼                 ▼                  ▼
//!               ┌──────────────┐  ┌─────────────┐    ┌────────────┐
//!               │CollectionView│  │ EnvPair     │    │ CLI / HTTP │
//!               └──────────────┘  └─────────────┘    └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! folio --emulator add test '{"message":"hello","createdAt":1000}'
//! folio --emulator list test
//! folio serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`provider`] | Backend provider seam and in-memory provider |
//! | [`rest`] | Firestore v1 REST provider |
//! | [`registry`] | Cached client handles per project and environment |
//! | [`adapter`] | Typed document operations |
//! | [`view`] | Collection-bound live view |
//! | [`env_pair`] | Live and emulator side by side |
//! | [`server`] | Sync HTTP service |
//! | [`commands`] | CLI command implementations |
//! | [`logging`] | Tracing subscriber setup |

pub mod adapter;
pub mod commands;
pub mod config;
pub mod env_pair;
pub mod logging;
pub mod provider;
pub mod registry;
pub mod rest;
pub mod server;
pub mod view;

pub use folio_core as core;
