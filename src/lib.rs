//! # Bifrost
//!
//! A personal media catalog client. Bifrost registers local files into typed
//! sections of a catalog server, identifying each file by the SHA-256 of its
//! contents, and talks to the server either over its REST API or straight to
//! the backing metadata store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌────────────┐
//! │ Profiles │──▶│  Connection  │──▶│  Section     │──▶│Registration│
//! │  (TOML)  │   │ REST/direct  │   │  resolution  │   │single/bulk │
//! └──────────┘   └──────┬───────┘   └──────────────┘   └────────────┘
//!                       │
//!               ┌───────┴────────┐
//!               ▼                ▼
//!         ┌──────────┐     ┌──────────┐
//!         │   HTTP   │────▶│  SQLite  │
//!         │ (serve)  │     │  store   │
//!         └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bifrost profiles                               # list server profiles
//! bifrost create-section movies /mnt/movies video
//! bifrost --section movies register ./clip.mp4
//! bifrost --section movies migrate ./incoming --recursive
//! bifrost --direct serve --bind 127.0.0.1:7340   # expose the store over HTTP
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`error`] | Error taxonomy and exit codes |
//! | [`config`] | Runtime settings built once at process entry |
//! | [`identity`] | Local paths and SHA-256 content identity |
//! | [`profile`] | Server profile loading and selection |
//! | [`models`] | Sections, file records and type-specific metadata |
//! | [`media`] | File type detection and draft records |
//! | [`connection`] | Transport-independent connection trait |
//! | [`client`] | REST transport |
//! | [`direct`] | Direct transport over the metadata store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`section`] | Section resolution |
//! | [`register`] | Single and bulk registration |
//! | [`server`] | REST API server |
//! | [`commands`] | CLI command bodies |

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod db;
pub mod direct;
pub mod error;
pub mod identity;
pub mod media;
pub mod migrate;
pub mod models;
pub mod profile;
pub mod register;
pub mod section;
pub mod server;

pub use connection::Connection;
pub use error::{CatalogError, Result};
