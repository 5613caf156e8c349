//! TMKB Server - HTTP REST API for the translation-memory knowledge base
//!
//! Exposes translation-memory lookup, writes, similarity search and the
//! threshold policy over HTTP, with API-key authentication, per-key rate
//! limiting, request IDs and structured logging.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! Public:
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe (`degraded` while the vector service is down)
//!
//! API key required:
//!
//! - `POST /api/v1/memory/lookup` - Translation-memory candidates for one text
//! - `POST /api/v1/memory/lookup/batch` - Candidates for many texts
//! - `POST /api/v1/memory/entries` - Store a translation pair
//! - `DELETE /api/v1/memory/entries/{id}` - Delete a stored pair
//! - `POST /api/v1/memory/search` - Same-language similarity search
//! - `GET /api/v1/thresholds` - Active cutoff table
//! - `GET /api/v1/thresholds/recommended` - Cutoff for a level and use case
//! - `POST /api/v1/thresholds/classify` - Label a similarity score
//! - `GET /api/v1/status` - Stack and vector-service status

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, spawn_reprobe, start_server};
pub use state::ServerState;
