//! HTTP API for the payroll agent.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /agent/chat` - Payment assistant (single payment tool)
//! - `POST /agent/assistant` - Database and payment assistant
//! - `GET /api/contractors` - List contractors, newest first
//! - `POST /api/contractors` - Create a contractor
//! - `GET /api/contractors/search` - Filter contractors by equality
//! - `GET /api/payments/summary` - Payment totals for one contractor
//! - `POST /api/github-oauth` - Create or wait for a GitHub OAuth session
//! - `GET /api/github-prs` - Refresh and list one contractor's pull requests

mod agent;
mod contractors;
mod error;
mod github;
mod oauth;
mod routes;
pub mod types;

pub use error::ApiError;
pub use routes::{router, serve, AppState};
