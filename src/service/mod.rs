//! The HTTP surface: agent ingest, operator CRUD, and health probes.
//!
//! ## Endpoints
//!
//! - `POST /api/v1/ingest/metrics` - agent metric submission
//! - `POST|GET /api/v1/http-targets`, `DELETE /api/v1/http-targets/:id` - probe config
//! - `GET /api/v1/incidents`, `GET /api/v1/incidents/:id/notifications`
//! - `GET /api/v1/machines`
//! - `GET|PUT /api/v1/settings`
//! - `PATCH /api/v1/metric-instances/:id/alerting`, `.../pause`
//! - `PUT /api/v1/metric-instances/:id/threshold`
//! - `GET /health`, `/health/live`, `/health/ready`, `/health/startup`

pub mod auth;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
