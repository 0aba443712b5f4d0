//! autocrud: CRUD HTTP API synthesized at startup from declarative resources.

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod model;
pub mod operation;
pub mod repository;
pub mod response;
pub mod routes;
pub mod sql;
pub mod state;
pub mod store;
pub mod usecase;

pub use config::{load_from_path, load_from_str, resolve, ResolvedSpec, ResourceDefinition, Settings};
pub use context::Context;
pub use controller::ResourceController;
pub use error::{ApiError, ConfigError, ServiceError, StoreError, UsecaseError, ValidationError};
pub use model::{Instance, Model};
pub use operation::Operation;
pub use routes::{build_router, plan_routes, RouteSpec};
pub use state::AppState;
pub use store::{MemoryBackend, MySqlBackend, PgBackend, ServiceRegistry, SqlBackend};
