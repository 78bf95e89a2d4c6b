pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::billplz::BillplzProvider;

/// Shared application state; handlers receive it as `State<Arc<AppState>>`.
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub billplz: Arc<dyn BillplzProvider>,
}
