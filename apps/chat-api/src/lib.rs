pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use auth::JwtAuthenticator;
use config::Config;
use db::ChatStore;
use gateway::Gateway;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ChatStore>) -> Self {
        let auth = Arc::new(JwtAuthenticator::new(&config.jwt_secret));
        let gateway = Gateway::new(auth, store).require_membership(config.require_channel_membership);

        Self {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
        }
    }
}
