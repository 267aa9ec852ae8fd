//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::{
    config::Config, db::DbPool, error::AppError, middleware::session::SessionKeys,
    services::gateway_client::GatewayClient,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub sessions: Arc<SessionKeys>,
    pub gateway: GatewayClient,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Result<Self, AppError> {
        let sessions = SessionKeys::new(&config.session_secret, config.session_ttl_hours);
        let gateway = GatewayClient::from_config(&config)?;

        Ok(Self {
            pool,
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            gateway,
        })
    }

    /// State over a pool that never connects, for router tests that stop in middleware.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let config = Config::for_tests();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool");
        Self::new(pool, config).expect("test state")
    }
}
