//! Server Module
//!
//! Wires the engine, the snapshot backend and the HTTP router together.

mod config;
mod routes;

pub use config::Config;
pub use routes::{router, AppState, Resp};

use crate::persistence::MongoBackend;
use crate::storage::Engine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// CHUNKV server
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the server until the process exits.
    pub async fn run(self) -> anyhow::Result<()> {
        let engine = Engine::new(self.config.chunks, true);
        let backend = MongoBackend::connect(
            &self.config.mongo_uri,
            &self.config.mongo_db,
            &self.config.mongo_collection,
        )
        .await?;
        let state = AppState::new(engine, Arc::new(backend), self.config.chunks);

        let addr = format!("{}:{}", self.config.bind, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("chunkv server listening on {}", addr);

        axum::serve(listener, router(state)).await?;
        Ok(())
    }
}
