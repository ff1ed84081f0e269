// Module declarations
pub mod config;
pub mod relay;
pub mod relay_server;

pub use config::{DefaultHeaders, RelayConfig};
pub use relay::{MediaRelay, RelayError, TargetGuard};
pub use relay_server::{router, RelayServer};

/// Load configuration from the environment and serve until shutdown.
pub async fn run() -> anyhow::Result<()> {
    let config = RelayConfig::load();
    RelayServer::new(config).start().await
}
