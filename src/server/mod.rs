pub mod routes;
pub mod types;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{CatalogError, Result};
use crate::providers::Provider;
use routes::{build_router, ApiState};
use types::ServerInfo;

pub struct AppState {
    pub server_info: ServerInfo,
    pub api_state: ApiState,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        let catalog = Catalog::from_config(config)?;

        let ip = get_local_ipv4();
        let port = config.bind.port();
        let server_info = ServerInfo {
            url: format!("http://{ip}:{port}"),
            ip,
            port,
            providers: Provider::ALL.iter().map(|p| p.tag().to_string()).collect(),
        };

        let api_state = ApiState::new(catalog, config.scroll_threshold_px, server_info.clone());

        Ok(Self {
            server_info,
            api_state,
        })
    }
}

fn get_local_ipv4() -> String {
    local_ip_address::local_ip()
        .ok()
        .and_then(|ip| match ip {
            std::net::IpAddr::V4(v4) => Some(v4.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Bind and serve until the server stops. Binding failures are returned; serve errors are logged.
pub async fn start_server(state: AppState, config: &Config) -> Result<()> {
    let router = build_router(state.api_state);
    let addr = config.bind;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| CatalogError::Config(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, lan = %state.server_info.url, "HTTP server listening");
    if let Err(e) = axum::serve(listener, router).await {
        error!(error = %e, "server error");
    }
    Ok(())
}
