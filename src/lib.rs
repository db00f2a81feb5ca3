pub mod catalog;
pub mod config;
pub mod debug_log;
pub mod envelope;
pub mod error;
pub mod merge;
pub mod model;
pub mod paginator;
pub mod playback;
pub mod providers;
pub mod server;
pub mod stream;
pub mod subtitle;
pub mod transport;

pub use catalog::{Catalog, ListingPage};
pub use config::Config;
pub use error::{CatalogError, Result};
pub use model::{ContentId, ContentItem, Episode};
pub use providers::Provider;
pub use stream::{ResolvedSource, SourceKind};

use server::AppState;

/// Build the service state from `config` and serve the HTTP API.
pub async fn run(config: Config) -> Result<()> {
    let state = AppState::new(&config)?;
    server::start_server(state, &config).await
}
