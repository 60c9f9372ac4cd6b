use reqwest::Client;

use crate::{assets::PreloadedAsset, config::RelayConfig};

/// Everything a request needs, built once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct RelayState {
    pub config: RelayConfig,
    pub homepage: PreloadedAsset,
    pub favicon: PreloadedAsset,
    pub client: Client,
}

impl RelayState {
    pub async fn new(config: RelayConfig) -> Self {
        let (homepage, favicon) = tokio::join!(
            PreloadedAsset::load(&config.homepage_path),
            PreloadedAsset::load(&config.favicon_path),
        );

        Self::with_assets(config, homepage, favicon)
    }

    pub fn with_assets(
        config: RelayConfig,
        homepage: PreloadedAsset,
        favicon: PreloadedAsset,
    ) -> Self {
        Self {
            config,
            homepage,
            favicon,
            client: Client::new(),
        }
    }

    pub fn with_client(self, client: Client) -> Self {
        Self { client, ..self }
    }
}
