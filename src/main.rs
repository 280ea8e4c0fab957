//! Pushover desktop client daemon.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use pushover_desktop::{
    ApiClient, DesktopSink, DiskIconCache, Dispatcher, IconCache, PushTransport,
    SessionController, Settings, logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let settings = Settings::load().context("failed to load settings")?;

    let cache: Option<Arc<dyn IconCache>> = match &settings.image_cache {
        Some(dir) => {
            info!(dir = %dir.display(), "Initializing image cache directory");
            let cache = DiskIconCache::new(
                dir.clone(),
                &settings.icon_url,
                settings.request_timeout,
            )
            .context("failed to initialize image cache")?;
            Some(Arc::new(cache))
        }
        None => {
            info!("No image cache directory specified");
            None
        }
    };

    let transport = Arc::new(PushTransport::new(&settings));
    let api = Arc::new(ApiClient::new(&settings).context("failed to build API client")?);
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(DesktopSink), cache));

    let mut controller = SessionController::new(transport, api, dispatcher, &settings);
    controller.run().await;

    Ok(())
}
