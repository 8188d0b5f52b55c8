use flume_core::{CollectionScheduler, UpstreamClient};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Confirms or obtains a token, then hands over to the scheduler. A failed
/// startup authentication only empties the first passes; each pass
/// authenticates again on its own.
pub async fn start_collection(
    client: Arc<UpstreamClient>,
    scheduler: CollectionScheduler,
    shutdown: watch::Receiver<bool>,
) {
    info!("🔐 Validating authentication...");
    match client.validate_authentication().await {
        Ok(()) => info!("✅ Stored token is valid"),
        Err(e) => {
            warn!("⚠️ Authentication validation failed: {}", e);
            info!("🔐 Authenticating...");
            match client.token_manager().authenticate_with_retry().await {
                Ok(()) => info!("✅ Authentication successful"),
                Err(e) => {
                    error!("❌ Failed to authenticate: {}", e);
                    warn!("Collection continues; each pass retries authentication");
                },
            }
        },
    }

    scheduler.run(shutdown).await;
}
