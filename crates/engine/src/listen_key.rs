use crate::Engine;
use std::time::Duration;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1200);
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Obtains the private-stream session key, then keeps it alive.
///
/// Until the first key arrives the account stream sits waiting, so startup
/// failures only delay balance data; the trading side is unaffected.
pub async fn listen_key_task(engine: Engine) {
    let listen_key = loop {
        match engine.api.create_listen_key().await {
            Ok(data) => break data.listen_key,
            Err(e) => {
                tracing::error!(error = %e, "failed to obtain listen key, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    };

    engine.account.set_listen_key(listen_key.clone()).await;
    tracing::info!("listen key obtained");

    loop {
        tokio::time::sleep(REFRESH_INTERVAL).await;
        if let Err(e) = engine.api.extend_listen_key(&listen_key).await {
            tracing::error!(error = %e, "listen key refresh failed");
        }
    }
}
