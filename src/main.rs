use binance_wsapi::exchanges::binance::{
    create_binance_client, create_stream_session, decode_stream_frame, stream_identifiers,
    AccountStatusService, Ping, SubscriptionType, TickerPriceService, Time,
};
use binance_wsapi::SessionConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Credentials are optional; without them only public calls are made
    let config = SessionConfig::from_env_file("BINANCE")
        .unwrap_or_else(|_| SessionConfig::read_only().testnet(true));

    let client = create_binance_client(config.clone());
    client.execute(Ping).await?;

    let time = client.execute(Time).await?;
    let local = chrono::Utc::now().timestamp_millis();
    info!(server_time = time.server_time, skew_ms = time.server_time - local, "server time");

    let ticker = client.execute(TickerPriceService::new("BTCUSDT")).await?;
    info!(symbol = %ticker.symbol, price = %ticker.price, "ticker");

    if client.config().has_credentials() {
        match client.execute(AccountStatusService::new().omit_zero_balances(true)).await {
            Ok(status) => info!(
                can_trade = status.can_trade,
                balances = status.balances.len(),
                "account"
            ),
            Err(e) => warn!("account.status failed: {}", e),
        }
    }
    client.close().await?;

    // Stream mode: a few trades, then shut down
    let streams = stream_identifiers(&["BTCUSDT".to_string()], &[SubscriptionType::Trades]);
    let session = create_stream_session(&config, &streams);
    let cancel = CancellationToken::new();
    let (mut messages, mut errors) = session.serve(cancel.clone()).await?;

    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);
    let mut received = 0;
    while received < 5 {
        tokio::select! {
            Some(frame) = messages.recv() => {
                received += 1;
                match decode_stream_frame(&frame) {
                    Ok(event) => info!(?event, "stream event"),
                    Err(e) => warn!("undecodable frame: {}", e),
                }
            }
            Some(err) = errors.recv() => {
                warn!("stream failed: {}", err);
                break;
            }
            () = &mut deadline => break,
        }
    }

    cancel.cancel();
    session.close().await?;
    Ok(())
}
