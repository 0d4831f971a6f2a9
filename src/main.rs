use anyhow::Context;
use flight_deal_alerts::{
    AppConfig, DealFinder, FlightSearchClient, PushoverNotifier, ReqwestTransport, SheetyStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flight_deal_alerts=info,flight_deals=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let transport = ReqwestTransport::new();

    let search = FlightSearchClient::connect(config.amadeus(), transport.clone())
        .await
        .context("flight API authentication failed")?;
    let store = SheetyStore::new(config.sheety(), transport.clone());
    let notifier = PushoverNotifier::new(config.pushover(), transport);

    let finder = DealFinder::new(config.search(), store, search, notifier);
    let report = finder.run(chrono::Local::now().date_naive()).await?;

    tracing::info!(
        "Run complete: {} searched, {} deals, {} without offers, {} skipped, {} rows written",
        report.searched,
        report.deals,
        report.unavailable,
        report.skipped,
        report.rows_written
    );
    Ok(())
}
