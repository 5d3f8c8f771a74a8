use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{fmt, EnvFilter};

use simbroker::broadcast::BrokerEvent;
use simbroker::broker::Brokerage;
use simbroker::core::{
    Config, NotificationSink, OrderRequest, OrderType, Side, Symbol, TimeInForce,
};
use simbroker::feeds::SimReferencePrices;
use simbroker::notify::{HttpNotifier, NullNotifier};
use simbroker::venues::SimVenue;

fn request(symbol: &str, side: Side, order_type: OrderType, qty: u64) -> OrderRequest {
    OrderRequest {
        symbol: Symbol::new(symbol),
        side,
        order_type,
        qty,
        limit_price: None,
        stop_price: None,
        trailing_percent: None,
        trailing_amount: None,
        tif: TimeInForce::Day,
        gtd_date: None,
        profit_target: None,
        stop_loss: None,
        parent_order_id: None,
        linked_order_id: None,
        notes: None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logger
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,simbroker=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    tracing::info!("🦀 simbroker starting (in-memory order-lifecycle core)...");

    // 2. Configuration
    let config = match std::env::var("SIMBROKER_CONFIG") {
        Ok(path) => Config::load(Path::new(&path))?,
        Err(_) => Config::default(),
    };

    // 3. Wire the core to the simulated collaborators
    let refs = Arc::new(SimReferencePrices::default());
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    let venue = Arc::new(SimVenue::new(
        refs.clone(),
        report_tx,
        Duration::from_millis(250),
    ));
    let sink: Arc<dyn NotificationSink> = match &config.notifier {
        Some(cfg) => Arc::new(HttpNotifier::new(cfg)?),
        None => Arc::new(NullNotifier),
    };
    let broker = Arc::new(Brokerage::new(&config, venue, refs.clone(), sink));

    // 4. Background tasks: conditional monitor + execution report pump
    let (shutdown_tx, _) = broadcast::channel(1);
    let monitor = broker.monitor(config.monitor.clone());
    let monitor_handle = tokio::spawn(monitor.run(shutdown_tx.subscribe()));

    let pump_broker = broker.clone();
    let pump = tokio::spawn(async move {
        while let Some(report) = report_rx.recv().await {
            if let Err(e) = pump_broker.apply_execution(&report) {
                tracing::warn!("Execution report dropped: {}", e);
            }
        }
    });

    let mut events = broker.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                BrokerEvent::OrderUpdate(o) => {
                    tracing::debug!("📣 order {} -> {:?}", o.id, o.status)
                }
                BrokerEvent::OrderTriggered(o) => {
                    tracing::debug!("📣 order {} triggered", o.id)
                }
                BrokerEvent::PositionUpdate(p) => {
                    tracing::debug!("📣 position {} -> {}", p.symbol, p.quantity)
                }
            }
        }
    });

    // 5. Scripted session against the sim venue
    let market = broker
        .place_order(request("AAPL", Side::Buy, OrderType::Market, 100))
        .await?;
    tracing::info!("Placed market order {}", market.id);

    let mut stop = request("AAPL", Side::Buy, OrderType::Stop, 50);
    stop.stop_price = Some(105.0);
    let stop = broker.place_order(stop).await?;
    tracing::info!("Stop order {} waiting on its trigger", stop.id);

    tokio::time::sleep(Duration::from_secs(2)).await;

    // push the reference price through the stop
    refs.set(Symbol::new("AAPL"), 106.0);
    tracing::info!("Reference price moved to 106.00");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let stats = broker.stats();
    tracing::info!(
        "Session stats: {} orders, {} filled, {} volume, {:.2} value",
        stats.total_orders,
        stats.filled_orders,
        stats.total_volume,
        stats.total_value
    );
    for position in broker.positions() {
        tracing::info!(
            "Position {}: {} @ {:.2} (realized {:.2})",
            position.symbol,
            position.quantity,
            position.avg_price,
            position.realized_pnl
        );
    }

    let _ = shutdown_tx.send(());
    monitor_handle.await?;
    pump.abort();
    tracing::info!("simbroker session complete");
    Ok(())
}
