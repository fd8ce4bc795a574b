use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::klines::builder::{build_base_candles, settle_horizon};
use crate::klines::merger::merge_into;
use crate::klines::resolution::{
    Resolution, BASE_SETTLE_DELAY_SECS, MERGE_SETTLE_DELAY_SECS, SECONDS_IN_A_DAY,
};
use crate::store::{candle_queries, trade_queries};
use crate::utils::errors::MarketDataError;
use crate::utils::time::unix_now;
use crate::workers::context::MarketDataContext;
use crate::workers::retention;

/// Products count as live if they had any activity within this window.
const PRODUCT_ACTIVITY_WINDOW_SECS: i64 = 14 * SECONDS_IN_A_DAY;
const PRODUCT_DISCOVERY_TAIL_SECS: i64 = 16 * 60;

/// What a single worker tick amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed { written: usize },
    Idle,
    Failed,
    PanicRecovered,
}

/// Runs one tick inside its own task so a panic in the tick body takes
/// down only that tick. The worker loop carries no state a panic could
/// corrupt; the next tick recomputes its window from persisted anchors.
pub async fn run_tick<F>(worker: &str, tick: F) -> TickOutcome
where
    F: Future<Output = Result<usize, MarketDataError>> + Send + 'static,
{
    match tokio::spawn(tick).await {
        Ok(Ok(written)) => {
            debug!(worker, written, "tick completed");
            TickOutcome::Completed { written }
        }
        Ok(Err(err)) if err.is_idle() => TickOutcome::Idle,
        Ok(Err(err)) => {
            error!(worker, error = %err, "tick failed");
            TickOutcome::Failed
        }
        Err(join_err) if join_err.is_panic() => {
            error!(worker, "tick panicked, recovered");
            TickOutcome::PanicRecovered
        }
        Err(join_err) => {
            error!(worker, error = %join_err, "tick aborted");
            TickOutcome::Failed
        }
    }
}

/// Seconds until just past the next multiple of `step`.
pub fn secs_until_next(step: i64, now: i64) -> u64 {
    (step - now.rem_euclid(step)) as u64
}

/// One-shot wait that lines a worker's first run up with a clean bucket
/// boundary plus its settle delay.
async fn align_startup(step: i64, settle_delay: i64, stop: &mut watch::Receiver<bool>) -> bool {
    let wait = secs_until_next(step, unix_now()) + settle_delay as u64;
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(wait)) => true,
        _ = stop.changed() => false,
    }
}

/// Spawns the full worker set: the 1-minute builder, one merge worker
/// per coarser resolution, the ticker refresher, and the retention
/// sweeper. All loops exit when `stop` flips to `true`.
pub fn spawn_workers(
    ctx: Arc<MarketDataContext>,
    stop: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    // One wakeup slot per merge worker. notify_one keeps at most one
    // pending wakeup; a dropped notification is harmless because every
    // tick recomputes its window from what is persisted.
    let merge_notifies: Vec<Arc<Notify>> = Resolution::merged()
        .iter()
        .map(|_| Arc::new(Notify::new()))
        .collect();
    let ticker_notify = Arc::new(Notify::new());

    handles.push(spawn_base_worker(
        ctx.clone(),
        stop.clone(),
        merge_notifies.clone(),
        ticker_notify.clone(),
    ));

    for (resolution, notify) in Resolution::merged().iter().zip(merge_notifies) {
        handles.push(spawn_merge_worker(ctx.clone(), stop.clone(), *resolution, notify));
    }

    handles.push(spawn_ticker_worker(ctx.clone(), stop.clone(), ticker_notify));
    handles.push(retention::spawn_retention_sweeper(ctx, stop));

    info!(workers = handles.len(), "market data workers started");
    handles
}

fn spawn_base_worker(
    ctx: Arc<MarketDataContext>,
    mut stop: watch::Receiver<bool>,
    merge_notifies: Vec<Arc<Notify>>,
    ticker_notify: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let step = Resolution::OneMinute.seconds();
        if !align_startup(step, BASE_SETTLE_DELAY_SECS, &mut stop).await {
            return;
        }

        loop {
            let end = settle_horizon(
                ctx.store.max_block_timestamp(),
                BASE_SETTLE_DELAY_SECS,
                Resolution::OneMinute,
            );

            if end > 0 {
                let tick_ctx = ctx.clone();
                let outcome = run_tick("kline_1min", async move {
                    build_base_candles(&tick_ctx.store, 0, end)
                        .await
                        .map(|s| s.candles_written)
                })
                .await;

                if let TickOutcome::Completed { written } = outcome {
                    if written > 0 {
                        for notify in &merge_notifies {
                            notify.notify_one();
                        }
                        ticker_notify.notify_one();
                    }
                }
            }

            let wait = secs_until_next(step, unix_now()) + 1;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
                _ = stop.changed() => break,
            }
        }
        debug!("base candle worker stopped");
    })
}

fn spawn_merge_worker(
    ctx: Arc<MarketDataContext>,
    mut stop: watch::Receiver<bool>,
    resolution: Resolution,
    notify: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let worker = format!("kline_{}", resolution.label());
        if !align_startup(resolution.seconds(), MERGE_SETTLE_DELAY_SECS, &mut stop).await {
            return;
        }

        let mut last_completed: i64 = 0;

        loop {
            // A bucket settles at most once per interval, so wakeups
            // inside the same interval have nothing new to merge.
            let end = settle_horizon(
                ctx.store.max_block_timestamp(),
                MERGE_SETTLE_DELAY_SECS,
                resolution,
            );
            let debounced = unix_now() - last_completed < resolution.seconds();

            if end > 0 && !debounced {
                let tick_ctx = ctx.clone();
                let outcome = run_tick(&worker, async move {
                    merge_into(&tick_ctx.store, resolution, 0, end)
                        .await
                        .map(|s| s.candles_written)
                })
                .await;

                if matches!(outcome, TickOutcome::Completed { written } if written > 0) {
                    last_completed = unix_now();
                }
            }

            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep(Duration::from_secs(resolution.seconds() as u64)) => {}
                _ = stop.changed() => break,
            }
        }
        debug!(resolution = resolution.label(), "merge worker stopped");
    })
}

fn spawn_ticker_worker(
    ctx: Arc<MarketDataContext>,
    mut stop: watch::Receiver<bool>,
    notify: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep(Duration::from_secs(60)) => {}
                _ = stop.changed() => break,
            }

            let end = ctx.store.max_block_timestamp();
            if end == 0 {
                continue;
            }

            let tick_ctx = ctx.clone();
            run_tick("tickers", async move {
                let products = active_products(&tick_ctx, end)?;
                if products.is_empty() {
                    return Err(MarketDataError::NoSourceData);
                }

                tick_ctx
                    .refresher
                    .refresh(&tick_ctx.store, &tick_ctx.tickers, &products, end)
                    .await
            })
            .await;
        }
        debug!("ticker worker stopped");
    })
}

/// Products with any activity in the recent window. 15-minute candles
/// cover all but the tail of the window; the tail, where those candles
/// may not have settled yet, is scanned from raw trades.
fn discovery_windows(end: i64) -> ((i64, i64), (i64, i64)) {
    let start = end - PRODUCT_ACTIVITY_WINDOW_SECS;
    let tail_start = end - PRODUCT_DISCOVERY_TAIL_SECS;
    ((start, end + 1), (tail_start, end + 1))
}

fn active_products(ctx: &MarketDataContext, end: i64) -> Result<Vec<String>, MarketDataError> {
    let (candle_window, trade_tail) = discovery_windows(end);
    let mut conn = ctx.store.conn()?;

    let mut products: BTreeSet<String> = candle_queries::products_with_candles_in_range(
        Resolution::FifteenMinutes,
        candle_window.0,
        candle_window.1,
        &mut conn,
    )?
    .into_iter()
    .collect();
    products.extend(trade_queries::products_in_range(
        trade_tail.0,
        trade_tail.1,
        &mut conn,
    )?);

    Ok(products.into_iter().collect())
}
