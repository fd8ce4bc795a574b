use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime, Timelike};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::klines::resolution::{Resolution, SECONDS_IN_A_DAY};
use crate::utils::errors::MarketDataError;
use crate::utils::time::{time_string, unix_now};
use crate::workers::context::MarketDataContext;
use crate::workers::scheduler::{run_tick, secs_until_next};

pub fn parse_clean_up_time(value: &str) -> Option<(u32, u32)> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .ok()
        .map(|t| (t.hour(), t.minute()))
}

/// Deletes fine-grained candles that have aged past their retention.
pub async fn sweep(ctx: &MarketDataContext) -> Result<usize, MarketDataError> {
    let now = unix_now();
    let mut deleted = 0;

    for resolution in Resolution::all() {
        let kept_days = ctx.config.kept_days(*resolution);
        if kept_days <= 0 {
            continue;
        }

        let cutoff = now - kept_days * SECONDS_IN_A_DAY;
        let removed = ctx.store.delete_candles_before(*resolution, cutoff).await?;
        if removed > 0 {
            info!(
                resolution = resolution.label(),
                cutoff = %time_string(cutoff),
                removed,
                "swept expired candles"
            );
        }
        deleted += removed;
    }

    Ok(deleted)
}

/// Checks the wall clock once a minute and runs the sweep when it hits
/// the configured time of day.
pub fn spawn_retention_sweeper(
    ctx: Arc<MarketDataContext>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some((hour, minute)) = parse_clean_up_time(&ctx.config.cleanup_time) else {
            warn!(
                cleanup_time = %ctx.config.cleanup_time,
                "unparseable clean up time, retention sweeper disabled"
            );
            return;
        };

        loop {
            let wait = secs_until_next(60, unix_now()) + 1;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
                _ = stop.changed() => break,
            }

            let now = Local::now();
            if now.hour() != hour || now.minute() != minute {
                continue;
            }

            let tick_ctx = ctx.clone();
            run_tick("retention", async move { sweep(&tick_ctx).await }).await;
        }
        debug!("retention sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_up_time_parses_to_hour_and_minute() {
        assert_eq!(parse_clean_up_time("00:00:00"), Some((0, 0)));
        assert_eq!(parse_clean_up_time("23:59:59"), Some((23, 59)));
        assert_eq!(parse_clean_up_time("04:30:00"), Some((4, 30)));
    }

    #[test]
    fn garbage_clean_up_time_is_rejected() {
        assert_eq!(parse_clean_up_time("25:00:00"), None);
        assert_eq!(parse_clean_up_time("midnight"), None);
        assert_eq!(parse_clean_up_time(""), None);
    }
}
