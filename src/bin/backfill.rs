use anyhow::{anyhow, Result};
use clap::Parser;
use dotenvy::dotenv;

use candela_back_end::klines::builder::build_base_candles;
use candela_back_end::klines::merger::merge_into;
use candela_back_end::klines::resolution::Resolution;
use candela_back_end::store::{trade_queries, CandleStore};
use candela_back_end::utils::app_config::AppConfig;

/// Rebuilds candles from persisted trades, base layer first, then every
/// requested merged resolution.
#[derive(Parser, Debug)]
#[command(name = "backfill")]
struct Args {
    /// Unix second to rebuild from. 0 starts at the earliest trade.
    #[arg(long, default_value_t = 0)]
    start: i64,

    /// Unix second to rebuild up to. Defaults to the latest trade on
    /// record. Only buckets that closed before this point are built.
    #[arg(long)]
    end: Option<i64>,

    /// Comma-separated resolution labels (e.g. 3min,1hour). Defaults to
    /// every merged resolution.
    #[arg(long, value_delimiter = ',')]
    resolutions: Vec<String>,
}

fn parse_resolutions(labels: &[String]) -> Result<Vec<Resolution>> {
    if labels.is_empty() {
        return Ok(Resolution::merged().to_vec());
    }

    labels
        .iter()
        .map(|label| {
            Resolution::merged()
                .iter()
                .copied()
                .find(|r| r.label() == label)
                .ok_or_else(|| anyhow!("unknown resolution: {}", label))
        })
        .collect()
}

/// The bucket containing `end` may still receive trades and the base
/// layer never rebuilds a written bucket, so backfill stops at the last
/// bucket boundary at or before `end`.
fn complete_bucket_horizon(end: i64, resolution: Resolution) -> i64 {
    resolution.align(end)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt().init();

    let args = Args::parse();
    let resolutions = parse_resolutions(&args.resolutions)?;

    let app_config = AppConfig::from_env()?;
    let store = CandleStore::new(app_config.pool);

    let end = match args.end {
        Some(end) => end,
        None => {
            let mut conn = store.conn()?;
            trade_queries::max_timestamp(&mut conn)?
                .ok_or_else(|| anyhow!("no trades to backfill from"))?
        }
    };

    let base_horizon = complete_bucket_horizon(end, Resolution::OneMinute);
    if base_horizon <= args.start {
        tracing::info!("no complete base buckets in range, nothing to do");
        return Ok(());
    }

    match build_base_candles(&store, args.start, base_horizon).await {
        Ok(summary) => tracing::info!(
            start = summary.window_start,
            end = summary.window_end,
            written = summary.candles_written,
            "base candles rebuilt"
        ),
        Err(err) if err.is_idle() => tracing::info!("base layer already up to date"),
        Err(err) => return Err(err.into()),
    }

    for resolution in resolutions {
        let horizon = complete_bucket_horizon(end, resolution);
        if horizon <= args.start {
            tracing::info!(
                resolution = resolution.label(),
                "no complete buckets in range, skipped"
            );
            continue;
        }

        match merge_into(&store, resolution, args.start, horizon).await {
            Ok(summary) => tracing::info!(
                resolution = resolution.label(),
                start = summary.window_start,
                end = summary.window_end,
                written = summary.candles_written,
                "resolution rebuilt"
            ),
            Err(err) if err.is_idle() => {
                tracing::info!(resolution = resolution.label(), "already up to date")
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_stops_before_the_bucket_still_receiving_trades() {
        assert_eq!(complete_bucket_horizon(125, Resolution::OneMinute), 120);
        assert_eq!(complete_bucket_horizon(120, Resolution::OneMinute), 120);
        assert_eq!(complete_bucket_horizon(125, Resolution::ThreeMinutes), 0);
        assert_eq!(complete_bucket_horizon(3_599, Resolution::OneHour), 0);
    }

    #[test]
    fn unknown_resolution_labels_are_rejected() {
        assert!(parse_resolutions(&["2min".to_string()]).is_err());
        assert!(parse_resolutions(&["1min".to_string()]).is_err());
        assert_eq!(parse_resolutions(&[]).unwrap().len(), 11);
    }
}
