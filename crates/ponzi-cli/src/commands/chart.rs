use ponzi_core::{Chart, ChartBatch, ChartRequest, Lookup};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::{CacheSetting, ChartArgs, Cli, RangeArg};
use crate::error::CliError;

use super::{parse_symbols, stock_client};

pub async fn run(
    cli: &Cli,
    args: &ChartArgs,
    cancel: &CancellationToken,
) -> Result<Value, CliError> {
    check_range(cli, args)?;
    let symbols = parse_symbols(&args.symbols)?;
    let client = stock_client(cli)?;

    let batch = client
        .get_charts(cancel, ChartRequest::new(symbols, args.range.into()))
        .await?;
    for entry in &batch.charts {
        if let Lookup::NotFound { symbol } = entry {
            warn!(%symbol, "no chart returned");
        }
    }

    let batch = match args.tail {
        Some(count) => tail(batch, count),
        None => batch,
    };
    Ok(serde_json::to_value(batch)?)
}

/// The local planner only caches two-year charts.
fn check_range(cli: &Cli, args: &ChartArgs) -> Result<(), CliError> {
    let local = cli.remote.is_none();
    if local && args.range == RangeArg::OneDay && cli.chart_cache != CacheSetting::Bypass {
        return Err(CliError::Command(String::from(
            "range 1d is not cached; rerun with --chart-cache bypass",
        )));
    }
    Ok(())
}

/// Keep only the last `count` points of every chart.
fn tail(batch: ChartBatch, count: usize) -> ChartBatch {
    ChartBatch {
        charts: batch
            .charts
            .into_iter()
            .map(|entry| match entry {
                Lookup::Found(chart) => {
                    let points = chart.tail(count).to_vec();
                    Lookup::Found(Chart::new(chart.symbol, points))
                }
                missing => missing,
            })
            .collect(),
    }
}
