//! CLI argument definitions for ponzi.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Latest quotes for symbols |
//! | `chart` | Daily (2y) charts, or minute (1d) charts with `--chart-cache bypass` |
//! | `serve` | Share one cache over the binary HTTP transport |
//! | `metrics` | Cache and planner metrics |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--quote-cache` | `memory` | Quote cache mode |
//! | `--chart-cache` | `persistent` | Chart cache mode |
//! | `--dump-responses` | `false` | Write raw upstream bodies to the working directory |
//! | `--dump-dir` | unset | Write raw upstream bodies to this directory instead |
//! | `--remote` | unset | Forward calls to a `ponzi serve` instance |
//! | `--timeout-ms` | `10000` | Per-request timeout |
//!
//! # Examples
//!
//! ```bash
//! ponzi quote AAPL,MSFT --pretty
//! ponzi chart SPY QQQ --tail 5
//! ponzi --chart-cache bypass chart MSFT --range 1d
//! PORT=9000 ponzi serve
//! ponzi --remote http://127.0.0.1:9000 chart MSFT
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ponzi_core::{CacheMode, Range};

#[derive(Debug, Parser)]
#[command(
    name = "ponzi",
    author,
    version,
    about = "Cached, batched IEX quote and chart client"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// How quotes are cached.
    #[arg(long, global = true, value_enum, default_value_t = CacheSetting::Memory)]
    pub quote_cache: CacheSetting,

    /// How charts are cached.
    #[arg(long, global = true, value_enum, default_value_t = CacheSetting::Persistent)]
    pub chart_cache: CacheSetting,

    /// Tee every upstream response body to `iex-*.txt` in the working directory.
    #[arg(long, global = true, default_value_t = false)]
    pub dump_responses: bool,

    /// Tee upstream response bodies into this directory; implies `--dump-responses`.
    #[arg(long, global = true, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Base URL of a `ponzi serve` instance to forward calls to.
    #[arg(long, global = true, env = "PONZI_REMOTE")]
    pub remote: Option<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheSetting {
    /// Always go upstream.
    Bypass,
    /// Cache for the lifetime of the process.
    Memory,
    /// Cache on disk under the cache directory.
    Persistent,
}

impl From<CacheSetting> for CacheMode {
    fn from(value: CacheSetting) -> Self {
        match value {
            CacheSetting::Bypass => CacheMode::Bypass,
            CacheSetting::Memory => CacheMode::Memory,
            CacheSetting::Persistent => CacheMode::Persistent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RangeArg {
    /// One day of minute bars.
    #[value(name = "1d")]
    OneDay,
    /// Two years of daily bars.
    #[value(name = "2y")]
    TwoYears,
}

impl From<RangeArg> for Range {
    fn from(value: RangeArg) -> Self {
        match value {
            RangeArg::OneDay => Range::OneDay,
            RangeArg::TwoYears => Range::TwoYears,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch latest quotes.
    Quote(QuoteArgs),
    /// Fetch charts, using the cache to request only missing days.
    Chart(ChartArgs),
    /// Serve the cached client over HTTP.
    Serve(ServeArgs),
    /// Print cache and planner metrics.
    Metrics,
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Symbols, space or comma separated.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ChartArgs {
    /// Symbols, space or comma separated.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    /// Chart range. Only `2y` is cached; `1d` needs `--chart-cache bypass`.
    #[arg(long, value_enum, default_value_t = RangeArg::TwoYears)]
    pub range: RangeArg,

    /// Only print the last N points of each chart.
    #[arg(long)]
    pub tail: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}
