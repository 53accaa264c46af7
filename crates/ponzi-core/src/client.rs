//! Client contract shared by the planner and the remote transport.
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | Quotes | [`QuoteRequest`] | [`QuoteBatch`] |
//! | Charts | [`ChartRequest`] | [`ChartBatch`] |
//!
//! Both batches answer in the request's symbol order. A symbol the upstream
//! did not return is reported as [`Lookup::NotFound`] instead of failing the
//! call.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{Chart, Lookup, Quote, Range, StockError, Symbol};

/// Request for the latest quotes of a set of symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub symbols: Vec<Symbol>,
}

impl QuoteRequest {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }
}

/// Request for charts covering `range` for a set of symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub symbols: Vec<Symbol>,
    pub range: Range,
}

impl ChartRequest {
    pub fn new(symbols: Vec<Symbol>, range: Range) -> Self {
        Self { symbols, range }
    }
}

/// Quotes in request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteBatch {
    pub quotes: Vec<Lookup<Quote>>,
}

impl QuoteBatch {
    pub fn found(&self) -> impl Iterator<Item = &Quote> {
        self.quotes.iter().filter_map(Lookup::found)
    }
}

/// Charts in request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBatch {
    pub charts: Vec<Lookup<Chart>>,
}

impl ChartBatch {
    pub fn found(&self) -> impl Iterator<Item = &Chart> {
        self.charts.iter().filter_map(Lookup::found)
    }
}

pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StockError>> + Send + 'a>>;

/// Quote and chart access, local or remote.
///
/// Cancelling `cancel` aborts outstanding upstream work and resolves the call
/// with a `Cancelled` error.
pub trait StockClient: Send + Sync {
    fn get_quotes<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        req: QuoteRequest,
    ) -> ClientFuture<'a, QuoteBatch>;

    fn get_charts<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        req: ChartRequest,
    ) -> ClientFuture<'a, ChartBatch>;
}
