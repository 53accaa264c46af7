use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{BINARY_CONTENT_TYPE, ERROR_HEADER};
use crate::client::{
    ChartBatch, ChartRequest, ClientFuture, QuoteBatch, QuoteRequest, StockClient,
};
use crate::codec::{decode, encode, WireMessage};
use crate::http_client::{HttpClient, HttpRequest};
use crate::{ErrorKind, StockError};

/// [`StockClient`] that forwards every call to a remote transport server.
#[derive(Clone)]
pub struct RemoteClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
}

impl RemoteClient {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout_ms: 30_000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<Req, Resp>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        request: &Req,
    ) -> Result<Resp, StockError>
    where
        Req: WireMessage,
        Resp: WireMessage,
    {
        if cancel.is_cancelled() {
            return Err(StockError::cancelled());
        }

        let request = HttpRequest::post(format!("{}{path}", self.base_url))
            .with_header("content-type", BINARY_CONTENT_TYPE)
            .with_body(encode(request))
            .with_timeout_ms(self.timeout_ms);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StockError::cancelled()),
            outcome = self.http_client.execute(request) => outcome,
        };
        let response = outcome.map_err(|e| {
            StockError::upstream(format!("remote transport error: {}", e.message()))
        })?;

        if !response.is_success() {
            let kind = response
                .header(ERROR_HEADER)
                .and_then(ErrorKind::from_code)
                .unwrap_or(ErrorKind::Upstream);
            let body = response.text();
            let message = if body.trim().is_empty() {
                format!("remote server returned status {}", response.status)
            } else {
                body.trim().to_owned()
            };
            return Err(StockError::new(kind, message));
        }

        decode(&response.body)
    }
}

impl StockClient for RemoteClient {
    fn get_quotes<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        req: QuoteRequest,
    ) -> ClientFuture<'a, QuoteBatch> {
        Box::pin(async move { self.call(cancel, "/quote", &req).await })
    }

    fn get_charts<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        req: ChartRequest,
    ) -> ClientFuture<'a, ChartBatch> {
        Box::pin(async move { self.call(cancel, "/chart", &req).await })
    }
}
