use std::sync::Arc;

use ponzi_core::remote::{bind, serve};
use ponzi_core::{ServerState, StockClient};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{Cli, ServeArgs};
use crate::error::CliError;

use super::local_client;

pub async fn run(cli: &Cli, args: &ServeArgs, shutdown: &CancellationToken) -> Result<(), CliError> {
    if cli.remote.is_some() {
        return Err(CliError::Command(String::from(
            "serve owns the cache and cannot forward to --remote",
        )));
    }

    let client = local_client(cli)?;
    let metrics = client.metrics().clone();
    let client: Arc<dyn StockClient> = Arc::new(client);
    let state = ServerState::new(client).with_metrics(metrics);

    let listener = bind(args.port).await?;
    serve(listener, state, shutdown.clone()).await?;
    info!("remote transport stopped");
    Ok(())
}
