//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::compact::compact;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{cancellable, ApiClient};
use serde_json::{json, Value};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command and print its JSON result to stdout
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let client = ApiClient::new(self.load_config()?)?;
        let output = self.execute(&client, cancel).await?;

        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &output).map_err(std::io::Error::from)?;
        writeln!(stdout)?;
        Ok(())
    }

    /// Run the command against `client` and return what would be printed
    pub async fn execute(&self, client: &ApiClient, cancel: &CancellationToken) -> Result<Value> {
        let shop = self.cli.shop;
        let query = &self.cli.query;

        match &self.cli.command {
            Commands::Token => {
                let token = cancellable(cancel, client.tokens().ensure_authenticated()).await?;
                Ok(json!({
                    "shops": token.scope,
                    "expires_at": token.expires_at,
                }))
            }

            Commands::Get { path } => {
                let value: Value = client.get_json(path, query, shop, cancel).await?;
                Ok(self.render(value))
            }

            Commands::List {
                path,
                max_pages,
                limit,
                ..
            } => {
                let max_pages = max_pages.unwrap_or(client.config().max_pages);
                let result = match limit {
                    Some(limit) => {
                        client
                            .list_until::<Value>(path, query, shop, *limit, max_pages, cancel)
                            .await?
                    }
                    None => {
                        client
                            .list_all::<Value>(path, query, shop, max_pages, cancel)
                            .await?
                    }
                };

                info!(
                    pages = result.metadata.pages_traversed,
                    records = result.metadata.records_retained,
                    elapsed_ms = result.metadata.elapsed.as_millis() as u64,
                    "List complete"
                );

                let items: Vec<Value> = result.items.into_iter().map(|v| self.render(v)).collect();
                Ok(json!({
                    "items": items,
                    "metadata": result.metadata,
                }))
            }
        }
    }

    /// Load the config from `--config` or the environment, applying CLI
    /// overrides
    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.cli.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::from_env()?,
        };

        if let Commands::List {
            page_size: Some(size),
            ..
        } = &self.cli.command
        {
            config.page_size = *size;
            config.validate()?;
        }
        Ok(config)
    }

    fn render(&self, value: Value) -> Value {
        if self.cli.raw {
            value
        } else {
            compact(value)
        }
    }
}
