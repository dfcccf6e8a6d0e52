mod cli;
mod webhdfs;

use std::sync::Arc;
use std::time::Duration;

pub use cli::HdfsCliClient;
pub use webhdfs::WebHdfsClient;

use crate::config::{Config, StoreClientMode};
use crate::services::traits::StoreClient;

pub fn build_store_client(cfg: &Config) -> Result<Arc<dyn StoreClient>, String> {
    let timeout = Duration::from_secs(cfg.remote_timeout_secs);
    let client: Arc<dyn StoreClient> = match cfg.hdfs_client_mode {
        StoreClientMode::WebHdfs => Arc::new(WebHdfsClient::new(&cfg.hdfs_api_url, &cfg.hdfs_user, timeout)?),
        StoreClientMode::Cli => Arc::new(HdfsCliClient::new(cfg.hdfs_cli_command.clone(), timeout)?),
    };
    Ok(client)
}
