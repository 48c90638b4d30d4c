use anyhow::Context;
use shelf_domain::config::AppConfig;
use shelf_kernel::config::load_config;
use shelf_logger::{LogFormat, Logger};
use shelf_server::Server;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg: AppConfig =
        load_config(config_path.as_ref()).context("Critical: Configuration is malformed")?;

    let log = &cfg.log;
    let mut logger = Logger::builder()
        .name(env!("CARGO_PKG_NAME"))
        .level_str(&log.level)?
        .format(if log.json { LogFormat::Json } else { LogFormat::Compact });
    if let Some(filter) = &log.filter {
        logger = logger.directives(filter);
    }
    if let Some(dir) = &log.path {
        logger = logger.path(dir);
    }
    let _log = logger.init()?;

    Server::builder().config(cfg).build().await?.run().await
}
