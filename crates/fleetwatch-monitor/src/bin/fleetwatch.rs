use anyhow::Result;
use clap::Parser;
use fleetwatch_config::ConfigLoader;
use fleetwatch_logging::init_logging;
use fleetwatch_monitor::{build_cycle, MonitorService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fleet metric threshold alerting")]
struct Args {
    /// 配置文件路径
    #[arg(long, default_value = "config/fleetwatch.toml")]
    config: PathBuf,

    /// 只执行一个周期，输出结果 JSON
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::new(&args.config).load_validated()?;
    let _ = init_logging(&config.logging);

    info!("Starting fleetwatch with config {}", args.config.display());

    let cycle = Arc::new(build_cycle(&config).await?);
    let service = Arc::new(MonitorService::new(cycle, config.schedule.interval_secs));

    if args.once {
        let report = service.run_once().await;
        println!("{}", report.to_json()?);
        if report.status_code >= 500 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let handle = service.clone().start_monitoring_task();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    handle.shutdown().await;

    Ok(())
}
