use anyhow::Result;
use clap::Parser;
use relay_engine::core::probe_encoder;
use relay_orchestrator::{init_tracing, Command, Config, ProbeArgs, RelayService, RunArgs};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();
	let config = Config::parse();
	init_tracing(&config);

	match &config.command {
		Command::Probe(args) => probe(&config, args).await,
		Command::Run(args) => run(&config, args).await,
	}
}

async fn probe(config: &Config, args: &ProbeArgs) -> Result<()> {
	let version = probe_encoder(&config.encoder_path, Duration::from_millis(args.timeout_ms)).await?;
	println!("{} {}", config.encoder_path, version);
	Ok(())
}

async fn run(config: &Config, args: &RunArgs) -> Result<()> {
	tracing::info!("🎬 Starting relay orchestrator");

	let service = RelayService::build(config, args.dry_run).await?;

	// Setup signal handling for graceful shutdown
	let service_shutdown = service.clone();
	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => {
				tracing::info!("🛑 Received shutdown signal (Ctrl+C)");
				service_shutdown.shutdown();
			}
			Err(e) => {
				tracing::error!("Failed to listen for shutdown signal: {}", e);
			}
		}
	});

	if let Err(e) = service.run(args).await {
		tracing::error!("❌ Service error: {}", e);
		return Err(e);
	}

	tracing::info!("👋 Relay orchestrator stopped gracefully");
	Ok(())
}
