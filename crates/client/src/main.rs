use anyhow::bail;
use ultimate_client::config::ClientConfig;
use ultimate_client::demo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let demo_mode = args.iter().any(|a| a == "--demo");
    let config = ClientConfig::from_args(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    if demo_mode {
        tracing::info!("Ultimate client -- scripted session demo as {}", config.username);
        let end = demo::run_demo(config).await?;
        tracing::info!("{}", end.reason);
        println!("{}", serde_json::to_string_pretty(&end.stats)?);
        return Ok(());
    }

    // The wire codec and socket are supplied by the embedding application,
    // which feeds a `Connection` and runs a `Driver` itself.
    bail!(
        "no transport for {}; run with --demo for a scripted session",
        config.server_address
    )
}
