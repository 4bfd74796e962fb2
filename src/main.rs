use redemption_service::observability::init_tracing;
use redemption_service::{config::Config, Application};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().expect("Failed to load configuration");

    init_tracing(&config.service_name, "info");

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
