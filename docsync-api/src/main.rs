use anyhow::Context;
use docsync_api::startup::Application;
use docsync_config::load_config;
use docsync_config::shared::ApiConfig;
use docsync_telemetry::tracing::init_tracing;
use tracing::info;

/// Entry point of the docsync query server.
fn main() -> anyhow::Result<()> {
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    actix_web::rt::System::new().block_on(async_main())?;

    Ok(())
}

async fn async_main() -> anyhow::Result<()> {
    let config = load_config::<ApiConfig>().context("loading query server configuration")?;
    config.validate().context("validating query server configuration")?;

    info!(
        host = %config.application.host,
        port = config.application.port,
        index_url = %config.index.url,
        index = %config.index.index,
        "starting query server"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
