use anyhow::Context;
use thebook_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load thebook settings")?;
    thebook_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        fixtures = ?settings.database.fixtures,
        "thebook-app bootstrap starting"
    );

    thebook_app::run(settings).await
}
