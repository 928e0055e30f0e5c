use std::sync::Arc;

use commission::{
  config::Config,
  plugins::{App, cron},
  prelude::*,
  state::AppState,
};
use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "commission=debug,sea_orm=warn".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;

  info!("Starting commission engine v{}", env!("CARGO_PKG_VERSION"));

  let app_state = Arc::new(AppState::new(config).await?);

  App::new()
    .register(cron::MonthlyBatch)
    .register(cron::DelayedCommissions)
    .run(app_state)
    .await;

  Ok(())
}
