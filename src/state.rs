use crate::{
  config::Config,
  prelude::*,
  sv::{Claims, Engine, Ledger, Payouts, Rates, Reconciler, Reps},
};

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub claims: Claims,
}

pub struct Services<'a> {
  pub rep: Reps<'a>,
  pub rate: Rates<'a>,
  pub ledger: Ledger<'a>,
  pub payout: Payouts<'a>,
  pub reconcile: Reconciler<'a>,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    let db = Database::connect(config.database_url.as_str()).await?;
    migration::Migrator::up(&db, None).await?;

    info!("Database ready at {}", config.database_url);
    Ok(Self::with_db(db, config))
  }

  pub fn with_db(db: DatabaseConnection, config: Config) -> Self {
    let claims = Claims::from_config(&config);
    Self { db, config, claims }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      rep: Reps::new(&self.db),
      rate: Rates::new(&self.db),
      ledger: Ledger::new(&self.db),
      payout: Payouts::new(&self.db, &self.claims),
      reconcile: Reconciler::new(&self.db),
    }
  }

  pub fn engine(&self) -> Engine<'_> {
    Engine::new(&self.db, &self.claims, &self.config)
  }
}
