use std::sync::Arc;

use async_trait::async_trait;
use tokio::time;

use crate::{
  plugins::Plugin,
  prelude::*,
  state::AppState,
  sv::{month_bounds, previous_month},
};

/// Batches the previous month into payouts right after each month starts.
pub struct MonthlyBatch;

#[async_trait]
impl Plugin for MonthlyBatch {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    if !app.config.monthly_batch {
      info!("Monthly payout batch disabled via config");
      return Ok(());
    }

    loop {
      let now = Utc::now().naive_utc();
      let (_, next_month) = month_bounds(now.date());

      let sleep_duration =
        (next_month - now).to_std().unwrap_or(Duration::from_secs(3600));

      info!(
        "Next payout batch in {} hours",
        sleep_duration.as_secs() / 3600
      );
      time::sleep(sleep_duration).await;

      let (start, end) = previous_month(Utc::now().date_naive());
      match app.engine().run_monthly_batch(start, end).await {
        Ok(payouts) => info!("Monthly batch done: {} payouts", payouts.len()),
        Err(e) => error!("Monthly batch failed: {}", e),
      }
    }
  }
}

/// Periodically reports pending commissions nobody approved in time.
pub struct DelayedCommissions;

#[async_trait]
impl Plugin for DelayedCommissions {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let every = app.config.delayed_check_interval;
    if every.is_zero() {
      info!("Delayed commission check disabled via config (0 interval)");
      return Ok(());
    }

    info!(
      "Delayed commission check started (every {}, threshold {} days)",
      humantime::format_duration(every),
      app.config.delayed_threshold_days
    );

    let mut interval = time::interval(every);
    loop {
      interval.tick().await;

      if let Err(e) = report_delayed(&app, Utc::now().naive_utc()).await {
        error!("Delayed commission check failed: {}", e);
      }
    }
  }
}

/// Logs one line per rep with stale pending records, returns the number of
/// reps affected.
async fn report_delayed(app: &AppState, now: DateTime) -> anyhow::Result<usize> {
  let stale = app
    .sv()
    .ledger
    .stale(app.config.delayed_threshold_days, now)
    .await?;

  let mut by_rep: HashMap<i32, (usize, Decimal, DateTime)> = HashMap::new();
  for record in &stale {
    let entry =
      by_rep.entry(record.rep_id).or_insert((0, Decimal::ZERO, now));
    entry.0 += 1;
    entry.1 += record.amount();
    entry.2 = entry.2.min(record.calculation_date);
  }

  for (rep_id, (count, amount, oldest)) in &by_rep {
    warn!(
      "Rep #{}: {} pending commissions ({}) waiting since {}",
      rep_id, count, amount, oldest
    );
  }

  if by_rep.is_empty() {
    debug!("No delayed commissions");
  }
  Ok(by_rep.len())
}
