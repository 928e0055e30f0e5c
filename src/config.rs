use std::env;

use anyhow::Context;

use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  /// Extra attempts after a lost payout claim.
  pub claim_retries: u32,
  pub claim_backoff: Duration,
  /// Use the rep's direct rate when no rule matches an order item.
  pub rep_rate_fallback: bool,
  pub delayed_threshold_days: u32,
  pub delayed_check_interval: Duration,
  pub monthly_batch: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_url: "sqlite:commission.db?mode=rwc".into(),
      claim_retries: 3,
      claim_backoff: Duration::from_millis(25),
      rep_rate_fallback: false,
      delayed_threshold_days: 30,
      delayed_check_interval: Duration::from_secs(24 * 3600),
      monthly_batch: true,
    }
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let default = Self::default();

    Ok(Self {
      database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),
      claim_retries: parse_var("CLAIM_RETRIES")?
        .unwrap_or(default.claim_retries),
      claim_backoff: duration_var("CLAIM_BACKOFF")?
        .unwrap_or(default.claim_backoff),
      rep_rate_fallback: parse_var("REP_RATE_FALLBACK")?
        .unwrap_or(default.rep_rate_fallback),
      delayed_threshold_days: parse_var("DELAYED_THRESHOLD_DAYS")?
        .unwrap_or(default.delayed_threshold_days),
      delayed_check_interval: duration_var("DELAYED_CHECK_INTERVAL")?
        .unwrap_or(default.delayed_check_interval),
      monthly_batch: parse_var("MONTHLY_BATCH")?
        .unwrap_or(default.monthly_batch),
    })
  }
}

fn parse_var<T>(key: &str) -> anyhow::Result<Option<T>>
where
  T: std::str::FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match env::var(key) {
    Ok(raw) if !raw.trim().is_empty() => raw
      .trim()
      .parse()
      .map(Some)
      .with_context(|| format!("Invalid {key}: {raw}")),
    _ => Ok(None),
  }
}

fn duration_var(key: &str) -> anyhow::Result<Option<Duration>> {
  match env::var(key) {
    Ok(raw) if !raw.trim().is_empty() => humantime::parse_duration(raw.trim())
      .map(Some)
      .with_context(|| format!("Invalid {key}: {raw} (e.g. 25ms, 24h)")),
    _ => Ok(None),
  }
}
