use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{entity::commission_payout, prelude::*};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PayoutEvent {
  Created {
    payout_id: i32,
    rep_id: i32,
    batch_number: String,
    total: Decimal,
    record_count: i32,
  },
  Approved {
    payout_id: i32,
    approver_id: i64,
  },
  Processed {
    payout_id: i32,
    payment_reference: String,
  },
}

impl PayoutEvent {
  pub fn created(payout: &commission_payout::Model) -> Self {
    Self::Created {
      payout_id: payout.id,
      rep_id: payout.rep_id,
      batch_number: payout.batch_number.clone(),
      total: payout.total(),
      record_count: payout.record_count,
    }
  }

  pub fn payout_id(&self) -> i32 {
    match self {
      Self::Created { payout_id, .. }
      | Self::Approved { payout_id, .. }
      | Self::Processed { payout_id, .. } => *payout_id,
    }
  }
}

/// Receives payout events after the change is committed.
///
/// Delivery is best effort: a notifier cannot fail the operation.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn notify(&self, event: PayoutEvent);
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
  async fn notify(&self, event: PayoutEvent) {
    match json::to_string(&event) {
      Ok(line) => info!(target: "commission::payout", "{line}"),
      Err(err) => {
        warn!("Failed to encode event for payout #{}: {err}", event.payout_id())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::fixtures::d;

  #[test]
  fn test_event_wire_format() {
    let event = PayoutEvent::Created {
      payout_id: 3,
      rep_id: 9,
      batch_number: "CP-202407-0009-deadbeef".into(),
      total: d("125.50"),
      record_count: 4,
    };

    let value = json::to_value(&event).unwrap();
    assert_eq!(value["event"], "created");
    assert_eq!(value["total"], "125.50");
    assert_eq!(value["record_count"], 4);

    let processed: PayoutEvent = json::from_str(
      r#"{"event":"processed","payout_id":3,"payment_reference":"TX-1"}"#,
    )
    .unwrap();
    assert_eq!(processed.payout_id(), 3);
  }
}
