pub mod engine;
pub mod ledger;
pub mod notify;
pub mod payout;
pub mod rate;
pub mod reconcile;
pub mod rep;
pub mod split;
#[cfg(test)]
pub mod test_utils;

pub use engine::{Engine, month_bounds, previous_month};
pub use ledger::{CommissionSummary, Ledger, OrderItem, StatusTotal};
pub use notify::{LogNotifier, Notifier, PayoutEvent};
pub use payout::{Claims, Payouts};
pub use rate::{NewRule, Rates};
pub use reconcile::Reconciler;
pub use rep::{NewRep, RepLookup, Reps};
pub use split::Split;
