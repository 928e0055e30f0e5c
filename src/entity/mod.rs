pub mod commission_payout;
pub mod commission_record;
pub mod commission_rule;
pub mod sales_rep;

pub use commission_payout::PayoutStatus;
pub use commission_record::{RecordKind, RecordStatus};
pub use commission_rule::TargetType;
