use sea_orm::{ActiveValue::NotSet, Condition};

use crate::{
  entity::{TargetType, commission_rule},
  money,
  prelude::*,
};

/// Resolves commission percentages from time-bounded rules and manages
/// the rules themselves.
pub struct Rates<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Clone)]
pub struct NewRule {
  pub target_type: TargetType,
  pub target_id: i64,
  pub rate: Decimal,
  pub valid_from: DateTime,
  pub valid_to: Option<DateTime>,
  pub description: Option<String>,
}

impl<'a> Rates<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// The rule in force for `target` at `at`.
  ///
  /// Overlapping windows are a data-quality problem; the latest
  /// `valid_from` wins and the overlap is logged.
  pub async fn resolve_rule(
    &self,
    target: TargetType,
    target_id: i64,
    at: DateTime,
  ) -> Result<commission_rule::Model> {
    let mut rules = commission_rule::Entity::find()
      .filter(commission_rule::Column::TargetType.eq(target))
      .filter(commission_rule::Column::TargetId.eq(target_id))
      .filter(commission_rule::Column::IsActive.eq(true))
      .filter(commission_rule::Column::DeletedAt.is_null())
      .filter(commission_rule::Column::ValidFrom.lte(at))
      .filter(
        Condition::any()
          .add(commission_rule::Column::ValidTo.is_null())
          .add(commission_rule::Column::ValidTo.gt(at)),
      )
      .order_by_desc(commission_rule::Column::ValidFrom)
      .order_by_desc(commission_rule::Column::Id)
      .all(self.db)
      .await?;

    if rules.len() > 1 {
      let ids: Vec<i32> = rules.iter().map(|r| r.id).collect();
      warn!(
        "Overlapping commission rules {:?} for {:?} #{} at {}, using #{}",
        ids, target, target_id, at, ids[0]
      );
    }

    if rules.is_empty() {
      return Err(Error::RateNotFound { target, target_id, at });
    }

    Ok(rules.swap_remove(0))
  }

  pub async fn resolve(
    &self,
    target: TargetType,
    target_id: i64,
    at: DateTime,
  ) -> Result<Decimal> {
    Ok(self.resolve_rule(target, target_id, at).await?.rate())
  }

  /// Live rules of a target, oldest window first.
  pub async fn by_target(
    &self,
    target: TargetType,
    target_id: i64,
  ) -> Result<Vec<commission_rule::Model>> {
    Ok(
      commission_rule::Entity::find()
        .filter(commission_rule::Column::TargetType.eq(target))
        .filter(commission_rule::Column::TargetId.eq(target_id))
        .filter(commission_rule::Column::IsActive.eq(true))
        .filter(commission_rule::Column::DeletedAt.is_null())
        .order_by_asc(commission_rule::Column::ValidFrom)
        .all(self.db)
        .await?,
    )
  }

  pub async fn create(&self, rule: NewRule) -> Result<commission_rule::Model> {
    let rate_bp = money::to_bp(money::percent(rule.rate, "rate")?)?;

    if let Some(to) = rule.valid_to
      && to <= rule.valid_from
    {
      return Err(Error::InvalidArgs(format!(
        "Rule window ends ({to}) before it starts ({})",
        rule.valid_from
      )));
    }

    let txn = self.db.begin().await?;

    let live = commission_rule::Entity::find()
      .filter(commission_rule::Column::TargetType.eq(rule.target_type))
      .filter(commission_rule::Column::TargetId.eq(rule.target_id))
      .filter(commission_rule::Column::IsActive.eq(true))
      .filter(commission_rule::Column::DeletedAt.is_null())
      .all(&txn)
      .await?;

    if let Some(clash) =
      live.iter().find(|r| r.overlaps(rule.valid_from, rule.valid_to))
    {
      return Err(Error::RuleOverlap(clash.id));
    }

    let now = Utc::now().naive_utc();
    let model = commission_rule::ActiveModel {
      id: NotSet,
      target_type: Set(rule.target_type),
      target_id: Set(rule.target_id),
      rate_bp: Set(rate_bp),
      valid_from: Set(rule.valid_from),
      valid_to: Set(rule.valid_to),
      is_active: Set(true),
      description: Set(rule.description),
      created_at: Set(now),
      deleted_at: Set(None),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
      "Commission rule #{} for {:?} #{}: {}% from {}",
      model.id,
      model.target_type,
      model.target_id,
      model.rate(),
      model.valid_from
    );
    Ok(model)
  }

  /// Soft delete, keeping the row for payout audits.
  pub async fn deactivate(&self, rule_id: i32) -> Result<()> {
    let rule = commission_rule::Entity::find_by_id(rule_id)
      .one(self.db)
      .await?
      .ok_or(Error::RuleNotFound)?;

    commission_rule::ActiveModel {
      is_active: Set(false),
      deleted_at: Set(Some(Utc::now().naive_utc())),
      ..rule.into()
    }
    .update(self.db)
    .await?;

    Ok(())
  }
}
