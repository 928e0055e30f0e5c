use async_trait::async_trait;
use sea_orm::ActiveValue::NotSet;

use crate::{entity::sales_rep, money, prelude::*};

/// Read-only view of the rep hierarchy used during commission calculation.
#[async_trait]
pub trait RepLookup: Send + Sync {
  async fn by_id(&self, id: i32) -> Result<Option<sales_rep::Model>>;
}

pub struct Reps<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Clone)]
pub struct NewRep {
  pub name: String,
  pub email: Option<String>,
  pub territory: Option<String>,
  pub direct_rate: Decimal,
  pub parent_share: Decimal,
  pub parent_rep_id: Option<i32>,
}

impl NewRep {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      email: None,
      territory: None,
      direct_rate: Decimal::ZERO,
      parent_share: Decimal::from(50),
      parent_rep_id: None,
    }
  }
}

impl<'a> Reps<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get(&self, id: i32) -> Result<sales_rep::Model> {
    sales_rep::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::RepNotFound)
  }

  pub async fn active(&self) -> Result<Vec<sales_rep::Model>> {
    Ok(
      sales_rep::Entity::find()
        .filter(sales_rep::Column::IsActive.eq(true))
        .order_by_asc(sales_rep::Column::Id)
        .all(self.db)
        .await?,
    )
  }

  pub async fn sub_reps(&self, parent_id: i32) -> Result<Vec<sales_rep::Model>> {
    Ok(
      sales_rep::Entity::find()
        .filter(sales_rep::Column::ParentRepId.eq(parent_id))
        .filter(sales_rep::Column::IsActive.eq(true))
        .all(self.db)
        .await?,
    )
  }

  pub async fn create(&self, rep: NewRep) -> Result<sales_rep::Model> {
    if rep.name.trim().is_empty() {
      return Err(Error::InvalidArgs("Rep name must not be empty".into()));
    }

    let direct = money::to_bp(money::percent(rep.direct_rate, "direct rate")?)?;
    let share =
      money::to_bp(money::percent(rep.parent_share, "parent share")?)?;

    if let Some(parent_id) = rep.parent_rep_id {
      let parent = self.get(parent_id).await?;
      if !parent.is_active {
        return Err(Error::RepInactive(parent_id));
      }
    }

    let now = Utc::now().naive_utc();
    let model = sales_rep::ActiveModel {
      id: NotSet,
      name: Set(rep.name),
      email: Set(rep.email),
      territory: Set(rep.territory),
      commission_rate_direct_bp: Set(direct),
      parent_share_bp: Set(share),
      parent_rep_id: Set(rep.parent_rep_id),
      is_active: Set(true),
      created_at: Set(now),
    }
    .insert(self.db)
    .await?;

    info!("Created sales rep #{} ({})", model.id, model.name);
    Ok(model)
  }

  /// Re-parent a rep, refusing links that would make it its own ancestor.
  pub async fn set_parent(
    &self,
    rep_id: i32,
    parent_id: Option<i32>,
  ) -> Result<sales_rep::Model> {
    let rep = self.get(rep_id).await?;

    if let Some(parent_id) = parent_id {
      let mut seen = HashSet::new();
      let mut cursor = Some(parent_id);

      while let Some(id) = cursor {
        if id == rep_id {
          return Err(Error::HierarchyCycle(rep_id));
        }
        if !seen.insert(id) {
          // pre-existing loop above us, not ours to fix
          warn!("Rep hierarchy already cyclic around #{}", id);
          return Err(Error::HierarchyCycle(id));
        }
        cursor = self.get(id).await?.parent_rep_id;
      }
    }

    Ok(
      sales_rep::ActiveModel { parent_rep_id: Set(parent_id), ..rep.into() }
        .update(self.db)
        .await?,
    )
  }

  /// Soft delete; history keeps pointing at the row.
  pub async fn deactivate(&self, rep_id: i32) -> Result<()> {
    let rep = self.get(rep_id).await?;

    sales_rep::ActiveModel { is_active: Set(false), ..rep.into() }
      .update(self.db)
      .await?;

    Ok(())
  }
}

#[async_trait]
impl RepLookup for Reps<'_> {
  async fn by_id(&self, id: i32) -> Result<Option<sales_rep::Model>> {
    Ok(sales_rep::Entity::find_by_id(id).one(self.db).await?)
  }
}
