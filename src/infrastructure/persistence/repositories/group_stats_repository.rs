//! Repository for group statistics

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, Set, Statement,
};

use crate::infrastructure::persistence::entities::group_stats;
use crate::infrastructure::persistence::error::DbError;

/// Repository for group statistics operations
#[derive(Clone, Debug)]
pub struct GroupStatsRepository {
    conn: Arc<DatabaseConnection>,
}

impl GroupStatsRepository {
    /// Create a new GroupStatsRepository
    pub fn new(conn: Arc<DatabaseConnection>) -> Self {
        Self { conn }
    }

    /// Asset ids belonging to a group (membership lives in assets.groups)
    pub async fn find_asset_ids_in_group(&self, group_slug: &str) -> Result<Vec<i64>, DbError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT id FROM assets WHERE groups @> $1::jsonb"#,
            [serde_json::json!([group_slug]).to_string().into()],
        );

        let rows = self.conn.query_all(stmt).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get::<i64>("", "id")?);
        }
        Ok(ids)
    }

    /// Write the recomputed stats row for a group
    pub async fn upsert(
        &self,
        group_slug: &str,
        floor_price: Option<Decimal>,
        sale_volume: Decimal,
        sale_count: i64,
    ) -> Result<(), DbError> {
        let now = Utc::now().fixed_offset();
        let existing = group_stats::Entity::find_by_id(group_slug.to_string())
            .one(self.conn.as_ref())
            .await?;

        match existing {
            Some(stats) => {
                let mut active: group_stats::ActiveModel = stats.into();
                active.floor_price = Set(floor_price);
                active.sale_volume = Set(sale_volume);
                active.sale_count = Set(sale_count);
                active.updated_at = Set(now);
                active.update(self.conn.as_ref()).await?;
            }
            None => {
                let model = group_stats::ActiveModel {
                    group_slug: Set(group_slug.to_string()),
                    floor_price: Set(floor_price),
                    sale_volume: Set(sale_volume),
                    sale_count: Set(sale_count),
                    updated_at: Set(now),
                };
                model.insert(self.conn.as_ref()).await?;
            }
        }
        Ok(())
    }
}
