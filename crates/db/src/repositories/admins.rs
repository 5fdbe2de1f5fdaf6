//! SQL adapters over the admins and categories tables.

use async_trait::async_trait;
use sqlx::Row;

use courtier_core::domain::portfolio::ConsultantId;
use courtier_core::repositories::{
    AoaCategoriesRepository, RepositoryResult, SalesAdminsRepository,
};

use super::backend;
use crate::DbPool;

pub struct SqlSalesAdminsRepository {
    pool: DbPool,
}

impl SqlSalesAdminsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SalesAdminsRepository for SqlSalesAdminsRepository {
    async fn sales_consultation_permitted(
        &self,
        consultant_id: ConsultantId,
    ) -> RepositoryResult<bool> {
        let row = sqlx::query(
            "SELECT sales_consultation FROM admins WHERE id = ? AND active = 1",
        )
        .bind(consultant_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row
            .map(|row| row.try_get::<bool, _>("sales_consultation"))
            .transpose()
            .map_err(backend)?
            .unwrap_or(false))
    }

    async fn active_sales_consultant_ids(&self) -> RepositoryResult<Vec<ConsultantId>> {
        let rows = sqlx::query("SELECT id FROM admins WHERE active = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|row| row.try_get("id").map(ConsultantId).map_err(backend))
            .collect()
    }
}

pub struct SqlAoaCategoriesRepository {
    pool: DbPool,
}

impl SqlAoaCategoriesRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AoaCategoriesRepository for SqlAoaCategoriesRepository {
    async fn categories_used_in_aoa(&self) -> RepositoryResult<Vec<String>> {
        let rows =
            sqlx::query("SELECT ident FROM categories WHERE used_in_aoa = 1 ORDER BY ident")
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;

        rows.iter().map(|row| row.try_get("ident").map_err(backend)).collect()
    }
}
