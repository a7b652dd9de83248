//! 读者信誉仓储

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::ReaderProfile;

/// 读者信誉仓储
pub struct ReaderProfileRepository {
    pool: PgPool,
}

impl ReaderProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, reader_id: i64) -> Result<Option<ReaderProfile>> {
        let profile = sqlx::query_as::<_, ReaderProfile>(
            r#"
            SELECT reader_id, reliability_score, reviews_expired, updated_at
            FROM reader_profiles
            WHERE reader_id = $1
            "#,
        )
        .bind(reader_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// 首次申请时建立信誉档案，已存在则不变
    pub async fn ensure_in_tx(
        conn: &mut PgConnection,
        reader_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reader_profiles (reader_id, reliability_score, reviews_expired, updated_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (reader_id) DO NOTHING
            "#,
        )
        .bind(reader_id)
        .bind(ReaderProfile::INITIAL_SCORE)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 记录一次过期：过期数加一，信誉分扣减且不低于 0
    pub async fn apply_expiration_in_tx(
        conn: &mut PgConnection,
        reader_id: i64,
        penalty: i32,
        now: DateTime<Utc>,
    ) -> Result<ReaderProfile> {
        let profile = sqlx::query_as::<_, ReaderProfile>(
            r#"
            INSERT INTO reader_profiles (reader_id, reliability_score, reviews_expired, updated_at)
            VALUES ($1, GREATEST(0, $2 - $3), 1, $4)
            ON CONFLICT (reader_id) DO UPDATE
            SET reviews_expired = reader_profiles.reviews_expired + 1,
                reliability_score = GREATEST(0, reader_profiles.reliability_score - $3),
                updated_at = $4
            RETURNING reader_id, reliability_score, reviews_expired, updated_at
            "#,
        )
        .bind(reader_id)
        .bind(ReaderProfile::INITIAL_SCORE)
        .bind(penalty)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(profile)
    }
}
