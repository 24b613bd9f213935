use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};

use crate::error::{AppError, AppResult};
use crate::models::{Interaction, PostFeatures, UserFeatures};
use crate::services::store::FeatureSource;

/// Interaction history is large; page it in fixed chunks instead of
/// materializing the query result in one round trip.
const INTERACTION_CHUNK_SIZE: i64 = 200_000;

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for the startup load.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Loads the three feature tables from Postgres.
///
/// Feature columns are not known statically (the post table carries the
/// TF-IDF columns produced by the offline pipeline), so rows are decoded
/// dynamically: the id and display columns by name, everything else as a
/// named numeric feature.
pub struct PgFeatureSource {
    pool: PgPool,
}

impl PgFeatureSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeatureSource for PgFeatureSource {
    async fn load_interactions(&self) -> AppResult<Vec<Interaction>> {
        let mut interactions = Vec::new();
        let mut offset: i64 = 0;

        loop {
            let rows = sqlx::query(
                "SELECT user_id, post_id \
                 FROM (SELECT DISTINCT user_id, post_id FROM feed_data WHERE action = 'like') likes \
                 ORDER BY user_id, post_id \
                 LIMIT $1 OFFSET $2",
            )
            .bind(INTERACTION_CHUNK_SIZE)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

            let fetched = rows.len();
            for row in &rows {
                interactions.push(Interaction {
                    user_id: get_id(row, "user_id")?,
                    post_id: get_id(row, "post_id")?,
                });
            }
            tracing::info!(chunk = fetched, total = interactions.len(), "Got interaction chunk");

            if (fetched as i64) < INTERACTION_CHUNK_SIZE {
                break;
            }
            offset += fetched as i64;
        }

        Ok(interactions)
    }

    async fn load_post_features(&self) -> AppResult<Vec<PostFeatures>> {
        let rows = sqlx::query("SELECT * FROM post_processed_features")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode_post_row).collect()
    }

    async fn load_user_features(&self) -> AppResult<Vec<UserFeatures>> {
        let rows = sqlx::query("SELECT * FROM user_data")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode_user_row).collect()
    }
}

fn decode_post_row(row: &PgRow) -> AppResult<PostFeatures> {
    let mut post_id = None;
    let mut text = None;
    let mut topic = None;
    let mut features = Vec::new();

    for column in row.columns() {
        match column.name() {
            "post_id" => post_id = Some(get_id(row, "post_id")?),
            "text" => text = Some(row.try_get::<String, _>(column.ordinal())?),
            "topic" => topic = Some(row.try_get::<String, _>(column.ordinal())?),
            name => features.push((name.to_string(), get_feature(row, column.ordinal())?)),
        }
    }

    Ok(PostFeatures {
        post_id: post_id
            .ok_or_else(|| AppError::Config("post feature table has no post_id column".into()))?,
        text: text
            .ok_or_else(|| AppError::Config("post feature table has no text column".into()))?,
        topic: topic
            .ok_or_else(|| AppError::Config("post feature table has no topic column".into()))?,
        features,
    })
}

fn decode_user_row(row: &PgRow) -> AppResult<UserFeatures> {
    let mut user_id = None;
    let mut features = Vec::new();

    for column in row.columns() {
        match column.name() {
            "user_id" => user_id = Some(get_id(row, "user_id")?),
            name => features.push((name.to_string(), get_feature(row, column.ordinal())?)),
        }
    }

    Ok(UserFeatures {
        user_id: user_id
            .ok_or_else(|| AppError::Config("user feature table has no user_id column".into()))?,
        features,
    })
}

/// Decodes an id column regardless of its integer width
fn get_id(row: &PgRow, name: &str) -> AppResult<i64> {
    let column = row
        .columns()
        .iter()
        .find(|c| c.name() == name)
        .ok_or_else(|| AppError::Config(format!("row has no '{}' column", name)))?;

    let value = match column.type_info().name() {
        "INT8" => row.try_get::<i64, _>(column.ordinal())?,
        "INT4" => i64::from(row.try_get::<i32, _>(column.ordinal())?),
        "INT2" => i64::from(row.try_get::<i16, _>(column.ordinal())?),
        other => {
            return Err(AppError::Config(format!(
                "column '{}' has non-integer type {}",
                name, other
            )))
        }
    };
    Ok(value)
}

/// Decodes a feature column to f32, accepting the numeric types the
/// offline pipeline produces.
fn get_feature(row: &PgRow, ordinal: usize) -> AppResult<f32> {
    let column = &row.columns()[ordinal];
    let value = match column.type_info().name() {
        "FLOAT8" => row.try_get::<f64, _>(ordinal)? as f32,
        "FLOAT4" => row.try_get::<f32, _>(ordinal)?,
        "INT8" => row.try_get::<i64, _>(ordinal)? as f32,
        "INT4" => row.try_get::<i32, _>(ordinal)? as f32,
        "INT2" => f32::from(row.try_get::<i16, _>(ordinal)?),
        "BOOL" => {
            if row.try_get::<bool, _>(ordinal)? {
                1.0
            } else {
                0.0
            }
        }
        other => {
            return Err(AppError::Config(format!(
                "feature column '{}' has unsupported type {}",
                column.name(),
                other
            )))
        }
    };
    Ok(value)
}
