use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::models::{Interaction, PostFeatures, UserFeatures};

/// Calendar features appended to every scoring row, in this order.
pub const TIME_COLUMNS: [&str; 3] = ["hour", "dayofweek", "month"];

/// Source of the three feature tables the store is built from.
///
/// Production uses the Postgres implementation in `db::postgres`; tests
/// provide fixture rows directly.
#[async_trait]
pub trait FeatureSource {
    async fn load_interactions(&self) -> AppResult<Vec<Interaction>>;
    async fn load_post_features(&self) -> AppResult<Vec<PostFeatures>>;
    async fn load_user_features(&self) -> AppResult<Vec<UserFeatures>>;
}

/// Validated shape of a combined scoring row.
///
/// A row is the post's feature columns, then the user's, then the three
/// time columns. The shape is fixed once at build time so the per-request
/// join is a plain concatenation with no name resolution; any column-name
/// collision between the three groups is rejected here, not silently
/// overwritten at request time.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    post_columns: Vec<String>,
    user_columns: Vec<String>,
}

impl FeatureSchema {
    fn new(post_columns: Vec<String>, user_columns: Vec<String>) -> AppResult<Self> {
        let mut seen: HashSet<&str> = HashSet::new();
        for name in post_columns
            .iter()
            .map(String::as_str)
            .chain(user_columns.iter().map(String::as_str))
            .chain(TIME_COLUMNS)
        {
            if !seen.insert(name) {
                return Err(AppError::Config(format!(
                    "feature column name collision: '{}'",
                    name
                )));
            }
        }

        Ok(Self {
            post_columns,
            user_columns,
        })
    }

    /// All column names of a combined row, in row order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.post_columns
            .iter()
            .map(String::as_str)
            .chain(self.user_columns.iter().map(String::as_str))
            .chain(TIME_COLUMNS)
    }

    /// Number of columns in a combined row
    pub fn width(&self) -> usize {
        self.post_columns.len() + self.user_columns.len() + TIME_COLUMNS.len()
    }
}

/// A post with its feature values aligned to the schema's post columns
#[derive(Debug, Clone)]
pub struct StoredPost {
    pub post_id: i64,
    pub text: String,
    pub topic: String,
    pub values: Vec<f32>,
}

/// The immutable in-memory feature snapshot the service runs on.
///
/// Built once at startup, shared read-only across requests; every lookup
/// is a prebuilt index, so the hot path never scans a table.
pub struct FeatureStore {
    schema: FeatureSchema,
    posts: Vec<StoredPost>,
    post_index: HashMap<i64, usize>,
    users: HashMap<i64, Vec<f32>>,
    liked: HashMap<i64, HashSet<i64>>,
}

impl FeatureStore {
    /// Pulls the three tables from a source and builds the store.
    ///
    /// Called once at startup; a failure here must prevent the service from
    /// accepting any traffic.
    pub async fn load<S: FeatureSource + Sync>(source: &S) -> AppResult<Self> {
        tracing::info!("Loading liked posts");
        let interactions = source.load_interactions().await?;

        tracing::info!("Loading post features");
        let posts = source.load_post_features().await?;

        tracing::info!("Loading user features");
        let users = source.load_user_features().await?;

        Self::build(interactions, posts, users)
    }

    /// Validates the raw tables and builds the indexes.
    pub fn build(
        interactions: Vec<Interaction>,
        posts: Vec<PostFeatures>,
        users: Vec<UserFeatures>,
    ) -> AppResult<Self> {
        let post_columns = table_columns(posts.iter().map(|p| &p.features), "post")?;
        let user_columns = table_columns(users.iter().map(|u| &u.features), "user")?;
        let schema = FeatureSchema::new(post_columns, user_columns)?;

        let mut stored_posts = Vec::with_capacity(posts.len());
        let mut post_index = HashMap::with_capacity(posts.len());
        for post in posts {
            if post_index.insert(post.post_id, stored_posts.len()).is_some() {
                return Err(AppError::Config(format!(
                    "duplicate post_id {} in post feature table",
                    post.post_id
                )));
            }
            stored_posts.push(StoredPost {
                post_id: post.post_id,
                text: post.text,
                topic: post.topic,
                values: post.features.into_iter().map(|(_, v)| v).collect(),
            });
        }

        let mut user_index = HashMap::with_capacity(users.len());
        for user in users {
            let values: Vec<f32> = user.features.into_iter().map(|(_, v)| v).collect();
            if user_index.insert(user.user_id, values).is_some() {
                return Err(AppError::Config(format!(
                    "duplicate user_id {} in user feature table",
                    user.user_id
                )));
            }
        }

        // Index likes by user so exclusion is a set lookup, not a scan
        // over the full interaction history on every request.
        let mut liked: HashMap<i64, HashSet<i64>> = HashMap::new();
        for interaction in interactions {
            liked
                .entry(interaction.user_id)
                .or_default()
                .insert(interaction.post_id);
        }

        tracing::info!(
            posts = stored_posts.len(),
            users = user_index.len(),
            users_with_likes = liked.len(),
            columns = schema.width(),
            "Feature store built"
        );

        Ok(Self {
            schema,
            posts: stored_posts,
            post_index,
            users: user_index,
            liked,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// All posts, in table order
    pub fn posts(&self) -> &[StoredPost] {
        &self.posts
    }

    /// Looks up a single post by id
    pub fn post(&self, post_id: i64) -> Option<&StoredPost> {
        self.post_index.get(&post_id).map(|&i| &self.posts[i])
    }

    /// The user's feature values, aligned to the schema's user columns
    pub fn user_features(&self, user_id: i64) -> Option<&[f32]> {
        self.users.get(&user_id).map(Vec::as_slice)
    }

    /// Posts the user has already liked; `None` when the user has none
    pub fn liked_by(&self, user_id: i64) -> Option<&HashSet<i64>> {
        self.liked.get(&user_id)
    }
}

/// Derives the column list of a table and checks every row matches it.
fn table_columns<'a, I>(mut rows: I, table: &str) -> AppResult<Vec<String>>
where
    I: Iterator<Item = &'a Vec<(String, f32)>>,
{
    let columns: Vec<String> = match rows.next() {
        Some(first) => first.iter().map(|(name, _)| name.clone()).collect(),
        None => return Ok(Vec::new()),
    };

    for (offset, row) in rows.enumerate() {
        let matches = row.len() == columns.len()
            && row.iter().zip(&columns).all(|((name, _), col)| name == col);
        if !matches {
            return Err(AppError::Config(format!(
                "malformed {} feature table: row {} does not match the first row's columns",
                table,
                offset + 1
            )));
        }
    }

    Ok(columns)
}
