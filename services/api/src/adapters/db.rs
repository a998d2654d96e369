//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use critique_core::domain::{
    Category, Comment, Genre, NewTitle, NewUser, Review, Title, TitleFilter, TitlePatch, User,
    UserPatch,
};
use critique_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Extracts the violated unique constraint name from a driver error, if any.
fn unique_violation(e: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            return db_err.constraint().map(|c| c.to_string());
        }
    }
    None
}

/// Extracts the violated foreign-key constraint name from a driver error.
fn fk_violation(e: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = e {
        if db_err.code().as_deref() == Some("23503") {
            return db_err.constraint().map(|c| c.to_string());
        }
    }
    None
}

/// Escapes the `LIKE` wildcard characters of a user-supplied fragment.
fn escape_like(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Builds a `LIKE`/`ILIKE` pattern matching `fragment` anywhere.
fn like_pattern(fragment: &str) -> String {
    format!("%{}%", escape_like(fragment))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    bio: String,
    role: String,
    is_superuser: bool,
    confirmation_code: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let role = self
            .role
            .parse()
            .map_err(|_| PortError::Unexpected(format!("unknown role '{}' in users table", self.role)))?;
        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
            role,
            is_superuser: self.is_superuser,
            confirmation_code: self.confirmation_code,
        })
    }
}

#[derive(FromRow)]
struct CategoryRecord {
    id: Uuid,
    name: String,
    slug: String,
}
impl CategoryRecord {
    fn to_domain(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
            slug: self.slug,
        }
    }
}

#[derive(FromRow)]
struct GenreRecord {
    id: Uuid,
    name: String,
    slug: String,
}
impl GenreRecord {
    fn to_domain(self) -> Genre {
        Genre {
            id: self.id,
            name: self.name,
            slug: self.slug,
        }
    }
}

/// One row of the title read model: the title itself, its category columns
/// (all null when uncategorized) and the review-score mean.
#[derive(FromRow)]
struct TitleRecord {
    id: Uuid,
    name: String,
    year: Option<i32>,
    description: Option<String>,
    category_id: Option<Uuid>,
    category_name: Option<String>,
    category_slug: Option<String>,
    rating: Option<f64>,
}
impl TitleRecord {
    fn to_domain(self, genres: Vec<Genre>) -> Title {
        let category = match (self.category_id, self.category_name, self.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(Category { id, name, slug }),
            _ => None,
        };
        Title {
            id: self.id,
            name: self.name,
            year: self.year,
            description: self.description,
            rating: self.rating,
            category,
            genres,
        }
    }
}

#[derive(FromRow)]
struct TitleGenreRecord {
    title_id: Uuid,
    id: Uuid,
    name: String,
    slug: String,
}

#[derive(FromRow)]
struct ReviewRecord {
    id: Uuid,
    title_id: Uuid,
    title_name: String,
    author_id: Uuid,
    author_username: String,
    text: String,
    score: i16,
    pub_date: DateTime<Utc>,
}
impl ReviewRecord {
    fn to_domain(self) -> Review {
        Review {
            id: self.id,
            title_id: self.title_id,
            title_name: self.title_name,
            author_id: self.author_id,
            author_username: self.author_username,
            text: self.text,
            score: self.score,
            pub_date: self.pub_date,
        }
    }
}

#[derive(FromRow)]
struct CommentRecord {
    id: Uuid,
    review_id: Uuid,
    review_text: String,
    author_id: Uuid,
    author_username: String,
    text: String,
    pub_date: DateTime<Utc>,
}
impl CommentRecord {
    fn to_domain(self) -> Comment {
        Comment {
            id: self.id,
            review_id: self.review_id,
            review_text: self.review_text,
            author_id: self.author_id,
            author_username: self.author_username,
            text: self.text,
            pub_date: self.pub_date,
        }
    }
}

//=========================================================================================
// Shared Query Fragments
//=========================================================================================

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, bio, role, is_superuser, confirmation_code";

const TITLE_SELECT: &str = "SELECT t.id, t.name, t.year, t.description, \
     c.id AS category_id, c.name AS category_name, c.slug AS category_slug, r.rating \
     FROM titles t \
     LEFT JOIN categories c ON c.id = t.category_id \
     LEFT JOIN (SELECT title_id, AVG(score)::float8 AS rating FROM reviews GROUP BY title_id) r \
            ON r.title_id = t.id";

const REVIEW_SELECT: &str = "SELECT r.id, r.title_id, t.name AS title_name, \
     r.author_id, u.username AS author_username, r.text, r.score, r.pub_date \
     FROM reviews r \
     JOIN titles t ON t.id = r.title_id \
     JOIN users u ON u.id = r.author_id";

const COMMENT_SELECT: &str = "SELECT cm.id, cm.review_id, r.text AS review_text, \
     cm.author_id, u.username AS author_username, cm.text, cm.pub_date \
     FROM comments cm \
     JOIN reviews r ON r.id = cm.review_id \
     JOIN users u ON u.id = cm.author_id";

impl DbAdapter {
    /// Loads the genres of every title in `title_ids`, grouped by title.
    async fn genres_by_title(
        &self,
        title_ids: &[Uuid],
    ) -> PortResult<HashMap<Uuid, Vec<Genre>>> {
        if title_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let records = sqlx::query_as::<_, TitleGenreRecord>(
            "SELECT tg.title_id, g.id, g.name, g.slug \
             FROM title_genres tg \
             JOIN genres g ON g.id = tg.genre_id \
             WHERE tg.title_id = ANY($1) \
             ORDER BY g.created_at, g.slug",
        )
        .bind(title_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut grouped: HashMap<Uuid, Vec<Genre>> = HashMap::new();
        for record in records {
            grouped.entry(record.title_id).or_default().push(Genre {
                id: record.id,
                name: record.name,
                slug: record.slug,
            });
        }
        Ok(grouped)
    }

    /// Resolves a category slug to its id inside a write operation.
    async fn resolve_category_id(&self, slug: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, slug FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Category '{}' not found", slug))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.id)
    }

    /// Resolves genre slugs to ids, deduplicated, failing on the first
    /// unknown slug.
    async fn resolve_genre_ids(&self, slugs: &[String]) -> PortResult<Vec<Uuid>> {
        let mut unique: Vec<String> = Vec::new();
        for slug in slugs {
            if !unique.contains(slug) {
                unique.push(slug.clone());
            }
        }
        if unique.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, GenreRecord>(
            "SELECT id, name, slug FROM genres WHERE slug = ANY($1)",
        )
        .bind(&unique)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut by_slug: HashMap<String, Uuid> = HashMap::new();
        for record in records {
            by_slug.insert(record.slug, record.id);
        }
        unique
            .iter()
            .map(|slug| {
                by_slug
                    .get(slug)
                    .copied()
                    .ok_or_else(|| PortError::NotFound(format!("Genre '{}' not found", slug)))
            })
            .collect()
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Account Management ---

    async fn create_user(&self, user: &NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, username, email, first_name, last_name, bio, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.bio)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e).as_deref() {
            Some("users_username_key") => PortError::DuplicateUsername(user.username.clone()),
            Some("users_email_key") => PortError::DuplicateEmail(user.email.clone()),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn find_user_by_username(&self, username: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User '{}' not found", username))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn list_users(&self, username: Option<&str>) -> PortResult<Vec<User>> {
        let records = match username {
            Some(username) => {
                // Exact username match, ignoring case.
                sqlx::query_as::<_, UserRecord>(&format!(
                    "SELECT {} FROM users WHERE username ILIKE $1 ORDER BY created_at, username",
                    USER_COLUMNS
                ))
                .bind(escape_like(username))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, UserRecord>(&format!(
                    "SELECT {} FROM users ORDER BY created_at, username",
                    USER_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn update_user(&self, username: &str, patch: &UserPatch) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                email = COALESCE($3, email), \
                first_name = COALESCE($4, first_name), \
                last_name = COALESCE($5, last_name), \
                bio = COALESCE($6, bio), \
                role = COALESCE($7, role) \
             WHERE username = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(patch.username.as_deref())
        .bind(patch.email.as_deref())
        .bind(patch.first_name.as_deref())
        .bind(patch.last_name.as_deref())
        .bind(patch.bio.as_deref())
        .bind(patch.role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e).as_deref() {
            Some("users_username_key") => {
                PortError::DuplicateUsername(patch.username.clone().unwrap_or_default())
            }
            Some("users_email_key") => {
                PortError::DuplicateEmail(patch.email.clone().unwrap_or_default())
            }
            _ => PortError::Unexpected(e.to_string()),
        })?
        .ok_or_else(|| PortError::NotFound(format!("User '{}' not found", username)))?;
        record.to_domain()
    }

    async fn delete_user(&self, username: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "User '{}' not found",
                username
            )));
        }
        Ok(())
    }

    async fn set_confirmation_code(&self, user_id: Uuid, code: Option<&str>) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET confirmation_code = $2 WHERE id = $1")
            .bind(user_id)
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    // --- Categories ---

    async fn list_categories(&self, search: Option<&str>) -> PortResult<Vec<Category>> {
        let records = match search {
            Some(fragment) => {
                sqlx::query_as::<_, CategoryRecord>(
                    "SELECT id, name, slug FROM categories WHERE name ILIKE $1 \
                     ORDER BY created_at, slug",
                )
                .bind(like_pattern(fragment))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, CategoryRecord>(
                    "SELECT id, name, slug FROM categories ORDER BY created_at, slug",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_category_by_slug(&self, slug: &str) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, slug FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Category '{}' not found", slug))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn create_category(&self, name: &str, slug: &str) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3) \
             RETURNING id, name, slug",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e).as_deref() {
            Some("categories_slug_key") => PortError::DuplicateSlug(slug.to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_category(&self, slug: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Category '{}' not found",
                slug
            )));
        }
        Ok(())
    }

    // --- Genres ---

    async fn list_genres(&self, search: Option<&str>) -> PortResult<Vec<Genre>> {
        let records = match search {
            Some(fragment) => {
                sqlx::query_as::<_, GenreRecord>(
                    "SELECT id, name, slug FROM genres WHERE name ILIKE $1 \
                     ORDER BY created_at, slug",
                )
                .bind(like_pattern(fragment))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, GenreRecord>(
                    "SELECT id, name, slug FROM genres ORDER BY created_at, slug",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_genre_by_slug(&self, slug: &str) -> PortResult<Genre> {
        let record =
            sqlx::query_as::<_, GenreRecord>("SELECT id, name, slug FROM genres WHERE slug = $1")
                .bind(slug)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| match e {
                    sqlx::Error::RowNotFound => {
                        PortError::NotFound(format!("Genre '{}' not found", slug))
                    }
                    _ => PortError::Unexpected(e.to_string()),
                })?;
        Ok(record.to_domain())
    }

    async fn create_genre(&self, name: &str, slug: &str) -> PortResult<Genre> {
        let record = sqlx::query_as::<_, GenreRecord>(
            "INSERT INTO genres (id, name, slug) VALUES ($1, $2, $3) RETURNING id, name, slug",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e).as_deref() {
            Some("genres_slug_key") => PortError::DuplicateSlug(slug.to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_genre(&self, slug: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM genres WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Genre '{}' not found", slug)));
        }
        Ok(())
    }

    // --- Titles ---

    async fn list_titles(&self, filter: &TitleFilter) -> PortResult<Vec<Title>> {
        let mut builder = QueryBuilder::<Postgres>::new(TITLE_SELECT);
        builder.push(" WHERE 1 = 1");
        if let Some(name) = &filter.name {
            builder.push(" AND t.name LIKE ").push_bind(like_pattern(name));
        }
        if let Some(category) = &filter.category {
            builder
                .push(" AND c.slug LIKE ")
                .push_bind(like_pattern(category));
        }
        if let Some(genre) = &filter.genre {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM title_genres tg \
                     JOIN genres g ON g.id = tg.genre_id \
                     WHERE tg.title_id = t.id AND g.slug LIKE ",
                )
                .push_bind(like_pattern(genre))
                .push(")");
        }
        if let Some(year) = filter.year {
            builder.push(" AND t.year = ").push_bind(year);
        }
        builder.push(" ORDER BY t.created_at, t.id");

        let records: Vec<TitleRecord> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let title_ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut genres = self.genres_by_title(&title_ids).await?;
        Ok(records
            .into_iter()
            .map(|r| {
                let title_genres = genres.remove(&r.id).unwrap_or_default();
                r.to_domain(title_genres)
            })
            .collect())
    }

    async fn get_title_by_id(&self, title_id: Uuid) -> PortResult<Title> {
        let record = sqlx::query_as::<_, TitleRecord>(&format!("{} WHERE t.id = $1", TITLE_SELECT))
            .bind(title_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Title {} not found", title_id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        let mut genres = self.genres_by_title(&[title_id]).await?;
        Ok(record.to_domain(genres.remove(&title_id).unwrap_or_default()))
    }

    async fn create_title(&self, title: &NewTitle) -> PortResult<Title> {
        let category_id = match &title.category {
            Some(slug) => Some(self.resolve_category_id(slug).await?),
            None => None,
        };
        let genre_ids = self.resolve_genre_ids(&title.genres).await?;

        let title_id = Uuid::new_v4();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query(
            "INSERT INTO titles (id, name, year, description, category_id) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(title_id)
        .bind(&title.name)
        .bind(title.year)
        .bind(title.description.as_deref())
        .bind(category_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        for genre_id in &genre_ids {
            sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES ($1, $2)")
                .bind(title_id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        self.get_title_by_id(title_id).await
    }

    async fn update_title(&self, title_id: Uuid, patch: &TitlePatch) -> PortResult<Title> {
        let category_id = match &patch.category {
            Some(slug) => Some(self.resolve_category_id(slug).await?),
            None => None,
        };
        let genre_ids = match &patch.genres {
            Some(slugs) => Some(self.resolve_genre_ids(slugs).await?),
            None => None,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE titles SET \
                name = COALESCE($2, name), \
                year = COALESCE($3, year), \
                description = COALESCE($4, description), \
                category_id = COALESCE($5, category_id) \
             WHERE id = $1",
        )
        .bind(title_id)
        .bind(patch.name.as_deref())
        .bind(patch.year)
        .bind(patch.description.as_deref())
        .bind(category_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Title {} not found", title_id)));
        }
        if let Some(genre_ids) = genre_ids {
            sqlx::query("DELETE FROM title_genres WHERE title_id = $1")
                .bind(title_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            for genre_id in &genre_ids {
                sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES ($1, $2)")
                    .bind(title_id)
                    .bind(genre_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
            }
        }
        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        self.get_title_by_id(title_id).await
    }

    async fn delete_title(&self, title_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(title_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Title {} not found", title_id)));
        }
        Ok(())
    }

    // --- Reviews ---

    async fn list_reviews_for_title(&self, title_id: Uuid) -> PortResult<Vec<Review>> {
        let records = sqlx::query_as::<_, ReviewRecord>(&format!(
            "{} WHERE r.title_id = $1 ORDER BY r.pub_date, r.id",
            REVIEW_SELECT
        ))
        .bind(title_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_review(&self, title_id: Uuid, review_id: Uuid) -> PortResult<Review> {
        let record = sqlx::query_as::<_, ReviewRecord>(&format!(
            "{} WHERE r.id = $1 AND r.title_id = $2",
            REVIEW_SELECT
        ))
        .bind(review_id)
        .bind(title_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Review {} not found", review_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn get_review_by_id(&self, review_id: Uuid) -> PortResult<Review> {
        let record =
            sqlx::query_as::<_, ReviewRecord>(&format!("{} WHERE r.id = $1", REVIEW_SELECT))
                .bind(review_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| match e {
                    sqlx::Error::RowNotFound => {
                        PortError::NotFound(format!("Review {} not found", review_id))
                    }
                    _ => PortError::Unexpected(e.to_string()),
                })?;
        Ok(record.to_domain())
    }

    async fn create_review(
        &self,
        title_id: Uuid,
        author_id: Uuid,
        text: &str,
        score: i16,
    ) -> PortResult<Review> {
        let review_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO reviews (id, title_id, author_id, text, score) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(review_id)
        .bind(title_id)
        .bind(author_id)
        .bind(text)
        .bind(score)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if unique_violation(&e).as_deref() == Some("reviews_author_title_key") {
                return PortError::DuplicateReview;
            }
            if fk_violation(&e).as_deref() == Some("reviews_title_id_fkey") {
                return PortError::NotFound(format!("Title {} not found", title_id));
            }
            PortError::Unexpected(e.to_string())
        })?;
        self.get_review_by_id(review_id).await
    }

    async fn update_review(
        &self,
        review_id: Uuid,
        text: Option<&str>,
        score: Option<i16>,
    ) -> PortResult<Review> {
        let result = sqlx::query(
            "UPDATE reviews SET text = COALESCE($2, text), score = COALESCE($3, score) \
             WHERE id = $1",
        )
        .bind(review_id)
        .bind(text)
        .bind(score)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Review {} not found",
                review_id
            )));
        }
        self.get_review_by_id(review_id).await
    }

    async fn delete_review(&self, review_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Review {} not found",
                review_id
            )));
        }
        Ok(())
    }

    // --- Comments ---

    async fn list_comments_for_review(&self, review_id: Uuid) -> PortResult<Vec<Comment>> {
        let records = sqlx::query_as::<_, CommentRecord>(&format!(
            "{} WHERE cm.review_id = $1 ORDER BY cm.pub_date, cm.id",
            COMMENT_SELECT
        ))
        .bind(review_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_comment(&self, review_id: Uuid, comment_id: Uuid) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(&format!(
            "{} WHERE cm.id = $1 AND cm.review_id = $2",
            COMMENT_SELECT
        ))
        .bind(comment_id)
        .bind(review_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Comment {} not found", comment_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn create_comment(
        &self,
        review_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> PortResult<Comment> {
        let comment_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO comments (id, review_id, author_id, text) VALUES ($1, $2, $3, $4)",
        )
        .bind(comment_id)
        .bind(review_id)
        .bind(author_id)
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if fk_violation(&e).as_deref() == Some("comments_review_id_fkey") {
                return PortError::NotFound(format!("Review {} not found", review_id));
            }
            PortError::Unexpected(e.to_string())
        })?;
        self.get_comment(review_id, comment_id).await
    }

    async fn update_comment(&self, comment_id: Uuid, text: Option<&str>) -> PortResult<Comment> {
        let result = sqlx::query("UPDATE comments SET text = COALESCE($2, text) WHERE id = $1")
            .bind(comment_id)
            .bind(text)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Comment {} not found",
                comment_id
            )));
        }
        let record =
            sqlx::query_as::<_, CommentRecord>(&format!("{} WHERE cm.id = $1", COMMENT_SELECT))
                .bind(comment_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Comment {} not found",
                comment_id
            )));
        }
        Ok(())
    }
}
