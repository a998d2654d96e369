//! services/api/src/adapters/memory.rs
//!
//! An in-memory implementation of the `DatabaseService` port. It enforces the
//! same uniqueness, cascade and aggregation contracts as the PostgreSQL
//! adapter, which makes it the backend for the integration tests and for
//! running the service locally without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use critique_core::domain::{
    Category, Comment, Genre, NewTitle, NewUser, Review, Title, TitleFilter, TitlePatch, User,
    UserPatch,
};
use critique_core::ports::{DatabaseService, PortError, PortResult};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

//=========================================================================================
// Stored Rows
//=========================================================================================

#[derive(Debug, Clone)]
struct StoredTitle {
    id: Uuid,
    name: String,
    year: Option<i32>,
    description: Option<String>,
    category_id: Option<Uuid>,
    genre_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
struct StoredReview {
    id: Uuid,
    title_id: Uuid,
    author_id: Uuid,
    text: String,
    score: i16,
    pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredComment {
    id: Uuid,
    review_id: Uuid,
    author_id: Uuid,
    text: String,
    pub_date: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    users: Vec<User>,
    categories: Vec<Category>,
    genres: Vec<Genre>,
    titles: Vec<StoredTitle>,
    reviews: Vec<StoredReview>,
    comments: Vec<StoredComment>,
}

impl MemoryInner {
    fn rating_for(&self, title_id: Uuid) -> Option<f64> {
        let scores: Vec<i16> = self
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .map(|r| r.score)
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64)
    }

    fn title_to_domain(&self, stored: &StoredTitle) -> Title {
        let category = stored
            .category_id
            .and_then(|id| self.categories.iter().find(|c| c.id == id).cloned());
        let genres = stored
            .genre_ids
            .iter()
            .filter_map(|id| self.genres.iter().find(|g| g.id == *id).cloned())
            .collect();
        Title {
            id: stored.id,
            name: stored.name.clone(),
            year: stored.year,
            description: stored.description.clone(),
            rating: self.rating_for(stored.id),
            category,
            genres,
        }
    }

    fn review_to_domain(&self, stored: &StoredReview) -> PortResult<Review> {
        let title = self
            .titles
            .iter()
            .find(|t| t.id == stored.title_id)
            .ok_or_else(|| PortError::Unexpected("review points at a missing title".to_string()))?;
        let author = self
            .users
            .iter()
            .find(|u| u.id == stored.author_id)
            .ok_or_else(|| PortError::Unexpected("review points at a missing user".to_string()))?;
        Ok(Review {
            id: stored.id,
            title_id: stored.title_id,
            title_name: title.name.clone(),
            author_id: stored.author_id,
            author_username: author.username.clone(),
            text: stored.text.clone(),
            score: stored.score,
            pub_date: stored.pub_date,
        })
    }

    fn comment_to_domain(&self, stored: &StoredComment) -> PortResult<Comment> {
        let review = self
            .reviews
            .iter()
            .find(|r| r.id == stored.review_id)
            .ok_or_else(|| {
                PortError::Unexpected("comment points at a missing review".to_string())
            })?;
        let author = self
            .users
            .iter()
            .find(|u| u.id == stored.author_id)
            .ok_or_else(|| PortError::Unexpected("comment points at a missing user".to_string()))?;
        Ok(Comment {
            id: stored.id,
            review_id: stored.review_id,
            review_text: review.text.clone(),
            author_id: stored.author_id,
            author_username: author.username.clone(),
            text: stored.text.clone(),
            pub_date: stored.pub_date,
        })
    }

    /// Removes the reviews selected by `predicate` along with their comments.
    fn purge_reviews<F: Fn(&StoredReview) -> bool>(&mut self, predicate: F) {
        let removed: Vec<Uuid> = self
            .reviews
            .iter()
            .filter(|r| predicate(r))
            .map(|r| r.id)
            .collect();
        self.reviews.retain(|r| !removed.contains(&r.id));
        self.comments.retain(|c| !removed.contains(&c.review_id));
    }
}

//=========================================================================================
// The Adapter
//=========================================================================================

/// An in-memory `DatabaseService`, shared behind one mutex.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| PortError::Unexpected("memory store mutex poisoned".to_string()))
    }

    /// Flips the superuser flag on an account. There is no API route for
    /// this; it mirrors promoting an account directly in the database.
    pub fn set_superuser(&self, username: &str, is_superuser: bool) -> PortResult<()> {
        let mut inner = self.lock()?;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| PortError::NotFound(format!("User '{}' not found", username)))?;
        user.is_superuser = is_superuser;
        Ok(())
    }
}

fn contains_ci(haystack: &str, fragment: &str) -> bool {
    haystack.to_lowercase().contains(&fragment.to_lowercase())
}

#[async_trait]
impl DatabaseService for MemoryStore {
    // --- Account Management ---

    async fn create_user(&self, user: &NewUser) -> PortResult<User> {
        let mut inner = self.lock()?;
        if inner.users.iter().any(|u| u.username == user.username) {
            return Err(PortError::DuplicateUsername(user.username.clone()));
        }
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(PortError::DuplicateEmail(user.email.clone()));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            bio: user.bio.clone(),
            role: user.role,
            is_superuser: false,
            confirmation_code: None,
        };
        inner.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> PortResult<Option<User>> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let inner = self.lock()?;
        inner
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<User> {
        let inner = self.lock()?;
        inner
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User '{}' not found", username)))
    }

    async fn list_users(&self, username: Option<&str>) -> PortResult<Vec<User>> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .iter()
            .filter(|u| {
                username.map_or(true, |name| u.username.to_lowercase() == name.to_lowercase())
            })
            .cloned()
            .collect())
    }

    async fn update_user(&self, username: &str, patch: &UserPatch) -> PortResult<User> {
        let mut inner = self.lock()?;
        let target_id = inner
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.id)
            .ok_or_else(|| PortError::NotFound(format!("User '{}' not found", username)))?;
        if let Some(new_username) = &patch.username {
            if inner
                .users
                .iter()
                .any(|u| u.id != target_id && u.username == *new_username)
            {
                return Err(PortError::DuplicateUsername(new_username.clone()));
            }
        }
        if let Some(new_email) = &patch.email {
            if inner
                .users
                .iter()
                .any(|u| u.id != target_id && u.email == *new_email)
            {
                return Err(PortError::DuplicateEmail(new_email.clone()));
            }
        }
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == target_id)
            .ok_or_else(|| PortError::Unexpected("user vanished mid-update".to_string()))?;
        if let Some(new_username) = &patch.username {
            user.username = new_username.clone();
        }
        if let Some(new_email) = &patch.email {
            user.email = new_email.clone();
        }
        if let Some(first_name) = &patch.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &patch.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(bio) = &patch.bio {
            user.bio = bio.clone();
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, username: &str) -> PortResult<()> {
        let mut inner = self.lock()?;
        let user_id = inner
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.id)
            .ok_or_else(|| PortError::NotFound(format!("User '{}' not found", username)))?;
        inner.users.retain(|u| u.id != user_id);
        inner.purge_reviews(|r| r.author_id == user_id);
        inner.comments.retain(|c| c.author_id != user_id);
        Ok(())
    }

    async fn set_confirmation_code(&self, user_id: Uuid, code: Option<&str>) -> PortResult<()> {
        let mut inner = self.lock()?;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        user.confirmation_code = code.map(|c| c.to_string());
        Ok(())
    }

    // --- Categories ---

    async fn list_categories(&self, search: Option<&str>) -> PortResult<Vec<Category>> {
        let inner = self.lock()?;
        Ok(inner
            .categories
            .iter()
            .filter(|c| search.map_or(true, |fragment| contains_ci(&c.name, fragment)))
            .cloned()
            .collect())
    }

    async fn get_category_by_slug(&self, slug: &str) -> PortResult<Category> {
        let inner = self.lock()?;
        inner
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Category '{}' not found", slug)))
    }

    async fn create_category(&self, name: &str, slug: &str) -> PortResult<Category> {
        let mut inner = self.lock()?;
        if inner.categories.iter().any(|c| c.slug == slug) {
            return Err(PortError::DuplicateSlug(slug.to_string()));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        inner.categories.push(category.clone());
        Ok(category)
    }

    async fn delete_category(&self, slug: &str) -> PortResult<()> {
        let mut inner = self.lock()?;
        let category_id = inner
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| c.id)
            .ok_or_else(|| PortError::NotFound(format!("Category '{}' not found", slug)))?;
        inner.categories.retain(|c| c.id != category_id);
        for title in inner.titles.iter_mut() {
            if title.category_id == Some(category_id) {
                title.category_id = None;
            }
        }
        Ok(())
    }

    // --- Genres ---

    async fn list_genres(&self, search: Option<&str>) -> PortResult<Vec<Genre>> {
        let inner = self.lock()?;
        Ok(inner
            .genres
            .iter()
            .filter(|g| search.map_or(true, |fragment| contains_ci(&g.name, fragment)))
            .cloned()
            .collect())
    }

    async fn get_genre_by_slug(&self, slug: &str) -> PortResult<Genre> {
        let inner = self.lock()?;
        inner
            .genres
            .iter()
            .find(|g| g.slug == slug)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Genre '{}' not found", slug)))
    }

    async fn create_genre(&self, name: &str, slug: &str) -> PortResult<Genre> {
        let mut inner = self.lock()?;
        if inner.genres.iter().any(|g| g.slug == slug) {
            return Err(PortError::DuplicateSlug(slug.to_string()));
        }
        let genre = Genre {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        inner.genres.push(genre.clone());
        Ok(genre)
    }

    async fn delete_genre(&self, slug: &str) -> PortResult<()> {
        let mut inner = self.lock()?;
        let genre_id = inner
            .genres
            .iter()
            .find(|g| g.slug == slug)
            .map(|g| g.id)
            .ok_or_else(|| PortError::NotFound(format!("Genre '{}' not found", slug)))?;
        inner.genres.retain(|g| g.id != genre_id);
        for title in inner.titles.iter_mut() {
            title.genre_ids.retain(|id| *id != genre_id);
        }
        Ok(())
    }

    // --- Titles ---

    async fn list_titles(&self, filter: &TitleFilter) -> PortResult<Vec<Title>> {
        let inner = self.lock()?;
        let titles = inner
            .titles
            .iter()
            .filter(|t| {
                filter.name.as_deref().map_or(true, |fragment| t.name.contains(fragment))
            })
            .filter(|t| {
                filter.category.as_deref().map_or(true, |fragment| {
                    t.category_id
                        .and_then(|id| inner.categories.iter().find(|c| c.id == id))
                        .map_or(false, |c| c.slug.contains(fragment))
                })
            })
            .filter(|t| {
                filter.genre.as_deref().map_or(true, |fragment| {
                    t.genre_ids.iter().any(|id| {
                        inner
                            .genres
                            .iter()
                            .find(|g| g.id == *id)
                            .map_or(false, |g| g.slug.contains(fragment))
                    })
                })
            })
            .filter(|t| filter.year.map_or(true, |year| t.year == Some(year)))
            .map(|t| inner.title_to_domain(t))
            .collect();
        Ok(titles)
    }

    async fn get_title_by_id(&self, title_id: Uuid) -> PortResult<Title> {
        let inner = self.lock()?;
        inner
            .titles
            .iter()
            .find(|t| t.id == title_id)
            .map(|t| inner.title_to_domain(t))
            .ok_or_else(|| PortError::NotFound(format!("Title {} not found", title_id)))
    }

    async fn create_title(&self, title: &NewTitle) -> PortResult<Title> {
        let mut inner = self.lock()?;
        let category_id = match &title.category {
            Some(slug) => Some(
                inner
                    .categories
                    .iter()
                    .find(|c| c.slug == *slug)
                    .map(|c| c.id)
                    .ok_or_else(|| PortError::NotFound(format!("Category '{}' not found", slug)))?,
            ),
            None => None,
        };
        let mut genre_ids = Vec::new();
        for slug in &title.genres {
            let genre_id = inner
                .genres
                .iter()
                .find(|g| g.slug == *slug)
                .map(|g| g.id)
                .ok_or_else(|| PortError::NotFound(format!("Genre '{}' not found", slug)))?;
            if !genre_ids.contains(&genre_id) {
                genre_ids.push(genre_id);
            }
        }
        let stored = StoredTitle {
            id: Uuid::new_v4(),
            name: title.name.clone(),
            year: title.year,
            description: title.description.clone(),
            category_id,
            genre_ids,
        };
        let created = inner.title_to_domain(&stored);
        inner.titles.push(stored);
        Ok(created)
    }

    async fn update_title(&self, title_id: Uuid, patch: &TitlePatch) -> PortResult<Title> {
        let mut inner = self.lock()?;
        let category_id = match &patch.category {
            Some(slug) => Some(
                inner
                    .categories
                    .iter()
                    .find(|c| c.slug == *slug)
                    .map(|c| c.id)
                    .ok_or_else(|| PortError::NotFound(format!("Category '{}' not found", slug)))?,
            ),
            None => None,
        };
        let genre_ids = match &patch.genres {
            Some(slugs) => {
                let mut resolved = Vec::new();
                for slug in slugs {
                    let genre_id = inner
                        .genres
                        .iter()
                        .find(|g| g.slug == *slug)
                        .map(|g| g.id)
                        .ok_or_else(|| {
                            PortError::NotFound(format!("Genre '{}' not found", slug))
                        })?;
                    if !resolved.contains(&genre_id) {
                        resolved.push(genre_id);
                    }
                }
                Some(resolved)
            }
            None => None,
        };
        let position = inner
            .titles
            .iter()
            .position(|t| t.id == title_id)
            .ok_or_else(|| PortError::NotFound(format!("Title {} not found", title_id)))?;
        {
            let title = &mut inner.titles[position];
            if let Some(name) = &patch.name {
                title.name = name.clone();
            }
            if let Some(year) = patch.year {
                title.year = Some(year);
            }
            if let Some(description) = &patch.description {
                title.description = Some(description.clone());
            }
            if let Some(category_id) = category_id {
                title.category_id = Some(category_id);
            }
            if let Some(genre_ids) = genre_ids {
                title.genre_ids = genre_ids;
            }
        }
        let stored = inner.titles[position].clone();
        Ok(inner.title_to_domain(&stored))
    }

    async fn delete_title(&self, title_id: Uuid) -> PortResult<()> {
        let mut inner = self.lock()?;
        if !inner.titles.iter().any(|t| t.id == title_id) {
            return Err(PortError::NotFound(format!("Title {} not found", title_id)));
        }
        inner.titles.retain(|t| t.id != title_id);
        inner.purge_reviews(|r| r.title_id == title_id);
        Ok(())
    }

    // --- Reviews ---

    async fn list_reviews_for_title(&self, title_id: Uuid) -> PortResult<Vec<Review>> {
        let inner = self.lock()?;
        inner
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .map(|r| inner.review_to_domain(r))
            .collect()
    }

    async fn get_review(&self, title_id: Uuid, review_id: Uuid) -> PortResult<Review> {
        let inner = self.lock()?;
        let stored = inner
            .reviews
            .iter()
            .find(|r| r.id == review_id && r.title_id == title_id)
            .ok_or_else(|| PortError::NotFound(format!("Review {} not found", review_id)))?;
        inner.review_to_domain(stored)
    }

    async fn get_review_by_id(&self, review_id: Uuid) -> PortResult<Review> {
        let inner = self.lock()?;
        let stored = inner
            .reviews
            .iter()
            .find(|r| r.id == review_id)
            .ok_or_else(|| PortError::NotFound(format!("Review {} not found", review_id)))?;
        inner.review_to_domain(stored)
    }

    async fn create_review(
        &self,
        title_id: Uuid,
        author_id: Uuid,
        text: &str,
        score: i16,
    ) -> PortResult<Review> {
        // The whole check-then-insert runs under one lock, so concurrent
        // duplicate attempts cannot both pass the check.
        let mut inner = self.lock()?;
        if !inner.titles.iter().any(|t| t.id == title_id) {
            return Err(PortError::NotFound(format!("Title {} not found", title_id)));
        }
        if inner
            .reviews
            .iter()
            .any(|r| r.title_id == title_id && r.author_id == author_id)
        {
            return Err(PortError::DuplicateReview);
        }
        let stored = StoredReview {
            id: Uuid::new_v4(),
            title_id,
            author_id,
            text: text.to_string(),
            score,
            pub_date: Utc::now(),
        };
        inner.reviews.push(stored.clone());
        inner.review_to_domain(&stored)
    }

    async fn update_review(
        &self,
        review_id: Uuid,
        text: Option<&str>,
        score: Option<i16>,
    ) -> PortResult<Review> {
        let mut inner = self.lock()?;
        let stored = {
            let review = inner
                .reviews
                .iter_mut()
                .find(|r| r.id == review_id)
                .ok_or_else(|| PortError::NotFound(format!("Review {} not found", review_id)))?;
            if let Some(text) = text {
                review.text = text.to_string();
            }
            if let Some(score) = score {
                review.score = score;
            }
            review.clone()
        };
        inner.review_to_domain(&stored)
    }

    async fn delete_review(&self, review_id: Uuid) -> PortResult<()> {
        let mut inner = self.lock()?;
        if !inner.reviews.iter().any(|r| r.id == review_id) {
            return Err(PortError::NotFound(format!(
                "Review {} not found",
                review_id
            )));
        }
        inner.purge_reviews(|r| r.id == review_id);
        Ok(())
    }

    // --- Comments ---

    async fn list_comments_for_review(&self, review_id: Uuid) -> PortResult<Vec<Comment>> {
        let inner = self.lock()?;
        inner
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .map(|c| inner.comment_to_domain(c))
            .collect()
    }

    async fn get_comment(&self, review_id: Uuid, comment_id: Uuid) -> PortResult<Comment> {
        let inner = self.lock()?;
        let stored = inner
            .comments
            .iter()
            .find(|c| c.id == comment_id && c.review_id == review_id)
            .ok_or_else(|| PortError::NotFound(format!("Comment {} not found", comment_id)))?;
        inner.comment_to_domain(stored)
    }

    async fn create_comment(
        &self,
        review_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> PortResult<Comment> {
        let mut inner = self.lock()?;
        if !inner.reviews.iter().any(|r| r.id == review_id) {
            return Err(PortError::NotFound(format!(
                "Review {} not found",
                review_id
            )));
        }
        let stored = StoredComment {
            id: Uuid::new_v4(),
            review_id,
            author_id,
            text: text.to_string(),
            pub_date: Utc::now(),
        };
        inner.comments.push(stored.clone());
        inner.comment_to_domain(&stored)
    }

    async fn update_comment(&self, comment_id: Uuid, text: Option<&str>) -> PortResult<Comment> {
        let mut inner = self.lock()?;
        let stored = {
            let comment = inner
                .comments
                .iter_mut()
                .find(|c| c.id == comment_id)
                .ok_or_else(|| {
                    PortError::NotFound(format!("Comment {} not found", comment_id))
                })?;
            if let Some(text) = text {
                comment.text = text.to_string();
            }
            comment.clone()
        };
        inner.comment_to_domain(&stored)
    }

    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<()> {
        let mut inner = self.lock()?;
        if !inner.comments.iter().any(|c| c.id == comment_id) {
            return Err(PortError::NotFound(format!(
                "Comment {} not found",
                comment_id
            )));
        }
        inner.comments.retain(|c| c.id != comment_id);
        Ok(())
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use critique_core::domain::Role;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role: Role::User,
        }
    }

    async fn seeded_title(store: &MemoryStore) -> Title {
        store
            .create_title(&NewTitle {
                name: "Dune".to_string(),
                year: Some(1965),
                description: None,
                category: None,
                genres: Vec::new(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn usernames_and_emails_are_unique() {
        let store = MemoryStore::new();
        store.create_user(&new_user("bob")).await.unwrap();

        let same_username = NewUser {
            email: "other@example.com".to_string(),
            ..new_user("bob")
        };
        assert!(matches!(
            store.create_user(&same_username).await,
            Err(PortError::DuplicateUsername(_))
        ));

        let same_email = NewUser {
            email: "bob@example.com".to_string(),
            ..new_user("robert")
        };
        assert!(matches!(
            store.create_user(&same_email).await,
            Err(PortError::DuplicateEmail(_))
        ));
    }

    #[tokio::test]
    async fn second_review_by_same_author_is_rejected() {
        let store = MemoryStore::new();
        let author = store.create_user(&new_user("bob")).await.unwrap();
        let title = seeded_title(&store).await;

        store
            .create_review(title.id, author.id, "a classic", 9)
            .await
            .unwrap();
        assert!(matches!(
            store.create_review(title.id, author.id, "again", 5).await,
            Err(PortError::DuplicateReview)
        ));

        let reviews = store.list_reviews_for_title(title.id).await.unwrap();
        assert_eq!(reviews.len(), 1);
    }

    #[tokio::test]
    async fn rating_is_the_mean_of_review_scores() {
        let store = MemoryStore::new();
        let title = seeded_title(&store).await;
        assert_eq!(store.get_title_by_id(title.id).await.unwrap().rating, None);

        let alice = store.create_user(&new_user("alice")).await.unwrap();
        let bob = store.create_user(&new_user("bob")).await.unwrap();
        store.create_review(title.id, alice.id, "good", 8).await.unwrap();
        store.create_review(title.id, bob.id, "fine", 5).await.unwrap();

        let rating = store.get_title_by_id(title.id).await.unwrap().rating;
        assert_eq!(rating, Some(6.5));
    }

    #[tokio::test]
    async fn deleting_a_title_cascades_to_reviews_and_comments() {
        let store = MemoryStore::new();
        let author = store.create_user(&new_user("bob")).await.unwrap();
        let title = seeded_title(&store).await;
        let review = store
            .create_review(title.id, author.id, "a classic", 9)
            .await
            .unwrap();
        store
            .create_comment(review.id, author.id, "agreed")
            .await
            .unwrap();

        store.delete_title(title.id).await.unwrap();

        assert!(matches!(
            store.get_review_by_id(review.id).await,
            Err(PortError::NotFound(_))
        ));
        assert!(store
            .list_comments_for_review(review.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn deleting_an_author_cascades_to_their_reviews_and_comments() {
        let store = MemoryStore::new();
        let author = store.create_user(&new_user("bob")).await.unwrap();
        let commenter = store.create_user(&new_user("eve")).await.unwrap();
        let title = seeded_title(&store).await;
        let review = store
            .create_review(title.id, author.id, "a classic", 9)
            .await
            .unwrap();
        store
            .create_comment(review.id, commenter.id, "agreed")
            .await
            .unwrap();

        store.delete_user("bob").await.unwrap();

        assert!(store.list_reviews_for_title(title.id).await.unwrap().is_empty());
        // The stranger's comment went down with the review.
        assert!(store
            .list_comments_for_review(review.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn deleting_a_category_detaches_titles_instead_of_deleting_them() {
        let store = MemoryStore::new();
        store.create_category("Books", "books").await.unwrap();
        let title = store
            .create_title(&NewTitle {
                name: "Dune".to_string(),
                year: Some(1965),
                description: None,
                category: Some("books".to_string()),
                genres: Vec::new(),
            })
            .await
            .unwrap();
        assert!(title.category.is_some());

        store.delete_category("books").await.unwrap();

        let after = store.get_title_by_id(title.id).await.unwrap();
        assert!(after.category.is_none());
    }

    #[tokio::test]
    async fn title_filters_are_and_composed() {
        let store = MemoryStore::new();
        store.create_category("Books", "books").await.unwrap();
        store.create_genre("Science Fiction", "sci-fi").await.unwrap();
        store
            .create_title(&NewTitle {
                name: "Dune".to_string(),
                year: Some(1965),
                description: None,
                category: Some("books".to_string()),
                genres: vec!["sci-fi".to_string()],
            })
            .await
            .unwrap();
        store
            .create_title(&NewTitle {
                name: "Emma".to_string(),
                year: Some(1815),
                description: None,
                category: Some("books".to_string()),
                genres: Vec::new(),
            })
            .await
            .unwrap();

        let hits = store
            .list_titles(&TitleFilter {
                category: Some("book".to_string()),
                genre: Some("sci".to_string()),
                ..TitleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Dune");

        let empty = store
            .list_titles(&TitleFilter {
                name: Some("Dune".to_string()),
                year: Some(1815),
                ..TitleFilter::default()
            })
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn unknown_genre_slug_fails_title_creation() {
        let store = MemoryStore::new();
        let result = store
            .create_title(&NewTitle {
                name: "Dune".to_string(),
                year: None,
                description: None,
                category: None,
                genres: vec!["missing".to_string()],
            })
            .await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn confirmation_code_can_be_set_and_cleared() {
        let store = MemoryStore::new();
        let user = store.create_user(&new_user("bob")).await.unwrap();

        store.set_confirmation_code(user.id, Some("code-1")).await.unwrap();
        let stored = store.get_user_by_id(user.id).await.unwrap();
        assert_eq!(stored.confirmation_code.as_deref(), Some("code-1"));

        store.set_confirmation_code(user.id, None).await.unwrap();
        let cleared = store.get_user_by_id(user.id).await.unwrap();
        assert_eq!(cleared.confirmation_code, None);
    }
}
