//! crates/critique_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AccessClaims, Category, Comment, Genre, NewTitle, NewUser, Review, Title, TitleFilter,
    TitlePatch, User, UserPatch,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Slug '{0}' is already in use")]
    DuplicateSlug(String),
    #[error("Username '{0}' is already in use")]
    DuplicateUsername(String),
    #[error("Email '{0}' is already in use")]
    DuplicateEmail(String),
    #[error("Only one review per title is allowed")]
    DuplicateReview,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Account Management ---
    async fn create_user(&self, user: &NewUser) -> PortResult<User>;

    async fn find_user_by_username(&self, username: &str) -> PortResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_username(&self, username: &str) -> PortResult<User>;

    /// Lists accounts in creation order. `username` filters to an exact,
    /// case-insensitive match.
    async fn list_users(&self, username: Option<&str>) -> PortResult<Vec<User>>;

    async fn update_user(&self, username: &str, patch: &UserPatch) -> PortResult<User>;

    async fn delete_user(&self, username: &str) -> PortResult<()>;

    /// Stores or clears the pending confirmation code for an account.
    async fn set_confirmation_code(&self, user_id: Uuid, code: Option<&str>) -> PortResult<()>;

    // --- Categories ---
    async fn list_categories(&self, search: Option<&str>) -> PortResult<Vec<Category>>;

    async fn get_category_by_slug(&self, slug: &str) -> PortResult<Category>;

    async fn create_category(&self, name: &str, slug: &str) -> PortResult<Category>;

    /// Referencing titles keep existing but lose their category.
    async fn delete_category(&self, slug: &str) -> PortResult<()>;

    // --- Genres ---
    async fn list_genres(&self, search: Option<&str>) -> PortResult<Vec<Genre>>;

    async fn get_genre_by_slug(&self, slug: &str) -> PortResult<Genre>;

    async fn create_genre(&self, name: &str, slug: &str) -> PortResult<Genre>;

    async fn delete_genre(&self, slug: &str) -> PortResult<()>;

    // --- Titles ---
    /// Lists titles with their aggregate rating, all filters AND-composed.
    async fn list_titles(&self, filter: &TitleFilter) -> PortResult<Vec<Title>>;

    async fn get_title_by_id(&self, title_id: Uuid) -> PortResult<Title>;

    /// Resolves category/genre slugs against the store; `NotFound` on an
    /// unknown slug.
    async fn create_title(&self, title: &NewTitle) -> PortResult<Title>;

    async fn update_title(&self, title_id: Uuid, patch: &TitlePatch) -> PortResult<Title>;

    async fn delete_title(&self, title_id: Uuid) -> PortResult<()>;

    // --- Reviews ---
    async fn list_reviews_for_title(&self, title_id: Uuid) -> PortResult<Vec<Review>>;

    /// Fetches a review only if it belongs to the given title.
    async fn get_review(&self, title_id: Uuid, review_id: Uuid) -> PortResult<Review>;

    async fn get_review_by_id(&self, review_id: Uuid) -> PortResult<Review>;

    /// Persists a review with a server-assigned author and title. A second
    /// review by the same author for the same title fails with
    /// `DuplicateReview`, enforced by the store even under concurrent inserts.
    async fn create_review(
        &self,
        title_id: Uuid,
        author_id: Uuid,
        text: &str,
        score: i16,
    ) -> PortResult<Review>;

    async fn update_review(
        &self,
        review_id: Uuid,
        text: Option<&str>,
        score: Option<i16>,
    ) -> PortResult<Review>;

    async fn delete_review(&self, review_id: Uuid) -> PortResult<()>;

    // --- Comments ---
    async fn list_comments_for_review(&self, review_id: Uuid) -> PortResult<Vec<Comment>>;

    async fn get_comment(&self, review_id: Uuid, comment_id: Uuid) -> PortResult<Comment>;

    async fn create_comment(
        &self,
        review_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> PortResult<Comment>;

    async fn update_comment(&self, comment_id: Uuid, text: Option<&str>) -> PortResult<Comment>;

    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait MailService: Send + Sync {
    /// Delivers a plain-text message to a single recipient.
    async fn send(&self, subject: &str, body: &str, to: &str) -> PortResult<()>;
}

#[async_trait]
pub trait TokenService: Send + Sync {
    /// Produces a fresh confirmation code bound to the user's identity.
    /// Codes are unpredictable and verifiable without a forward index.
    async fn issue_confirmation_code(&self, user: &User) -> PortResult<String>;

    /// Returns `Ok(false)` for a tampered, expired or otherwise invalid code.
    async fn check_confirmation_code(&self, user: &User, code: &str) -> PortResult<bool>;

    /// Issues a signed bearer access token for the user.
    async fn issue_access_token(&self, user: &User) -> PortResult<String>;

    /// Validates a bearer token and extracts its claims; `Unauthorized` if
    /// the signature is invalid or the token has expired.
    async fn verify_access_token(&self, token: &str) -> PortResult<AccessClaims>;
}
