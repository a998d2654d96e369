//! crates/critique_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;
pub const NAME_MAX_LEN: usize = 256;
pub const SLUG_MAX_LEN: usize = 50;

/// The access level stored on every user account.
///
/// Stored as a string in the database; only these three values are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

// Represents a registered account - used throughout the app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
    pub is_superuser: bool,
    /// One-time signup credential; `None` once consumed by a token exchange.
    pub confirmation_code: Option<String>,
}

impl User {
    /// Admin privileges come from the role or from the superuser flag.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

/// Single-valued classification of a title (e.g. "movie").
#[derive(Debug, Clone)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Multi-valued classification of a title.
#[derive(Debug, Clone)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// A cataloged creative work together with its classification and the
/// aggregate rating derived from its reviews.
#[derive(Debug, Clone)]
pub struct Title {
    pub id: Uuid,
    pub name: String,
    pub year: Option<i32>,
    pub description: Option<String>,
    /// Mean of the review scores; `None` while the title has no reviews.
    pub rating: Option<f64>,
    pub category: Option<Category>,
    pub genres: Vec<Genre>,
}

/// A scored text evaluation of a title. At most one per (author, title) pair.
#[derive(Debug, Clone)]
pub struct Review {
    pub id: Uuid,
    pub title_id: Uuid,
    pub title_name: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub score: i16,
    pub pub_date: DateTime<Utc>,
}

/// The identity asserted by a verified access token.
#[derive(Debug, Clone)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub username: String,
}

/// A text reply attached to a review.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub review_id: Uuid,
    pub review_text: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

//=========================================================================================
// Write Payloads
//=========================================================================================

/// Fields for creating an account, either through signup or the admin API.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

/// Partial update for an account. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

/// Fields for creating a title. Category and genres are referenced by slug
/// and resolved against the store.
#[derive(Debug, Clone)]
pub struct NewTitle {
    pub name: String,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genres: Vec<String>,
}

/// Partial update for a title. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default)]
pub struct TitlePatch {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genres: Option<Vec<String>>,
}

/// Optional, AND-composed filters for listing titles.
#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    /// Substring match on the title name.
    pub name: Option<String>,
    /// Substring match on a genre slug.
    pub genre: Option<String>,
    /// Substring match on the category slug.
    pub category: Option<String>,
    /// Exact match on the release year.
    pub year: Option<i32>,
}

//=========================================================================================
// Field Validation
//=========================================================================================

/// A rejected input field. The display message is what API clients see.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("username must be between 1 and 150 characters")]
    UsernameLength,
    #[error("username may only contain letters, digits and @/./+/-/_ characters")]
    UsernameAlphabet,
    #[error("username '{0}' is reserved")]
    UsernameReserved(String),
    #[error("email must be between 1 and 254 characters")]
    EmailLength,
    #[error("email is not a valid address")]
    EmailFormat,
    #[error("name must be between 1 and 256 characters")]
    NameLength,
    #[error("slug must be between 1 and 50 characters")]
    SlugLength,
    #[error("slug may only contain letters, digits, hyphens and underscores")]
    SlugAlphabet,
    #[error("score must be between 1 and 10")]
    ScoreOutOfRange,
    #[error("'{0}' is not a valid role")]
    UnknownRole(String),
    #[error("text must not be empty")]
    EmptyText,
    #[error("{0} is a required field")]
    Required(&'static str),
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.@+-]+$").unwrap())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.+-]+@[\w-]+(\.[\w-]+)+$").unwrap())
}

fn slug_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap())
}

/// Checks length and alphabet, and rejects the reserved literal `me`
/// (case-insensitive) because it would shadow the own-profile route.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LEN {
        return Err(ValidationError::UsernameLength);
    }
    if !username_regex().is_match(username) {
        return Err(ValidationError::UsernameAlphabet);
    }
    if username.eq_ignore_ascii_case("me") {
        return Err(ValidationError::UsernameReserved(username.to_string()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || email.chars().count() > EMAIL_MAX_LEN {
        return Err(ValidationError::EmailLength);
    }
    if !email_regex().is_match(email) {
        return Err(ValidationError::EmailFormat);
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.chars().count() > NAME_MAX_LEN {
        return Err(ValidationError::NameLength);
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() || slug.chars().count() > SLUG_MAX_LEN {
        return Err(ValidationError::SlugLength);
    }
    if !slug_regex().is_match(slug) {
        return Err(ValidationError::SlugAlphabet);
    }
    Ok(())
}

pub fn validate_score(score: i16) -> Result<(), ValidationError> {
    if !(1..=10).contains(&score) {
        return Err(ValidationError::ScoreOutOfRange);
    }
    Ok(())
}

pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(())
}

/// Validates every field of a new account in one pass.
pub fn validate_new_user(user: &NewUser) -> Result<(), ValidationError> {
    validate_username(&user.username)?;
    validate_email(&user.email)?;
    Ok(())
}
