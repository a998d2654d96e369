//! services/api/src/web/state.rs
//!
//! Defines the application state shared by all request handlers.

use crate::config::Config;
use critique_core::ports::{DatabaseService, MailService, TokenService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub mail: Arc<dyn MailService>,
    pub tokens: Arc<dyn TokenService>,
    pub config: Arc<Config>,
}
