use std::sync::Arc;

use sqlx::PgPool;

use crate::ai::{CvAnalyst, Translator};
use crate::auth::session::SessionStore;
use crate::config::Config;
use crate::email::EmailDispatcher;
use crate::pdf::storage::PdfStore;
use crate::tasks::queue::TaskQueue;

/// Shared application state injected into all route handlers via Axum extractors.
/// The worker and scheduler run off the same state.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub sessions: SessionStore,
    /// Broker and result store for background tasks.
    pub queue: Arc<dyn TaskQueue>,
    /// Generated PDFs (S3 in production).
    pub pdf_store: Arc<dyn PdfStore>,
    /// SendGrid first when configured, then SMTP or the console transport.
    pub email: EmailDispatcher,
    pub translator: Arc<dyn Translator>,
    pub analyst: Arc<dyn CvAnalyst>,
    pub config: Config,
}
