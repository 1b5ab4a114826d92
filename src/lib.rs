//! labstock: chemical inventory with emailed multi-stage approvals.
//!
//! The binary in `main.rs` is a thin shell over this library so that the
//! integration tests in `tests/` can build the same router and engine.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod notification;
pub mod store;
pub mod workflow;

use std::sync::Arc;

use auth::session::SessionKeys;
use notification::email::EmailNotifier;
use notification::webhook::WebhookNotifier;
use notification::{Notifier, NotifierSet};
use store::Datastore;
use workflow::links::LinkBuilder;
use workflow::token::JwtTokenService;
use workflow::WorkflowEngine;

/// Shared application state passed to handlers.
pub struct AppState {
    pub store: Arc<dyn Datastore>,
    pub engine: WorkflowEngine,
    pub sessions: SessionKeys,
    pub config: config::Config,
}

impl AppState {
    /// Wires the notifier channels the config enables.
    pub fn new(config: config::Config, store: Arc<dyn Datastore>) -> anyhow::Result<Self> {
        let mut notifiers = NotifierSet::new();

        let email = EmailNotifier::new(config.smtp.as_ref())?;
        if email.is_configured() {
            notifiers = notifiers.with(Arc::new(email));
        } else {
            tracing::warn!("SMTP not configured, approval emails will not be sent");
        }

        if !config.webhook_urls.is_empty() {
            let webhook =
                WebhookNotifier::new(config.webhook_urls.clone(), config.webhook_secret.clone())?;
            notifiers = notifiers.with(Arc::new(webhook));
        }

        Ok(Self::with_notifier(config, store, Arc::new(notifiers)))
    }

    pub fn with_notifier(
        config: config::Config,
        store: Arc<dyn Datastore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let secret = config.jwt_secret.as_bytes();
        let engine = WorkflowEngine::new(
            store.clone(),
            Arc::new(JwtTokenService::new(secret)),
            notifier,
            LinkBuilder::new(config.public_url.clone()),
            config.token_ttl(),
        );
        let sessions = SessionKeys::new(secret, config.session_ttl());
        Self {
            store,
            engine,
            sessions,
            config,
        }
    }
}
