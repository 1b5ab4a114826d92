//! Multi-stage approval engine.
//!
//! Requests enter through [`WorkflowEngine::submit`] and move forward only
//! through [`WorkflowEngine::resolve`], driven by capability tokens from
//! emailed links. Every resolve goes through the datastore's conditional
//! status write, so a replayed or racing link can never apply a side effect
//! twice.

pub mod error;
pub mod links;
pub mod messages;
pub mod stages;
pub mod submission;
pub mod token;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::password;
use crate::metrics;
use crate::models::approval::{ApprovalRequest, RequestKind, RequestStatus};
use crate::models::user::{ActorTier, UserAccount, UserStatus};
use crate::notification::{Attachment, NotificationEvent, Notifier, OutboundMessage};
use crate::store::{Datastore, EffectOutcome, Transition};

pub use error::WorkflowError;
use links::LinkBuilder;
use stages::{approve_effect, deny_effect, ApprovalStep, Stage, StageTable};
use submission::Submission;
use token::{CapabilityClaims, Decision, TokenService};

/// What a link route is allowed to do. Fixed per route, compared against the
/// token's signed claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    pub kind: RequestKind,
    pub tier: ActorTier,
    pub decision: Decision,
}

/// Approve and deny tokens issued for one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageTokens {
    pub tier: ActorTier,
    pub approve: String,
    pub deny: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationReport {
    Sent { recipients: usize },
    NoRecipients,
    /// The approver directory could not be read, nothing was sent.
    RecipientsUnavailable { reason: String },
    Failed { reason: String },
}

impl NotificationReport {
    fn label(&self) -> &'static str {
        match self {
            NotificationReport::Sent { .. } => "sent",
            NotificationReport::NoRecipients => "no_recipients",
            NotificationReport::RecipientsUnavailable { .. } => "recipients_unavailable",
            NotificationReport::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub request: ApprovalRequest,
    pub tokens: StageTokens,
    pub notification: NotificationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionResult {
    pub request_id: Uuid,
    pub kind: RequestKind,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub terminal: bool,
    pub effect: EffectOutcome,
    pub next_tokens: Option<StageTokens>,
    pub notification: NotificationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reminder {
    pub request_id: Uuid,
    pub status: RequestStatus,
    pub tokens: StageTokens,
    pub notification: NotificationReport,
}

/// Decision computed before the conditional write.
struct Plan {
    to: RequestStatus,
    effect: crate::store::SideEffect,
    next: Option<(Stage, Vec<String>)>,
}

pub struct WorkflowEngine {
    store: Arc<dyn Datastore>,
    tokens: Arc<dyn TokenService>,
    notifier: Arc<dyn Notifier>,
    links: LinkBuilder,
    token_ttl: Duration,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn Datastore>,
        tokens: Arc<dyn TokenService>,
        notifier: Arc<dyn Notifier>,
        links: LinkBuilder,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            tokens,
            notifier,
            links,
            token_ttl,
        }
    }

    pub fn tokens(&self) -> &dyn TokenService {
        self.tokens.as_ref()
    }

    /// Validates and persists a new request at `pending`, then asks the first
    /// tier to act on it.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitOutcome, WorkflowError> {
        let request = match submission {
            Submission::Registration(form) => {
                let valid = form
                    .validate()
                    .map_err(|fields| WorkflowError::Validation { fields })?;

                if self.store.find_user_by_email(&valid.email).await?.is_some() {
                    return Err(WorkflowError::Duplicate(format!("user {}", valid.email)));
                }

                let user = UserAccount {
                    id: Uuid::new_v4(),
                    name: valid.name,
                    email: valid.email,
                    password_hash: password::hash(&valid.password)?,
                    role: valid.role,
                    salutation: valid.salutation,
                    designation: valid.designation,
                    department: valid.department,
                    contact_number: valid.contact_number,
                    joining_date: valid.joining_date,
                    status: UserStatus::Pending,
                    created_at: Utc::now(),
                };
                let request = ApprovalRequest::new(
                    RequestKind::UserRegistration,
                    user.id.to_string(),
                    user.id,
                    user.name.clone(),
                    serde_json::json!({
                        "email": user.email,
                        "role": user.role.as_str(),
                        "designation": user.designation,
                        "department": user.department,
                        "contact_number": user.contact_number,
                    }),
                );
                self.store.insert_registration(&user, &request).await?;
                request
            }

            Submission::Scrap { submitter_id, form } => {
                let (chemical_id, photo_path) = form
                    .validate()
                    .map_err(|fields| WorkflowError::Validation { fields })?;
                let submitter = self
                    .store
                    .get_user(submitter_id)
                    .await?
                    .ok_or(WorkflowError::NotFound("user"))?;
                let chemical = self
                    .store
                    .get_chemical(&chemical_id)
                    .await?
                    .ok_or(WorkflowError::NotFound("chemical"))?;

                let request = ApprovalRequest::new(
                    RequestKind::ScrapRequest,
                    chemical.chemical_id,
                    submitter.id,
                    submitter.name,
                    serde_json::json!({
                        "email": submitter.email,
                        "chemical_name": chemical.chemical_name,
                        "photo_path": photo_path,
                    }),
                );
                self.store.insert_request(&request).await?;
                request
            }

            Submission::NewChemical { submitter_id, form } => {
                let chemical_name = form
                    .validate()
                    .map_err(|fields| WorkflowError::Validation { fields })?;
                let submitter = self
                    .store
                    .get_user(submitter_id)
                    .await?
                    .ok_or(WorkflowError::NotFound("user"))?;

                let request = ApprovalRequest::new(
                    RequestKind::NewChemicalRequest,
                    chemical_name.clone(),
                    submitter.id,
                    submitter.name,
                    serde_json::json!({
                        "email": submitter.email,
                        "chemical_name": chemical_name,
                    }),
                );
                self.store.insert_request(&request).await?;
                request
            }
        };

        tracing::info!(
            request_id = %request.id,
            kind = %request.kind,
            submitter = %request.submitter_id,
            "approval request submitted"
        );

        let first = StageTable::for_kind(request.kind).first();
        let tokens = self.issue_stage_tokens(&request, first.tier)?;
        let notification = match self.store.list_actor_emails(first.tier).await {
            Ok(recipients) => self.notify_approvers(&request, &tokens, recipients).await,
            Err(e) => {
                tracing::error!(
                    request_id = %request.id,
                    "failed to load approver addresses, run `request notify` once storage recovers: {}",
                    e
                );
                let report = NotificationReport::RecipientsUnavailable {
                    reason: e.to_string(),
                };
                metrics::record_notification(report.label());
                report
            }
        };

        Ok(SubmitOutcome {
            request,
            tokens,
            notification,
        })
    }

    /// Re-issues links for the stage a request is waiting at and mails them
    /// to that tier again. Earlier links stay valid until they expire.
    pub async fn renotify(&self, request_id: Uuid) -> Result<Reminder, WorkflowError> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or(WorkflowError::NotFound("request"))?;
        let stage = StageTable::for_request(&request)
            .waiting_at(request.status)
            .ok_or(WorkflowError::AlreadyResolved {
                request_id: request.id,
                status: request.status,
            })?;

        let recipients = self.store.list_actor_emails(stage.tier).await?;
        let tokens = self.issue_stage_tokens(&request, stage.tier)?;
        let notification = self.notify_approvers(&request, &tokens, recipients).await;
        tracing::info!(
            request_id = %request.id,
            tier = %stage.tier,
            outcome = notification.label(),
            "approval links re-sent"
        );

        Ok(Reminder {
            request_id: request.id,
            status: request.status,
            tokens,
            notification,
        })
    }

    /// Applies the transition a capability token authorizes.
    pub async fn resolve(
        &self,
        token: &str,
        intent: Intent,
    ) -> Result<TransitionResult, WorkflowError> {
        let result = self.resolve_inner(token, intent).await;
        if let Err(e) = &result {
            metrics::record_rejected_link(e.rejection_reason());
            if e.is_noop() {
                tracing::info!(kind = %intent.kind, "link for settled request: {}", e);
            } else if let WorkflowError::Storage(inner) = e {
                tracing::error!(kind = %intent.kind, "storage failure resolving link: {}", inner);
            } else {
                tracing::warn!(kind = %intent.kind, "rejected approval link: {}", e);
            }
        }
        result
    }

    async fn resolve_inner(
        &self,
        token: &str,
        intent: Intent,
    ) -> Result<TransitionResult, WorkflowError> {
        let claims = self
            .tokens
            .verify(token)
            .map_err(WorkflowError::Verification)?;
        if claims.kind != intent.kind
            || claims.stage != intent.tier
            || claims.action != intent.decision
        {
            return Err(WorkflowError::ActionMismatch);
        }

        let request = self
            .store
            .get_request(claims.request_id)
            .await?
            .ok_or(WorkflowError::NotFound("request"))?;
        if request.kind != claims.kind || request.subject_ref != claims.subject_id {
            return Err(WorkflowError::ActionMismatch);
        }
        if request.status.is_terminal() {
            return Err(WorkflowError::AlreadyResolved {
                request_id: request.id,
                status: request.status,
            });
        }

        let table = StageTable::for_request(&request);
        let stage = table
            .stage(claims.stage)
            .ok_or(WorkflowError::ActionMismatch)?;
        if request.status != stage.awaiting {
            return Err(WorkflowError::StaleTransition {
                request_id: request.id,
                expected: stage.awaiting,
                actual: request.status,
            });
        }

        // registration denial deletes the account, so read the address first
        let submitter_email = self.submitter_email(&request).await?;
        let plan = self.plan(&table, stage, &request, claims.action).await?;

        let transition = Transition {
            request_id: request.id,
            from: request.status,
            to: plan.to,
            effect: plan.effect,
        };
        let effect = match self.store.apply_transition(&transition).await? {
            Some(outcome) => outcome,
            None => return Err(self.lost_race(&request, stage).await),
        };

        metrics::record_transition(request.kind, transition.from, transition.to);
        tracing::info!(
            request_id = %request.id,
            kind = %request.kind,
            from = %transition.from,
            to = %transition.to,
            stage = %stage.tier,
            effect = ?effect,
            "approval transition committed"
        );

        let mut settled = request;
        settled.status = transition.to;
        settled.updated_at = Utc::now();

        let (next_tokens, notification) = match plan.next {
            Some((next, recipients)) => {
                let tokens = self.issue_stage_tokens(&settled, next.tier)?;
                let report = self.notify_approvers(&settled, &tokens, recipients).await;
                (Some(tokens), report)
            }
            None => {
                let report = self
                    .notify_submitter(&settled, submitter_email, claims.action)
                    .await;
                (None, report)
            }
        };

        Ok(TransitionResult {
            request_id: settled.id,
            kind: settled.kind,
            from: transition.from,
            to: transition.to,
            terminal: transition.to.is_terminal(),
            effect,
            next_tokens,
            notification,
        })
    }

    async fn plan(
        &self,
        table: &StageTable,
        stage: Stage,
        request: &ApprovalRequest,
        decision: Decision,
    ) -> Result<Plan, WorkflowError> {
        if decision == Decision::Deny {
            return Ok(Plan {
                to: RequestStatus::Denied,
                effect: deny_effect(request),
                next: None,
            });
        }

        let next_recipients = match table.next_after(stage.tier) {
            Some(next) => self.store.list_actor_emails(next.tier).await?,
            None => Vec::new(),
        };

        Ok(match table.approval_step(stage, !next_recipients.is_empty()) {
            ApprovalStep::Advance { to, next } => {
                if next_recipients.is_empty() {
                    tracing::warn!(
                        request_id = %request.id,
                        kind = %request.kind,
                        "no {} account to notify; request will wait at {}",
                        next.tier,
                        to
                    );
                }
                Plan {
                    to,
                    effect: approve_effect(request, false),
                    next: Some((next, next_recipients)),
                }
            }
            ApprovalStep::Complete => {
                if table.next_after(stage.tier).is_some() {
                    tracing::info!(
                        request_id = %request.id,
                        "no super-admin available, {} approval is final",
                        stage.tier
                    );
                }
                Plan {
                    to: RequestStatus::Approved,
                    effect: approve_effect(request, true),
                    next: None,
                }
            }
        })
    }

    /// Explains a conditional write that matched nothing.
    async fn lost_race(&self, request: &ApprovalRequest, stage: Stage) -> WorkflowError {
        match self.store.get_request(request.id).await {
            Ok(Some(current)) if current.status.is_terminal() => WorkflowError::AlreadyResolved {
                request_id: current.id,
                status: current.status,
            },
            Ok(Some(current)) => WorkflowError::StaleTransition {
                request_id: current.id,
                expected: stage.awaiting,
                actual: current.status,
            },
            Ok(None) => WorkflowError::NotFound("request"),
            Err(e) => WorkflowError::from(e),
        }
    }

    async fn submitter_email(
        &self,
        request: &ApprovalRequest,
    ) -> Result<Option<String>, WorkflowError> {
        let stored = self.store.get_user(request.submitter_id).await?;
        Ok(stored
            .map(|u| u.email)
            .or_else(|| request.detail("email").map(str::to_string)))
    }

    fn issue_stage_tokens(
        &self,
        request: &ApprovalRequest,
        tier: ActorTier,
    ) -> Result<StageTokens, WorkflowError> {
        let mut claims = CapabilityClaims {
            request_id: request.id,
            subject_id: request.subject_ref.clone(),
            kind: request.kind,
            action: Decision::Approve,
            stage: tier,
        };
        let approve = self.tokens.issue(&claims, self.token_ttl)?;
        claims.action = Decision::Deny;
        let deny = self.tokens.issue(&claims, self.token_ttl)?;
        Ok(StageTokens {
            tier,
            approve,
            deny,
        })
    }

    async fn notify_approvers(
        &self,
        request: &ApprovalRequest,
        tokens: &StageTokens,
        recipients: Vec<String>,
    ) -> NotificationReport {
        let intent = |decision| Intent {
            kind: request.kind,
            tier: tokens.tier,
            decision,
        };
        let rendered = messages::awaiting_approval(
            request,
            tokens.tier,
            &self.links.url(intent(Decision::Approve), &tokens.approve),
            &self.links.url(intent(Decision::Deny), &tokens.deny),
        );
        let attachment = match request.kind {
            RequestKind::ScrapRequest => request.detail("photo_path").map(Attachment::from_path),
            _ => None,
        };
        self.deliver(OutboundMessage {
            event: NotificationEvent::AwaitingApproval,
            request_id: request.id,
            recipients,
            subject: rendered.subject,
            html_body: rendered.html_body,
            attachment,
        })
        .await
    }

    async fn notify_submitter(
        &self,
        request: &ApprovalRequest,
        email: Option<String>,
        decision: Decision,
    ) -> NotificationReport {
        let approved = decision == Decision::Approve;
        let rendered = messages::decision_notice(request, approved);
        self.deliver(OutboundMessage {
            event: if approved {
                NotificationEvent::Approved
            } else {
                NotificationEvent::Denied
            },
            request_id: request.id,
            recipients: email.into_iter().collect(),
            subject: rendered.subject,
            html_body: rendered.html_body,
            attachment: None,
        })
        .await
    }

    /// Best-effort send. Failures are logged and counted, never returned.
    async fn deliver(&self, message: OutboundMessage) -> NotificationReport {
        let report = if message.recipients.is_empty() {
            tracing::debug!(
                request_id = %message.request_id,
                event = message.event.as_str(),
                "no recipients, notification skipped"
            );
            NotificationReport::NoRecipients
        } else {
            match self.notifier.send(&message).await {
                Ok(()) => NotificationReport::Sent {
                    recipients: message.recipients.len(),
                },
                Err(e) => {
                    tracing::warn!(
                        request_id = %message.request_id,
                        event = message.event.as_str(),
                        "notification delivery failed: {}",
                        e
                    );
                    NotificationReport::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };
        metrics::record_notification(report.label());
        report
    }
}
