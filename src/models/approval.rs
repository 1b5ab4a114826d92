use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request moving through a multi-stage approval.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub kind: RequestKind,
    /// User id for registrations, chemical id for scrap requests,
    /// requested chemical name for new-chemical requests.
    pub subject_ref: String,
    pub submitter_id: Uuid,
    pub submitter_name: String,
    pub status: RequestStatus,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        kind: RequestKind,
        subject_ref: impl Into<String>,
        submitter_id: Uuid,
        submitter_name: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            subject_ref: subject_ref.into(),
            submitter_id,
            submitter_name: submitter_name.into(),
            status: RequestStatus::Pending,
            details,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reads a string field out of `details`.
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "varchar", rename_all = "kebab-case")]
pub enum RequestKind {
    UserRegistration,
    #[serde(rename = "scrap")]
    #[sqlx(rename = "scrap")]
    ScrapRequest,
    #[serde(rename = "new-chemical")]
    #[sqlx(rename = "new-chemical")]
    NewChemicalRequest,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [
        RequestKind::UserRegistration,
        RequestKind::ScrapRequest,
        RequestKind::NewChemicalRequest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::UserRegistration => "user-registration",
            RequestKind::ScrapRequest => "scrap",
            RequestKind::NewChemicalRequest => "new-chemical",
        }
    }

    /// Human label used in notification subjects and pages.
    pub fn label(self) -> &'static str {
        match self {
            RequestKind::UserRegistration => "User Registration",
            RequestKind::ScrapRequest => "Scrap Request",
            RequestKind::NewChemicalRequest => "New Chemical Request",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "varchar", rename_all = "kebab-case")]
pub enum RequestStatus {
    Pending,
    AdminApproved,
    Approved,
    Denied,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Denied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::AdminApproved => "admin-approved",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "admin-approved" => Ok(RequestStatus::AdminApproved),
            "approved" => Ok(RequestStatus::Approved),
            "denied" => Ok(RequestStatus::Denied),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(RequestStatus::AdminApproved).unwrap(),
            "admin-approved"
        );
        assert_eq!(serde_json::to_value(RequestKind::ScrapRequest).unwrap(), "scrap");
        assert_eq!(
            serde_json::to_value(RequestKind::NewChemicalRequest).unwrap(),
            "new-chemical"
        );
        assert_eq!(
            serde_json::to_value(RequestKind::UserRegistration).unwrap(),
            "user-registration"
        );
    }

    #[test]
    fn test_status_parse_matches_display() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::AdminApproved,
            RequestStatus::Approved,
            RequestStatus::Denied,
        ] {
            assert_eq!(status.to_string().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("removed".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_only_approved_and_denied_are_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::AdminApproved.is_terminal());
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Denied.is_terminal());
    }
}
