use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub salutation: String,
    pub designation: String,
    pub department: String,
    pub contact_number: String,
    pub joining_date: NaiveDate,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "varchar", rename_all = "kebab-case")]
pub enum Role {
    User,
    Admin,
    #[serde(alias = "superadmin")]
    SuperAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }

    /// The approval tier this role acts in, if any.
    pub fn tier(self) -> Option<ActorTier> {
        match self {
            Role::User => None,
            Role::Admin => Some(ActorTier::Admin),
            Role::SuperAdmin => Some(ActorTier::SuperAdmin),
        }
    }
}

impl From<ActorTier> for Role {
    fn from(tier: ActorTier) -> Self {
        match tier {
            ActorTier::Admin => Role::Admin,
            ActorTier::SuperAdmin => Role::SuperAdmin,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "varchar", rename_all = "kebab-case")]
pub enum UserStatus {
    Pending,
    AdminApproved,
    Approved,
}

/// Authorization level required to perform a stage transition.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum ActorTier {
    Admin,
    SuperAdmin,
}

impl ActorTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ActorTier::Admin => "admin",
            ActorTier::SuperAdmin => "super-admin",
        }
    }

    pub fn salutation(self) -> &'static str {
        match self {
            ActorTier::Admin => "Dear Admin",
            ActorTier::SuperAdmin => "Dear Super Admin",
        }
    }
}

impl std::fmt::Display for ActorTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActorTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(ActorTier::Admin),
            "super-admin" | "superadmin" => Ok(ActorTier::SuperAdmin),
            other => Err(format!("unknown actor tier: {}", other)),
        }
    }
}
