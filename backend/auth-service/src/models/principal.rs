/// Principal model
use chrono::{DateTime, Utc};
use crypto_core::Credential;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalStatus {
    Active,
    Locked,
    /// Soft-deleted; the identifier stays reserved
    Deactivated,
}

impl PrincipalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalStatus::Active => "active",
            PrincipalStatus::Locked => "locked",
            PrincipalStatus::Deactivated => "deactivated",
        }
    }
}

impl FromStr for PrincipalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PrincipalStatus::Active),
            "locked" => Ok(PrincipalStatus::Locked),
            "deactivated" => Ok(PrincipalStatus::Deactivated),
            other => Err(format!("unknown principal status `{}`", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub credential: Credential,
    pub status: PrincipalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(id: String, credential: Credential, now: DateTime<Utc>) -> Self {
        Self {
            id,
            credential,
            status: PrincipalStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status == PrincipalStatus::Locked
    }

    pub fn is_deactivated(&self) -> bool {
        self.status == PrincipalStatus::Deactivated
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub identifier: String,
    pub current_password: String,
    pub new_password: String,
}
