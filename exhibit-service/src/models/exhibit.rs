//! Exhibit model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Moderation status. Ids match the seeded `exhibit_statuses` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExhibitStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExhibitStatus {
    pub const ALL: [ExhibitStatus; 3] = [
        ExhibitStatus::Pending,
        ExhibitStatus::Approved,
        ExhibitStatus::Rejected,
    ];

    pub fn id(&self) -> i32 {
        match self {
            ExhibitStatus::Pending => 1,
            ExhibitStatus::Approved => 2,
            ExhibitStatus::Rejected => 3,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(ExhibitStatus::Pending),
            2 => Some(ExhibitStatus::Approved),
            3 => Some(ExhibitStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExhibitStatus::Pending => "Pending",
            ExhibitStatus::Approved => "Approved",
            ExhibitStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ExhibitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExhibitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ExhibitStatus::Pending),
            "approved" => Ok(ExhibitStatus::Approved),
            "rejected" => Ok(ExhibitStatus::Rejected),
            _ => Err(format!("Invalid exhibit status: {}", s)),
        }
    }
}

/// Row of the `exhibit_types` lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ExhibitType {
    pub id: i32,
    pub name: String,
}

/// Stored exhibit joined with its type and (if still present) its author.
#[derive(Debug, Clone, PartialEq)]
pub struct Exhibit {
    pub id: i32,
    pub title: String,
    pub type_id: i32,
    pub type_name: Option<String>,
    pub description: String,
    pub asset_path: String,
    pub author_id: i32,
    /// `None` once the author account is gone.
    pub author_username: Option<String>,
    pub status: ExhibitStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exhibit {
    pub fn is_authored_by(&self, user_id: Option<i32>) -> bool {
        user_id == Some(self.author_id)
    }

    pub fn is_orphaned(&self) -> bool {
        self.author_username.is_none()
    }
}

/// Input for inserting an exhibit.
#[derive(Debug, Clone)]
pub struct NewExhibit {
    pub title: String,
    pub type_id: i32,
    pub description: String,
    pub asset_path: String,
    pub author_id: i32,
    pub status: ExhibitStatus,
}

/// Store-level listing filter. All bounds are optional and combine with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExhibitQuery {
    pub status: Option<ExhibitStatus>,
    /// Case-insensitive substring of the author username.
    pub username: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
}

impl ExhibitQuery {
    /// In-memory evaluation of the filter; mirrors the SQL predicate.
    pub fn matches(&self, exhibit: &Exhibit) -> bool {
        if let Some(status) = self.status {
            if exhibit.status != status {
                return false;
            }
        }
        if let Some(needle) = &self.username {
            let needle = needle.to_lowercase();
            match &exhibit.author_username {
                Some(name) if name.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        if let Some(from) = self.created_from {
            if exhibit.created_at < from {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if exhibit.created_at >= before {
                return false;
            }
        }
        true
    }
}
