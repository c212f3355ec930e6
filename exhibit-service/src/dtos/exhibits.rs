use crate::models::{Exhibit, ExhibitStatus, ExhibitType};
use crate::services::moderation::ListingFilter;
use serde::{Deserialize, Serialize};

/// Public prefix under which stored assets are served.
pub const STORAGE_URL_PREFIX: &str = "/api/v1/storage";

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: i32,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExhibitResponse {
    pub id: i32,
    pub title: String,
    #[serde(rename = "type")]
    pub type_: ExhibitType,
    pub description: String,
    pub asset_path: String,
    pub asset_url: String,
    pub status: ExhibitStatus,
    pub author_id: i32,
    /// `None` once the author account has been deleted.
    pub author: Option<AuthorSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Exhibit> for ExhibitResponse {
    fn from(e: Exhibit) -> Self {
        Self {
            id: e.id,
            title: e.title,
            type_: ExhibitType {
                id: e.type_id,
                name: e.type_name.unwrap_or_default(),
            },
            description: e.description,
            asset_url: format!("{}/{}", STORAGE_URL_PREFIX, e.asset_path),
            asset_path: e.asset_path,
            status: e.status,
            author_id: e.author_id,
            author: e.author_username.map(|username| AuthorSummary {
                id: e.author_id,
                username,
            }),
            created_at: e.created_at.to_rfc3339(),
            updated_at: e.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExhibitListParams {
    pub status: Option<String>,
    pub username: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl From<ExhibitListParams> for ListingFilter {
    fn from(p: ExhibitListParams) -> Self {
        Self {
            status: p.status,
            username: p.username,
            start_date: p.start_date,
            end_date: p.end_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExhibitListResponse {
    pub exhibits: Vec<ExhibitResponse>,
    pub total: usize,
}

impl From<Vec<Exhibit>> for ExhibitListResponse {
    fn from(exhibits: Vec<Exhibit>) -> Self {
        let exhibits: Vec<ExhibitResponse> = exhibits.into_iter().map(Into::into).collect();
        Self {
            total: exhibits.len(),
            exhibits,
        }
    }
}
