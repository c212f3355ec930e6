//! In-memory identity and exhibit store.
//!
//! Used by the test suites and for running the service without a database.
//! Mirrors the Postgres store: uniqueness on username and email, exhibit
//! author references without a foreign key, compare-and-set transitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::models::{
    Exhibit, ExhibitQuery, ExhibitStatus, ExhibitType, NewExhibit, NewUser, Role, User,
    BOOTSTRAP_ADMIN_ID,
};
use crate::services::error::StoreError;
use crate::services::store::{ExhibitStore, IdentityStore};

pub const SEEDED_EXHIBIT_TYPES: [&str; 4] = ["Photo", "Video", "Audio", "Text"];

struct State {
    users: BTreeMap<i32, User>,
    exhibits: BTreeMap<i32, Exhibit>,
    types: Vec<ExhibitType>,
    next_exhibit_id: i32,
}

impl State {
    fn next_user_id(&self) -> i32 {
        let last = self.users.keys().next_back().copied().unwrap_or(0);
        (last + 1).max(BOOTSTRAP_ADMIN_ID + 1)
    }

    fn joined(&self, exhibit: &Exhibit) -> Exhibit {
        let mut exhibit = exhibit.clone();
        exhibit.type_name = self
            .types
            .iter()
            .find(|t| t.id == exhibit.type_id)
            .map(|t| t.name.clone());
        exhibit.author_username = self
            .users
            .get(&exhibit.author_id)
            .map(|u| u.username.clone());
        exhibit
    }

    fn check_unique(&self, username: &str, email: &str) -> Result<(), StoreError> {
        if self.users.values().any(|u| u.username == username) {
            return Err(StoreError::UniqueViolation("users_username_key".to_string()));
        }
        if self.users.values().any(|u| u.email == email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        Ok(())
    }
}

pub struct InMemoryStore {
    state: Mutex<State>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        let types = SEEDED_EXHIBIT_TYPES
            .iter()
            .zip(1..)
            .map(|(name, id)| ExhibitType {
                id,
                name: name.to_string(),
            })
            .collect();

        Self {
            state: Mutex::new(State {
                users: BTreeMap::new(),
                exhibits: BTreeMap::new(),
                types,
                next_exhibit_id: 1,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("In-memory store mutex poisoned: {}", e)))
    }

    /// Override the creation time of a stored exhibit.
    pub fn set_exhibit_created_at(&self, id: i32, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if let Some(exhibit) = state.exhibits.get_mut(&id) {
            exhibit.created_at = at;
        }
        Ok(())
    }
}

fn newest_first(a: &Exhibit, b: &Exhibit) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.lock()?;
        state.check_unique(&user.username, &user.email)?;

        let now = Utc::now();
        let stored = User {
            id: state.next_user_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            profile_photo_path: user.profile_photo_path,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock()?.users.values().cloned().collect())
    }

    async fn update_role(&self, id: i32, role: Role) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        Ok(match state.users.get_mut(&id) {
            Some(user) => {
                user.role = role;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn update_profile_photo(&self, id: i32, path: &str) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        Ok(match state.users.get_mut(&id) {
            Some(user) => {
                user.profile_photo_path = path.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, id: i32) -> Result<bool, StoreError> {
        Ok(self.lock()?.users.remove(&id).is_some())
    }

    async fn insert_bootstrap_admin(&self, user: NewUser) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        if state.users.contains_key(&BOOTSTRAP_ADMIN_ID) {
            return Ok(false);
        }
        state.check_unique(&user.username, &user.email)?;

        let now = Utc::now();
        state.users.insert(
            BOOTSTRAP_ADMIN_ID,
            User {
                id: BOOTSTRAP_ADMIN_ID,
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                profile_photo_path: user.profile_photo_path,
                role: Role::Admin,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl ExhibitStore for InMemoryStore {
    async fn insert_exhibit(&self, exhibit: NewExhibit) -> Result<Exhibit, StoreError> {
        let mut state = self.lock()?;
        if !state.types.iter().any(|t| t.id == exhibit.type_id) {
            return Err(StoreError::ForeignKeyViolation("exhibits_type_id_fkey".to_string()));
        }

        let now = Utc::now();
        let id = state.next_exhibit_id;
        state.next_exhibit_id += 1;
        let stored = Exhibit {
            id,
            title: exhibit.title,
            type_id: exhibit.type_id,
            type_name: None,
            description: exhibit.description,
            asset_path: exhibit.asset_path,
            author_id: exhibit.author_id,
            author_username: None,
            status: exhibit.status,
            created_at: now,
            updated_at: now,
        };
        state.exhibits.insert(id, stored.clone());
        Ok(state.joined(&stored))
    }

    async fn find_exhibit(&self, id: i32) -> Result<Option<Exhibit>, StoreError> {
        let state = self.lock()?;
        Ok(state.exhibits.get(&id).map(|e| state.joined(e)))
    }

    async fn list_exhibits(&self, query: &ExhibitQuery) -> Result<Vec<Exhibit>, StoreError> {
        let state = self.lock()?;
        let mut exhibits: Vec<Exhibit> = state
            .exhibits
            .values()
            .map(|e| state.joined(e))
            .filter(|e| query.matches(e))
            .collect();
        exhibits.sort_by(newest_first);
        Ok(exhibits)
    }

    async fn list_exhibits_by_author(&self, author_id: i32) -> Result<Vec<Exhibit>, StoreError> {
        let state = self.lock()?;
        let mut exhibits: Vec<Exhibit> = state
            .exhibits
            .values()
            .filter(|e| e.author_id == author_id)
            .map(|e| state.joined(e))
            .collect();
        exhibits.sort_by(newest_first);
        Ok(exhibits)
    }

    async fn transition_status(
        &self,
        id: i32,
        from: ExhibitStatus,
        to: ExhibitStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        Ok(match state.exhibits.get_mut(&id) {
            Some(exhibit) if exhibit.status == from => {
                exhibit.status = to;
                exhibit.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    async fn delete_exhibit(&self, id: i32) -> Result<bool, StoreError> {
        Ok(self.lock()?.exhibits.remove(&id).is_some())
    }

    async fn list_exhibit_types(&self) -> Result<Vec<ExhibitType>, StoreError> {
        Ok(self.lock()?.types.clone())
    }

    async fn find_exhibit_type(&self, id: i32) -> Result<Option<ExhibitType>, StoreError> {
        Ok(self.lock()?.types.iter().find(|t| t.id == id).cloned())
    }
}
