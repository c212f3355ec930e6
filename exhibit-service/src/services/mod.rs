pub mod database;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod moderation;
pub mod policy;
pub mod session;
pub mod storage;
pub mod store;

pub use database::Database;
pub use error::{ModerationError, StoreError};
pub use lifecycle::{ExhibitLifecycle, TransitionPolicy};
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use moderation::ModerationService;
pub use policy::{Action, AuthorizationPolicy, Decision, DenyReason};
pub use session::{AuthContext, MemorySession, SessionContext};
pub use storage::{AssetStorage, LocalStorage, MemoryStorage};
pub use store::{ExhibitStore, IdentityStore};
