pub mod exhibit;
pub mod user;

pub use exhibit::{Exhibit, ExhibitQuery, ExhibitStatus, ExhibitType, NewExhibit};
pub use user::{NewUser, Role, User, UserResponse, BOOTSTRAP_ADMIN_ID, DEFAULT_PROFILE_PHOTO};
