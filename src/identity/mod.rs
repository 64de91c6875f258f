//! Sessions, auth accounts and roles.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod profile;
mod authorizer;

pub use principal::{AuthUser, UserMetadata};
pub use session::{Session, SessionScope, SessionStore, SessionToken};
pub use provider::{login, AdminIdentityService, IdentityService, LoginOutcome, SignUpRequest};
pub use profile::{resolve_profile, Profile};
pub use authorizer::{Capabilities, Role};
