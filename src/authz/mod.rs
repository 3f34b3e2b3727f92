//! Authorization module - role derivation and the team permission document.
//!
//! Access in the portal is a two-step lookup:
//! - GitHub team membership determines the caller's [`Role`]
//! - the statically hosted permission document maps the role's team to a
//!   [`TeamPolicy`] (environments, resource kinds, approvals, limitations)
//!
//! The real access control lives in GitHub branch protections and Actions
//! permissions; the portal only ever presents and validates allowed choices.

mod policy;
mod role;

pub use policy::{Limitation, PermissionDocument, TeamPolicy};
pub use role::{derive_role, Role};
