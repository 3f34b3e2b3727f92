use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Derived access level, computed from team membership alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Contributor,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Contributor => "contributor",
            Role::Viewer => "viewer",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "contributor" => Ok(Role::Contributor),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Maps a team membership set to a role.
///
/// Priority order: admin team wins over contributor team, everything else is
/// viewer. Team names compare case-insensitively because the deployed config
/// has used both `CIE-Team` and `cie-team` spellings.
pub fn derive_role<'a, I>(team_names: I, admin_team: &str, contributor_team: &str) -> Role
where
    I: IntoIterator<Item = &'a str>,
{
    let mut has_contributor = false;
    for name in team_names {
        if name.eq_ignore_ascii_case(admin_team) {
            return Role::Admin;
        }
        if name.eq_ignore_ascii_case(contributor_team) {
            has_contributor = true;
        }
    }
    if has_contributor {
        Role::Contributor
    } else {
        Role::Viewer
    }
}
