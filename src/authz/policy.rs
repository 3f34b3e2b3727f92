use std::collections::HashMap;

use serde::Deserialize;

use super::Role;

/// The statically hosted permission document, keyed by team.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionDocument {
    #[serde(default)]
    pub teams: HashMap<String, TeamPolicy>,
}

/// One team's capabilities.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TeamPolicy {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    /// Environments needing an approval; absent means no approval required.
    #[serde(default)]
    pub approval_required: HashMap<String, bool>,
    /// Per resource kind, per field: an allowed-value set or a numeric cap.
    #[serde(default)]
    pub limitations: HashMap<String, HashMap<String, Limitation>>,
}

/// A field limitation is either a whitelist of values or a numeric maximum.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Limitation {
    Allowed(Vec<String>),
    Maximum(f64),
}

impl PermissionDocument {
    /// Case-insensitive team lookup (the deployed document has drifted
    /// between `CIE-Team` and `cie-team` spellings).
    pub fn team(&self, key: &str) -> Option<&TeamPolicy> {
        self.teams
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, policy)| policy)
    }

    /// Resolves the policy snapshot for a role. Viewers get an empty policy:
    /// no environments, no resources.
    pub fn policy_for_role(&self, role: Role, admin_team: &str, contributor_team: &str) -> TeamPolicy {
        let key = match role {
            Role::Admin => admin_team,
            Role::Contributor => contributor_team,
            Role::Viewer => return TeamPolicy::default(),
        };
        self.team(key).cloned().unwrap_or_default()
    }
}

impl TeamPolicy {
    pub fn allows_resource(&self, kind: &str) -> bool {
        self.resources.iter().any(|r| r == kind)
    }

    pub fn allows_environment(&self, environment: &str) -> bool {
        self.environments.iter().any(|e| e == environment)
    }

    pub fn requires_approval(&self, environment: &str) -> bool {
        self.approval_required.get(environment).copied().unwrap_or(false)
    }

    pub fn limitation(&self, kind: &str, field: &str) -> Option<&Limitation> {
        self.limitations.get(kind).and_then(|fields| fields.get(field))
    }
}
