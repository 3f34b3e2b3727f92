use crate::errors::AppError;

/// Runtime configuration resolved from the environment.
///
/// `PORTAL_CLIENT_ID` and `PORTAL_CONFIG_REPO` are required; everything else
/// has a production default. The client secret stays optional so a PAT-only
/// deployment can run without an OAuth app, in which case the token-exchange
/// endpoint reports a configuration error instead of serving half an OAuth
/// flow.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// GitHub REST API base, e.g. `https://api.github.com`.
    pub github_api_base: String,
    /// GitHub web/OAuth base, e.g. `https://github.com`.
    pub github_oauth_base: String,
    /// Static site hosting the permission document and resource schemas.
    pub site_base: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    /// Fixed CORS origin for the browser frontend; `None` reflects any origin.
    pub site_origin: Option<String>,
    /// `owner/name` of the configuration repository receiving requests.
    pub config_repo: String,
    pub default_branch: String,
    /// Team whose members get the admin role.
    pub admin_team: String,
    /// Team whose members get the contributor role.
    pub contributor_team: String,
    pub app_port: u16,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let client_id = std::env::var("PORTAL_CLIENT_ID")
            .map_err(|_| AppError::configuration("PORTAL_CLIENT_ID not set"))?;
        let config_repo = std::env::var("PORTAL_CONFIG_REPO")
            .map_err(|_| AppError::configuration("PORTAL_CONFIG_REPO not set"))?;

        let site_base = env_or("PORTAL_SITE_BASE", "https://labenagha.github.io/infra-self-service");
        let redirect_uri = std::env::var("PORTAL_REDIRECT_URI")
            .unwrap_or_else(|_| format!("{site_base}/auth/github/callback"));

        let app_port = std::env::var("APP_PORT")
            .map(|value| value.parse::<u16>())
            .unwrap_or(Ok(8000))
            .map_err(|_| AppError::configuration("APP_PORT must be a valid port number"))?;

        Ok(Self {
            github_api_base: env_or("GITHUB_API_BASE", "https://api.github.com"),
            github_oauth_base: env_or("GITHUB_OAUTH_BASE", "https://github.com"),
            site_base,
            client_id,
            client_secret: std::env::var("PORTAL_CLIENT_SECRET").ok(),
            redirect_uri,
            site_origin: std::env::var("PORTAL_SITE_ORIGIN").ok(),
            config_repo,
            default_branch: env_or("PORTAL_DEFAULT_BRANCH", "main"),
            admin_team: env_or("PORTAL_ADMIN_TEAM", "cie-team"),
            contributor_team: env_or("PORTAL_CONTRIBUTOR_TEAM", "epo-team"),
            app_port,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
