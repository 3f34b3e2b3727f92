use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::PortalConfig;
use crate::errors::AppError;
use crate::github::GithubClient;
use crate::routes::{auth, exchange, health, requests, resources};
use crate::session::{MemorySessions, SessionBackend, StateRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub github: GithubClient,
    pub sessions: Arc<dyn SessionBackend>,
    pub states: Arc<StateRegistry>,
}

impl AppState {
    pub fn new(config: PortalConfig) -> Result<Self, AppError> {
        let github = GithubClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            github,
            sessions: Arc::new(MemorySessions::default()),
            states: Arc::new(StateRegistry::default()),
        })
    }
}

pub async fn create_app(config: PortalConfig) -> Result<Router, AppError> {
    // Origin fixed to the static site when configured, permissive otherwise.
    // The layer also answers pre-flight OPTIONS requests.
    let cors = match config.site_origin.as_deref() {
        Some(origin) => {
            let origin = origin
                .parse::<HeaderValue>()
                .map_err(|_| AppError::configuration("PORTAL_SITE_ORIGIN is not a valid origin"))?;
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_origin(origin)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_origin(Any)
            .allow_headers(Any),
    };

    let state = AppState::new(config)?;

    let auth_routes = Router::new()
        .route("/authorize", get(auth::authorize))
        .route("/callback", post(auth::callback))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .route("/exchange-token", post(exchange::exchange_token));

    let resource_routes = Router::new()
        .route("/", get(resources::list_resources))
        .route("/:kind/form", get(resources::resource_form));

    let router = Router::new()
        .nest("/auth", auth_routes)
        .nest("/resources", resource_routes)
        .route("/requests", post(requests::submit_request))
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
