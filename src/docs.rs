use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::auth::authorize,
		routes::auth::callback,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::exchange::exchange_token,
		routes::resources::list_resources,
		routes::resources::resource_form,
		routes::requests::submit_request,
		routes::health::health
	),
	components(
		schemas(
			crate::authz::Role,
			routes::auth::AuthorizeResponse,
			routes::auth::CallbackRequest,
			routes::auth::TokenLoginRequest,
			routes::auth::SessionResponse,
			routes::auth::IdentityResponse,
			routes::auth::MessageResponse,
			routes::exchange::ExchangeRequest,
			routes::exchange::ExchangeResponse,
			routes::resources::ResourceOption,
			routes::requests::SubmitRequest,
			routes::health::HealthResponse,
			crate::forms::FormDescriptor,
			crate::forms::FieldDescriptor,
			crate::forms::EnvironmentOption,
			crate::forms::Widget,
			crate::submit::SubmissionOutcome
		)
	),
	tags(
		(name = "Auth", description = "Login, session and logout"),
		(name = "Exchange", description = "OAuth code-for-token exchange"),
		(name = "Resources", description = "Resource kinds and form descriptors"),
		(name = "Requests", description = "Provisioning request submission"),
		(name = "Health", description = "Service health")
	)
)]
pub struct ApiDoc;

/// Builds the OpenAPI document with a bearer security scheme and a local
/// server entry injected, so the Swagger Authorize dialog works out of the
/// box.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_global_security(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc).expect("OpenAPI serialization must succeed"));

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn ensure_security_components(doc: &mut Value) {
	let root = doc.as_object_mut().expect("OpenAPI root must be an object");
	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.expect("components must be an object");

	components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.expect("securitySchemes must be an object")
		.insert(
			"bearerAuth".to_string(),
			json!({ "type": "http", "scheme": "bearer" }),
		);
}

fn ensure_global_security(doc: &mut Value) {
	let root = doc.as_object_mut().expect("OpenAPI root must be an object");
	root.entry("security")
		.or_insert_with(|| json!([{ "bearerAuth": [] }]));
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let root = doc.as_object_mut().expect("OpenAPI root must be an object");
	root.entry("servers")
		.or_insert_with(|| json!([{ "url": format!("http://localhost:{port}") }]));
}
