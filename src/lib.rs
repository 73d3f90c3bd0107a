use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Shared building blocks.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod links;
pub mod pagination;
pub mod permission;

// Domain, persistence and HTTP resources.
pub mod handlers;
pub mod models;
pub mod repository;

// Routing split by access level (public, authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// The OpenAPI document of every console resource, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::user::get_current_user,
        handlers::apis::list_apis, handlers::apis::create_api, handlers::apis::get_api,
        handlers::apis::update_api, handlers::apis::delete_api, handlers::apis::start_api,
        handlers::apis::stop_api,
        handlers::plans::list_plans, handlers::plans::create_plan, handlers::plans::get_plan,
        handlers::plans::update_plan, handlers::plans::delete_plan, handlers::plans::publish_plan,
        handlers::plans::deprecate_plan, handlers::plans::close_plan,
        handlers::members::list_members, handlers::members::add_member,
        handlers::members::update_member, handlers::members::delete_member,
        handlers::members::transfer_ownership, handlers::members::get_member_permissions,
        handlers::subscriptions::list_subscriptions, handlers::subscriptions::export_subscriptions,
        handlers::subscriptions::create_subscription, handlers::subscriptions::get_subscription,
        handlers::subscriptions::update_subscription, handlers::subscriptions::accept_subscription,
        handlers::subscriptions::reject_subscription, handlers::subscriptions::pause_subscription,
        handlers::subscriptions::resume_subscription,
        handlers::subscriptions::close_subscription_handler,
        handlers::metadata::list_metadata, handlers::metadata::create_metadata,
        handlers::metadata::get_metadata, handlers::metadata::update_metadata,
        handlers::metadata::delete_metadata,
        handlers::logs::list_logs, handlers::logs::get_log, handlers::logs::list_messages
    ),
    components(
        schemas(
            error::ErrorBody, error::ErrorDetail, pagination::Pagination, links::Links,
            models::UserProfile,
            models::ApiResponse, models::ApisResponse, models::CreateApi, models::UpdateApi,
            models::DefinitionVersion, models::ApiState, models::ApiLifecycleState,
            models::Visibility, models::PrimaryOwner,
            models::PlanResponse, models::PlansResponse, models::CreatePlan, models::UpdatePlan,
            models::PlanStatus, models::PlanSecurityType, models::PlanMode,
            models::PlanValidation, models::BasePlan,
            models::MemberResponse, models::MembersResponse, models::MemberRole,
            models::AddMember, models::UpdateMember, models::TransferOwnership, models::RoleScope,
            models::SubscriptionResponse, models::SubscriptionsResponse,
            models::CreateSubscription, models::UpdateSubscription, models::AcceptSubscription,
            models::RejectSubscription, models::SubscriptionStatus, models::BaseApplication,
            models::MetadataEntry, models::MetadataResponse, models::CreateMetadata,
            models::UpdateMetadata, models::MetadataFormat,
            models::ApiLog, models::ApiLogsResponse, models::ApiLogDetail, models::LogExchange,
            models::LogRequest, models::LogResponse, models::ApiMessageLog,
            models::ApiMessageLogsResponse, models::MessageOperation, models::ConnectorType,
        )
    ),
    tags(
        (name = "apis", description = "API definitions and lifecycle"),
        (name = "plans", description = "API plans"),
        (name = "members", description = "API members and ownership"),
        (name = "subscriptions", description = "Application subscriptions to plans"),
        (name = "metadata", description = "API metadata"),
        (name = "logs", description = "Connection and message logs"),
        (name = "user", description = "Current user")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The shared, cheaply cloneable state handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres or in-memory).
    pub repo: RepositoryState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors such as `AuthUser` pull single components out of `AppState`.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Runs the `AuthUser` extractor before the handler. A failed authentication
/// rejects the request with 401 and the JSON error body.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routes, the authentication layer, the observability stack
/// and the shared state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. A UUID `x-request-id` for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. One tracing span per request, tagged with that id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echo the id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span: method, URI and the `x-request-id` header, so
/// every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
