use crate::{
    AppState,
    handlers::{apis, logs, members, metadata, plans, subscriptions, user},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every console resource. Handlers receive a validated `AuthUser` and run
/// their own permission checks against the environment or API they target.
///
/// Literal segments (`_start`, `_export`, `permissions`, ...) take precedence
/// over the `{planId}`-style captures registered next to them.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/user", get(user::get_current_user))
        .nest("/environments/{envId}", environment_routes())
}

fn environment_routes() -> Router<AppState> {
    Router::new()
        // --- APIs ---
        .route("/apis", get(apis::list_apis).post(apis::create_api))
        .route(
            "/apis/{apiId}",
            get(apis::get_api)
                .put(apis::update_api)
                .delete(apis::delete_api),
        )
        .route("/apis/{apiId}/_start", post(apis::start_api))
        .route("/apis/{apiId}/_stop", post(apis::stop_api))
        // --- Plans ---
        .route(
            "/apis/{apiId}/plans",
            get(plans::list_plans).post(plans::create_plan),
        )
        .route(
            "/apis/{apiId}/plans/{planId}",
            get(plans::get_plan)
                .put(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route("/apis/{apiId}/plans/{planId}/_publish", post(plans::publish_plan))
        .route("/apis/{apiId}/plans/{planId}/_deprecate", post(plans::deprecate_plan))
        .route("/apis/{apiId}/plans/{planId}/_close", post(plans::close_plan))
        // --- Members ---
        .route(
            "/apis/{apiId}/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/apis/{apiId}/members/permissions",
            get(members::get_member_permissions),
        )
        .route(
            "/apis/{apiId}/members/_transfer-ownership",
            post(members::transfer_ownership),
        )
        .route(
            "/apis/{apiId}/members/{memberId}",
            put(members::update_member).delete(members::delete_member),
        )
        // --- Subscriptions ---
        .route(
            "/apis/{apiId}/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::create_subscription),
        )
        .route(
            "/apis/{apiId}/subscriptions/_export",
            get(subscriptions::export_subscriptions),
        )
        .route(
            "/apis/{apiId}/subscriptions/{subscriptionId}",
            get(subscriptions::get_subscription).put(subscriptions::update_subscription),
        )
        .route(
            "/apis/{apiId}/subscriptions/{subscriptionId}/_accept",
            post(subscriptions::accept_subscription),
        )
        .route(
            "/apis/{apiId}/subscriptions/{subscriptionId}/_reject",
            post(subscriptions::reject_subscription),
        )
        .route(
            "/apis/{apiId}/subscriptions/{subscriptionId}/_pause",
            post(subscriptions::pause_subscription),
        )
        .route(
            "/apis/{apiId}/subscriptions/{subscriptionId}/_resume",
            post(subscriptions::resume_subscription),
        )
        .route(
            "/apis/{apiId}/subscriptions/{subscriptionId}/_close",
            post(subscriptions::close_subscription_handler),
        )
        // --- Metadata ---
        .route(
            "/apis/{apiId}/metadata",
            get(metadata::list_metadata).post(metadata::create_metadata),
        )
        .route(
            "/apis/{apiId}/metadata/{key}",
            get(metadata::get_metadata)
                .put(metadata::update_metadata)
                .delete(metadata::delete_metadata),
        )
        // --- Logs ---
        .route("/apis/{apiId}/logs", get(logs::list_logs))
        .route("/apis/{apiId}/logs/{requestId}", get(logs::get_log))
        .route(
            "/apis/{apiId}/logs/{requestId}/messages",
            get(logs::list_messages),
        )
}
