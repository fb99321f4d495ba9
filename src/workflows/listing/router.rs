use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Actor, FicheKind, ListingId, NotificationId, UserId, Visibility};
use super::engine::{ListingWorkflow, NewListing, WorkflowError};
use super::repository::{FicheRepository, ListingRepository, ListingView, NotificationSink};

/// Router builder exposing the listing workflow over HTTP.
///
/// Handlers are a pure translation layer: deserialize the request (every
/// body carries an explicit actor descriptor), invoke the engine, map the
/// typed error onto a transport status. No workflow rules live here.
pub fn listing_router<L, F, N>(engine: Arc<ListingWorkflow<L, F, N>>) -> Router
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route("/api/v1/listings", post(create_handler::<L, F, N>))
        .route(
            "/api/v1/listings/:listing_id",
            get(get_handler::<L, F, N>).delete(delete_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/submit",
            post(submit_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/revision",
            post(revision_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/validate",
            post(validate_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/refuse",
            post(refuse_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/publish",
            post(publish_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/sold",
            post(sold_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/agent",
            post(reassign_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/fiches",
            get(fiches_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/fiches/:kind",
            put(fiche_upsert_handler::<L, F, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/fiches/:kind/validate",
            post(fiche_validate_handler::<L, F, N>),
        )
        .route(
            "/api/v1/notifications/:user_id",
            get(notifications_handler::<L, F, N>),
        )
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(mark_read_handler::<L, F, N>),
        )
        .with_state(engine)
}

fn default_visibility() -> Visibility {
    Visibility::Private
}

#[derive(Debug, Deserialize)]
struct CreateListingRequest {
    actor: Actor,
    title: String,
    #[serde(default = "default_visibility")]
    visibility: Visibility,
}

#[derive(Debug, Deserialize)]
struct ActorRequest {
    actor: Actor,
}

#[derive(Debug, Deserialize)]
struct RevisionRequest {
    actor: Actor,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefuseRequest {
    actor: Actor,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReassignRequest {
    actor: Actor,
    agent: Actor,
}

#[derive(Debug, Deserialize)]
struct FicheUpsertRequest {
    actor: Actor,
    #[serde(default)]
    expert_notes: String,
}

#[derive(Debug, Deserialize)]
struct FicheValidateRequest {
    actor: Actor,
    conclusion: String,
    rating: u8,
}

fn error_response(error: WorkflowError) -> Response {
    match error {
        WorkflowError::Forbidden { .. } => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::FORBIDDEN, axum::Json(payload)).into_response()
        }
        WorkflowError::InvalidTransition { current, .. } => {
            let payload = json!({
                "error": error.to_string(),
                "current_status": current.as_str(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        WorkflowError::PreconditionFailed { ref missing } => {
            let kinds: Vec<&str> = missing.iter().map(|kind| kind.as_str()).collect();
            let payload = json!({
                "error": error.to_string(),
                "missing_fiches": kinds,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        WorkflowError::Validation(_) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        WorkflowError::StateConflict { .. } => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        WorkflowError::NotFound => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        WorkflowError::Repository(_) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}

fn listing_response(
    result: Result<super::domain::Listing, WorkflowError>,
    success: StatusCode,
) -> Response {
    match result {
        Ok(listing) => (success, axum::Json(ListingView::from(&listing))).into_response(),
        Err(error) => error_response(error),
    }
}

fn parse_kind(raw: &str) -> Result<FicheKind, Response> {
    raw.parse::<FicheKind>().map_err(|err| {
        let payload = json!({ "error": err.to_string() });
        (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
    })
}

async fn create_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    axum::Json(request): axum::Json<CreateListingRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    let new = NewListing {
        title: request.title,
        visibility: request.visibility,
    };
    listing_response(engine.create(&request.actor, new), StatusCode::CREATED)
}

async fn get_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    listing_response(engine.get(&ListingId(listing_id)), StatusCode::OK)
}

async fn submit_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    listing_response(
        engine.submit(&request.actor, &ListingId(listing_id)),
        StatusCode::OK,
    )
}

async fn revision_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
    axum::Json(request): axum::Json<RevisionRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    listing_response(
        engine.request_revision(&request.actor, &ListingId(listing_id), request.message),
        StatusCode::OK,
    )
}

async fn validate_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    listing_response(
        engine.validate(&request.actor, &ListingId(listing_id)),
        StatusCode::OK,
    )
}

async fn refuse_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
    axum::Json(request): axum::Json<RefuseRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    listing_response(
        engine.refuse(&request.actor, &ListingId(listing_id), request.reason),
        StatusCode::OK,
    )
}

async fn publish_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    listing_response(
        engine.publish(&request.actor, &ListingId(listing_id)),
        StatusCode::OK,
    )
}

async fn sold_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    listing_response(
        engine.mark_sold(&request.actor, &ListingId(listing_id)),
        StatusCode::OK,
    )
}

async fn reassign_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
    axum::Json(request): axum::Json<ReassignRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    listing_response(
        engine.reassign(&request.actor, &ListingId(listing_id), &request.agent),
        StatusCode::OK,
    )
}

async fn delete_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    match engine.delete(&request.actor, &ListingId(listing_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

async fn fiches_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(listing_id): Path<String>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    match engine.fiches_for(&ListingId(listing_id)) {
        Ok(fiches) => (StatusCode::OK, axum::Json(fiches)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn fiche_upsert_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path((listing_id, kind)): Path<(String, String)>,
    axum::Json(request): axum::Json<FicheUpsertRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match engine.upsert_fiche(
        &request.actor,
        &ListingId(listing_id),
        kind,
        request.expert_notes,
    ) {
        Ok(fiche) => (StatusCode::OK, axum::Json(fiche)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn fiche_validate_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path((listing_id, kind)): Path<(String, String)>,
    axum::Json(request): axum::Json<FicheValidateRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match engine.validate_fiche(
        &request.actor,
        &ListingId(listing_id),
        kind,
        request.conclusion,
        request.rating,
    ) {
        Ok(fiche) => (StatusCode::OK, axum::Json(fiche)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn notifications_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(user_id): Path<String>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    match engine.notifications_for(&UserId(user_id)) {
        Ok(notifications) => (StatusCode::OK, axum::Json(notifications)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn mark_read_handler<L, F, N>(
    State(engine): State<Arc<ListingWorkflow<L, F, N>>>,
    Path(notification_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    match engine.mark_notification_read(&request.actor, &NotificationId(notification_id)) {
        Ok(notification) => (StatusCode::OK, axum::Json(notification)).into_response(),
        Err(error) => error_response(error),
    }
}
