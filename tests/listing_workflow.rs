//! End-to-end scenarios for the listing review workflow.
//!
//! These exercise the public engine facade and the HTTP router together so
//! the full review cycle, the authorization boundaries, and the transport
//! error mapping are validated without reaching into private modules.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use terralist::workflows::listing::{
    listing_router, Actor, Capability, FicheKind, ListingStatus, ListingWorkflow, MemoryFiches,
    MemoryListings, MemoryNotifications, NewListing, NotificationKind, Visibility, WorkflowError,
};

type MemoryWorkflow = ListingWorkflow<MemoryListings, MemoryFiches, MemoryNotifications>;

fn build_engine() -> (Arc<MemoryWorkflow>, Arc<MemoryNotifications>) {
    let notifications = Arc::new(MemoryNotifications::default());
    let engine = Arc::new(ListingWorkflow::new(
        Arc::new(MemoryListings::default()),
        Arc::new(MemoryFiches::default()),
        notifications.clone(),
    ));
    (engine, notifications)
}

fn owner() -> Actor {
    Actor::new("owner-u", [Capability::Owner])
}

fn agent_a() -> Actor {
    Actor::new("agent-a", [Capability::Agent])
}

fn agent_b() -> Actor {
    Actor::new("agent-b", [Capability::Agent])
}

fn create_draft(engine: &MemoryWorkflow, owner: &Actor) -> terralist::workflows::listing::Listing {
    engine
        .create(
            owner,
            NewListing {
                title: "Hillside plot, Chefchaouen".to_string(),
                visibility: Visibility::Private,
            },
        )
        .expect("draft created")
}

#[test]
fn full_review_cycle_reaches_publication() {
    let (engine, _) = build_engine();
    let owner = owner();
    let agent_a = agent_a();
    let agent_b = agent_b();

    let listing = create_draft(&engine, &owner);
    assert_eq!(listing.status, ListingStatus::Draft);

    for kind in FicheKind::ordered() {
        engine
            .upsert_fiche(&owner, &listing.id, kind, String::new())
            .expect("empty fiche accepted");
    }

    let submitted = engine.submit(&owner, &listing.id).expect("submitted");
    assert_eq!(submitted.status, ListingStatus::Submitted);
    assert!(submitted.submitted_at.is_some());
    assert!(submitted.validated_at.is_none());
    assert!(submitted.published_at.is_none());

    let validated = engine.validate(&agent_a, &listing.id).expect("validated");
    assert_eq!(validated.status, ListingStatus::Validated);
    assert_eq!(validated.agent, Some(agent_a.id.clone()));
    assert!(validated.validated_at.is_some());

    // agent B is locked out once A holds the assignment
    assert!(matches!(
        engine.publish(&agent_b, &listing.id),
        Err(WorkflowError::Forbidden { .. })
    ));

    let published = engine.publish(&agent_a, &listing.id).expect("published");
    assert_eq!(published.status, ListingStatus::Published);
    assert_eq!(published.visibility, Visibility::Public);
    assert!(published.published_at.is_some());
}

#[test]
fn submit_with_two_of_three_fiches_names_the_missing_kind() {
    let (engine, _) = build_engine();
    let owner = owner();
    let listing = create_draft(&engine, &owner);

    engine
        .upsert_fiche(&owner, &listing.id, FicheKind::Technique, String::new())
        .expect("fiche");
    engine
        .upsert_fiche(&owner, &listing.id, FicheKind::Juridique, String::new())
        .expect("fiche");

    match engine.submit(&owner, &listing.id) {
        Err(WorkflowError::PreconditionFailed { missing }) => {
            assert_eq!(missing, vec![FicheKind::Financiere]);
        }
        other => panic!("expected precondition failure, got {other:?}"),
    }

    let stored = engine.get(&listing.id).expect("listing");
    assert_eq!(stored.status, ListingStatus::Draft);
}

#[test]
fn rejection_roundtrip_resubmits_with_a_fresh_timestamp() {
    let (engine, notifications) = build_engine();
    let owner = owner();
    let agent = agent_a();

    let listing = create_draft(&engine, &owner);
    for kind in FicheKind::ordered() {
        engine
            .upsert_fiche(&owner, &listing.id, kind, String::new())
            .expect("fiche");
    }

    let first = engine.submit(&owner, &listing.id).expect("submitted");
    let first_stamp = first.submitted_at.expect("stamped");

    engine
        .refuse(&agent, &listing.id, Some("access road unclear".to_string()))
        .expect("refused");

    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = engine.submit(&owner, &listing.id).expect("resubmitted");
    let second_stamp = second.submitted_at.expect("stamped again");

    assert_eq!(second.status, ListingStatus::Submitted);
    assert!(second_stamp > first_stamp);

    let rejection = notifications
        .all()
        .into_iter()
        .find(|notification| notification.kind == NotificationKind::ListingRejected)
        .expect("owner was told about the rejection");
    assert_eq!(rejection.recipient, owner.id);
    assert!(rejection.message.contains("access road unclear"));
}

#[test]
fn recipients_mark_their_own_notifications_read() {
    let (engine, _) = build_engine();
    let owner = owner();
    let agent = agent_a();

    let listing = create_draft(&engine, &owner);
    for kind in FicheKind::ordered() {
        engine
            .upsert_fiche(&owner, &listing.id, kind, String::new())
            .expect("fiche");
    }
    engine.submit(&owner, &listing.id).expect("submitted");
    engine
        .request_revision(&agent, &listing.id, None)
        .expect("revision");

    let inbox = engine.notifications_for(&owner.id).expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert!(!inbox[0].read);

    // another user cannot flip someone else's flag
    assert!(matches!(
        engine.mark_notification_read(&agent, &inbox[0].id),
        Err(WorkflowError::NotFound)
    ));

    let read = engine
        .mark_notification_read(&owner, &inbox[0].id)
        .expect("owner marks read");
    assert!(read.read);
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json payload")
}

fn json_request(method: Method, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn actor_json(id: &str, capabilities: &[&str]) -> Value {
    json!({ "id": id, "capabilities": capabilities })
}

#[tokio::test]
async fn router_translates_the_workflow_to_http() {
    let (engine, _) = build_engine();
    let app = listing_router(engine);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/listings",
            json!({
                "actor": actor_json("owner-u", &["owner"]),
                "title": "Orchard parcel, Midelt",
            }),
        ))
        .await
        .expect("create routed");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["status"], "brouillon");
    let listing_id = created["id"].as_str().expect("listing id").to_string();

    // submit before any fiche exists: 422 with the full missing list
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/listings/{listing_id}/submit"),
            json!({ "actor": actor_json("owner-u", &["owner"]) }),
        ))
        .await
        .expect("submit routed");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(
        body["missing_fiches"],
        json!(["technique", "financiere", "juridique"])
    );

    for kind in ["technique", "financiere", "juridique"] {
        let response = app
            .clone()
            .oneshot(json_request(
                Method::PUT,
                &format!("/api/v1/listings/{listing_id}/fiches/{kind}"),
                json!({
                    "actor": actor_json("owner-u", &["owner"]),
                    "expert_notes": "initial notes",
                }),
            ))
            .await
            .expect("fiche routed");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/listings/{listing_id}/submit"),
            json!({ "actor": actor_json("owner-u", &["owner"]) }),
        ))
        .await
        .expect("submit routed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "soumis");

    // a stranger probing the validate endpoint is rejected, not routed around
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/listings/{listing_id}/validate"),
            json!({ "actor": actor_json("visitor", &[]) }),
        ))
        .await
        .expect("validate routed");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/listings/{listing_id}/validate"),
            json!({ "actor": actor_json("agent-a", &["agent"]) }),
        ))
        .await
        .expect("validate routed");
    assert_eq!(response.status(), StatusCode::OK);
    let validated = json_body(response).await;
    assert_eq!(validated["status"], "valide");
    assert_eq!(validated["agent"], "agent-a");
}

#[tokio::test]
async fn router_reports_invalid_transitions_with_current_status() {
    let (engine, _) = build_engine();
    let app = listing_router(engine.clone());

    let owner = owner();
    let listing = create_draft(&engine, &owner);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/listings/{}/publish", listing.id),
            json!({ "actor": actor_json("agent-a", &["agent"]) }),
        ))
        .await
        .expect("publish routed");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["current_status"], "brouillon");
}

#[tokio::test]
async fn router_maps_unknown_listing_to_not_found() {
    let (engine, _) = build_engine();
    let app = listing_router(engine);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/listings/lst-999999")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("get routed");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn router_rejects_unknown_fiche_kinds() {
    let (engine, _) = build_engine();
    let app = listing_router(engine.clone());

    let owner = owner();
    let listing = create_draft(&engine, &owner);

    let response = app
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/v1/listings/{}/fiches/architectural", listing.id),
            json!({
                "actor": actor_json("owner-u", &["owner"]),
                "expert_notes": "misrouted",
            }),
        ))
        .await
        .expect("fiche routed");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("architectural"));
}
