use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use terralist::config::AppConfig;
use terralist::error::AppError;
use terralist::telemetry;
use terralist::workflows::listing::{
    listing_router, Actor, Capability, FicheKind, Listing, ListingWorkflow, MemoryFiches,
    MemoryListings, MemoryNotifications, NewListing, Visibility,
};
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "terralist",
    about = "Run the land-listing marketplace review workflow service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a listing through a full review cycle and print each step
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let engine = Arc::new(ListingWorkflow::new(
        Arc::new(MemoryListings::default()),
        Arc::new(MemoryFiches::default()),
        Arc::new(MemoryNotifications::default()),
    ));

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(listing_router(engine))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "listing workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn run_demo() -> Result<(), AppError> {
    let notifications = Arc::new(MemoryNotifications::default());
    let engine = ListingWorkflow::new(
        Arc::new(MemoryListings::default()),
        Arc::new(MemoryFiches::default()),
        notifications.clone(),
    );

    let owner = Actor::new("owner-demo", [Capability::Owner]);
    let agent = Actor::new("agent-demo", [Capability::Agent]);

    println!("Listing review cycle demo");

    let listing = engine.create(
        &owner,
        NewListing {
            title: "3.2ha plot near Essaouira".to_string(),
            visibility: Visibility::Private,
        },
    )?;
    print_step("owner creates draft", &listing);

    for kind in FicheKind::ordered() {
        engine.upsert_fiche(
            &owner,
            &listing.id,
            kind,
            format!("initial {kind} notes from the owner"),
        )?;
        println!("  fiche {kind} created");
    }

    let listing = engine.submit(&owner, &listing.id)?;
    print_step("owner submits for review", &listing);

    let listing = engine.request_revision(
        &agent,
        &listing.id,
        Some("boundary survey missing".to_string()),
    )?;
    print_step("agent requests a revision", &listing);

    let listing = engine.submit(&owner, &listing.id)?;
    print_step("owner resubmits", &listing);

    let listing = engine.validate(&agent, &listing.id)?;
    print_step("agent validates", &listing);

    let listing = engine.publish(&agent, &listing.id)?;
    print_step("agent publishes", &listing);

    println!("\nOwner notifications");
    for notification in notifications.all() {
        println!("- [{}] {}", notification.kind.as_str(), notification.message);
    }

    Ok(())
}

fn print_step(label: &str, listing: &Listing) {
    let agent = listing
        .agent
        .as_ref()
        .map(|agent| agent.0.as_str())
        .unwrap_or("unassigned");
    println!(
        "- {label}: status {}, agent {agent}",
        listing.status.as_str()
    );
}
