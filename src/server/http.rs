//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling; one task per
//! connection, shared state behind an Arc.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::ledger::Ledger;
use crate::reservations::ReservationService;
use crate::routes;
use crate::settlement::{guard, AttemptGuard, Reconciler, SettlementGateway};
use crate::sweep;
use crate::types::CoreError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub ledger: Arc<Ledger>,
    pub reservations: ReservationService,
    pub reconciler: Reconciler,
    pub guard: Arc<AttemptGuard>,
}

impl AppState {
    /// Wire the core together around the given gateway implementation.
    pub fn new(args: Args, gateway: Arc<dyn SettlementGateway>) -> Self {
        let ledger = Arc::new(Ledger::new());
        let guard = Arc::new(AttemptGuard::new(args.guard_config()));
        let reservations = ReservationService::new(Arc::clone(&ledger));
        let reconciler = Reconciler::new(Arc::clone(&ledger), gateway, Arc::clone(&guard));

        Self {
            args,
            ledger,
            reservations,
            reconciler,
            guard,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), CoreError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Wheelhouse listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - stub payment gateway in use");
    }

    // Background sweeps: expired settlement attempts, overdue completions
    guard::spawn_cleanup_task(Arc::clone(&state.guard));
    sweep::spawn_completion_sweep(Arc::clone(&state.ledger), state.args.sweep_interval());

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("{} {}", method, path);

    let response = match (method, path.as_str()) {
        // Health probes
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(&state),
        (Method::GET, "/readyz") => routes::readiness_check(&state),

        // CORS preflight
        (Method::OPTIONS, _) => routes::preflight_response(),

        // Asset registration (interface plumbing; listing CRUD is external)
        (Method::POST, "/api/v1/assets") => routes::create_asset(state, req).await,

        // GET /api/v1/assets/{id}/availability?start=..&end=..
        (Method::GET, p) if p.starts_with("/api/v1/assets/") && p.ends_with("/availability") => {
            let query = req.uri().query().map(|q| q.to_string());
            routes::check_availability(state, p, query.as_deref())
        }

        // Booking operations
        (Method::POST, "/api/v1/bookings") => routes::create_booking(state, req).await,
        (Method::POST, p)
            if p.starts_with("/api/v1/bookings/") && p.ends_with("/status") =>
        {
            routes::update_booking_status(state, req, &path).await
        }

        // Settlement operations
        (Method::POST, "/api/v1/settlements/initiate") => {
            routes::initiate_settlement(state, req).await
        }
        (Method::POST, "/api/v1/settlements/reconcile") => {
            routes::reconcile_settlement(state, req).await
        }

        // Not found
        _ => routes::not_found_response(&path),
    };

    Ok(response)
}
