/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use parcelhub_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::from_config(pool, config)?;
/// let app = parcelhub_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::middleware::auth::{admin_gate, identity_gate};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use parcelhub_shared::auth::identity::IdentityVerifier;
use parcelhub_shared::auth::jwt::JwtIdentityVerifier;
use parcelhub_shared::gateway::{PaymentGateway, StripeGateway};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Checks bearer ID tokens
    pub identity: Arc<dyn IdentityVerifier>,

    /// Creates charge intents
    pub gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
    /// Creates application state from explicit collaborators
    pub fn new(
        db: PgPool,
        config: Config,
        identity: Arc<dyn IdentityVerifier>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            identity,
            gateway,
        }
    }

    /// Creates application state with the production collaborators
    pub fn from_config(db: PgPool, config: Config) -> anyhow::Result<Self> {
        let identity = JwtIdentityVerifier::new(
            &config.identity.jwt_secret,
            &config.identity.issuer,
            &config.identity.audience,
        );
        let gateway = StripeGateway::new(&config.gateway.secret_key, &config.gateway.base_url)?;

        Ok(Self::new(db, config, Arc::new(identity), Arc::new(gateway)))
    }
}

/// Requires a verified identity on `route`
fn authenticated(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.clone(), identity_gate))
}

/// Requires a verified identity whose user is an admin
fn admin_only(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    // Layers added last run first: the identity gate, then the role check
    route
        .route_layer(from_fn_with_state(state.clone(), admin_gate))
        .route_layer(from_fn_with_state(state.clone(), identity_gate))
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET    /                            # Banner (public)
/// ├── GET    /health                      # Health check (public)
/// ├── /users
/// │   ├── POST   /                        # Sign-in upsert (public)
/// │   ├── GET    /search?email=           # Partial email search (public)
/// │   └── PATCH  /:id/role                # Change role (admin)
/// ├── /parcels
/// │   ├── GET    /?email=                 # List (identity; all parcels: admin)
/// │   ├── POST   /                        # Book a parcel (identity)
/// │   ├── GET    /:id                     # Fetch one (public)
/// │   └── DELETE /:id                     # Delete unpaid (owner)
/// ├── /riders
/// │   ├── POST   /                        # Apply (identity)
/// │   ├── GET    /pending, /active        # Dashboards (public)
/// │   ├── PATCH  /:id/status              # Lifecycle transition (admin)
/// │   └── PATCH  /deactivate/:id          # active → inactive (admin)
/// ├── /payments
/// │   ├── GET    /?email=                 # Ledger by payer (identity = email)
/// │   └── POST   /                        # Settle a parcel (identity = email)
/// └── POST   /create-payment-intent       # Charge intent (identity)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Authorization gate (per-route basis)
pub fn build_router(state: AppState) -> Router {
    // Import route handlers
    use crate::routes;

    let public_routes = Router::new()
        .route("/", get(routes::health::banner))
        .route("/health", get(routes::health::health_check));

    let user_routes = Router::new()
        .route("/users", post(routes::users::upsert_user))
        .route("/users/search", get(routes::users::search_users))
        .route("/users/:id/role", admin_only(&state, patch(routes::users::update_role)));

    let parcel_routes = Router::new()
        .route(
            "/parcels",
            authenticated(
                &state,
                get(routes::parcels::list_parcels).post(routes::parcels::create_parcel),
            ),
        )
        .route(
            "/parcels/:id",
            get(routes::parcels::get_parcel)
                .merge(authenticated(&state, delete(routes::parcels::delete_parcel))),
        );

    let rider_routes = Router::new()
        .route("/riders", authenticated(&state, post(routes::riders::apply)))
        .route("/riders/pending", get(routes::riders::list_pending))
        .route("/riders/active", get(routes::riders::list_active))
        .route("/riders/:id/status", admin_only(&state, patch(routes::riders::update_status)))
        .route("/riders/deactivate/:id", admin_only(&state, patch(routes::riders::deactivate)));

    let payment_routes = Router::new()
        .route(
            "/payments",
            authenticated(
                &state,
                get(routes::payments::list_payments).post(routes::payments::record_payment),
            ),
        )
        .route(
            "/create-payment-intent",
            authenticated(&state, post(routes::intents::create_payment_intent)),
        );

    // Configure CORS based on environment
    let cors = if state.config.allows_any_origin() {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Production mode: configure allowed origins
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(parcel_routes)
        .merge(rider_routes)
        .merge(payment_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
