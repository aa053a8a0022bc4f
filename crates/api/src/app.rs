use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use domain::models::PrimaryAdmins;
use domain::services::{EmailTransport, WhatsAppTransport};
use persistence::SharedStore;
use shared::jwt::{AccessTokenVerifier, JwtError};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, require_admin, require_user_auth,
    security_headers_middleware, trace_id,
};
use crate::routes::{accounts, health, public, registrations, retreats};
use crate::services::registration_lifecycle::RetryPolicy;
use crate::services::{
    AccountService, ApprovalTokenService, NotificationDispatcher, RegistrationLifecycle,
};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Arc<Config>,
    pub verifier: AccessTokenVerifier,
    pub lifecycle: RegistrationLifecycle,
    pub approvals: ApprovalTokenService,
    pub accounts: AccountService,
}

impl AppState {
    /// Wires the services over the chosen store and transports.
    ///
    /// `elevated_store` is only used for the registration insert fallback.
    pub fn new(
        config: Config,
        store: SharedStore,
        elevated_store: SharedStore,
        email: Arc<dyn EmailTransport>,
        whatsapp: Arc<dyn WhatsAppTransport>,
    ) -> Result<Self, JwtError> {
        let verifier = AccessTokenVerifier::new(&config.jwt.secret, config.jwt.leeway_secs)?;
        let dispatcher =
            NotificationDispatcher::from_config(email, whatsapp, &config.email, &config.whatsapp);
        let primary_admins = PrimaryAdmins::new(&config.approval.primary_admins);

        let lifecycle = RegistrationLifecycle::new(
            store.clone(),
            elevated_store,
            dispatcher.clone(),
            RetryPolicy::from_config(&config.notifications),
        );
        let approvals = ApprovalTokenService::new(
            store.clone(),
            dispatcher,
            primary_admins.clone(),
            &config.approval,
        );
        let accounts = AccountService::new(store.clone(), approvals.clone(), primary_admins);

        Ok(Self {
            store,
            config: Arc::new(config),
            verifier,
            lifecycle,
            approvals,
            accounts,
        })
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Share-link registration form and the approval link target
    let public_routes = Router::new()
        .route("/api/v1/public/retreats/:share_link", get(public::get_retreat))
        .route(
            "/api/v1/public/retreats/:share_link/registrations",
            post(public::submit_registration),
        )
        .route(
            "/api/v1/public/registrations/:id/resend-confirmation",
            post(public::resend_confirmation),
        )
        .route(
            "/api/v1/accounts/approval-requests",
            post(accounts::request_approval),
        )
        .route("/api/v1/accounts/approve", post(accounts::approve));

    let account_routes = Router::new()
        .route("/api/v1/accounts/me", get(accounts::me))
        .route("/api/v1/accounts/sign-up", post(accounts::sign_up))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/v1/retreats",
            get(retreats::list_retreats).post(retreats::create_retreat),
        )
        .route(
            "/api/v1/retreats/:id",
            get(retreats::get_retreat)
                .put(retreats::update_retreat)
                .delete(retreats::delete_retreat),
        )
        .route(
            "/api/v1/retreats/:id/registrations",
            get(retreats::list_registrations),
        )
        .route(
            "/api/v1/registrations/:id/payment-link",
            post(registrations::send_payment_link),
        )
        .route(
            "/api/v1/registrations/:id/confirm-payment",
            post(registrations::confirm_payment),
        )
        .route(
            "/api/v1/registrations/:id/resend-notification",
            post(registrations::resend_notification),
        )
        .route(
            "/api/v1/registrations/:id",
            delete(registrations::delete_registration),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let ops_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(ops_routes)
        .merge(public_routes)
        .merge(account_routes)
        .merge(admin_routes)
        // Bottom layers run first
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config))
        .with_state(state)
}
