use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Duration;
use identity_service::config::Config;
use identity_service::config::MailMode;
use identity_service::domain::account::kind::AdminKind;
use identity_service::domain::account::kind::Role;
use identity_service::domain::account::kind::UserKind;
use identity_service::domain::account::ports::IdentityOps;
use identity_service::domain::account::ports::NotificationDispatcher;
use identity_service::domain::account::service::IdentityService;
use identity_service::domain::account::service::LifecyclePolicy;
use identity_service::domain::account::session::SessionTokenIssuer;
use identity_service::inbound::http::router::create_router;
use identity_service::outbound::mailer::HttpMailer;
use identity_service::outbound::mailer::TracingMailer;
use identity_service::outbound::repositories::postgres::PgAccountStore;
use sqlx::postgres::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        database_url = %config.database.url,
        http_port = config.server.http_port,
        mail_mode = ?config.mail.mode,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let sessions = Arc::new(SessionTokenIssuer::new(
        config.jwt.secret.as_bytes(),
        Duration::minutes(config.jwt.access_token_minutes),
        Duration::minutes(config.jwt.refresh_token_minutes),
    ));
    let policy = LifecyclePolicy {
        verify_token_ttl: Duration::minutes(config.tokens.verify_ttl_minutes),
        reset_token_ttl: Duration::minutes(config.tokens.reset_ttl_minutes),
        max_login_attempts: config.lockout.max_login_attempts,
        lockout_window: Duration::minutes(config.lockout.window_minutes),
    };

    let (user_ops, admin_ops) = match config.mail.mode {
        MailMode::Log => {
            build_services(
                Arc::new(TracingMailer),
                &pg_pool,
                &sessions,
                &policy,
                &config.mail.link_base_url,
            )
            .await
        }
        MailMode::Http => {
            // Presence of api_url in http mode is enforced by Config::load.
            let api_url = config
                .mail
                .api_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("mail.api_url missing in http mode"))?;
            build_services(
                Arc::new(HttpMailer::new(api_url, config.mail.from.clone())?),
                &pg_pool,
                &sessions,
                &policy,
                &config.mail.link_base_url,
            )
            .await
        }
    };

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(user_ops, admin_ops, sessions);
    axum::serve(
        http_listener,
        // Login records the caller's address when no proxy header names one.
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Wire the member-side and staff-side services over one mail channel.
///
/// A failed startup connect is logged and tolerated; each send reconnects
/// on its own, and mail must never keep the identity endpoints down.
async fn build_services<N>(
    mailer: Arc<N>,
    pool: &PgPool,
    sessions: &Arc<SessionTokenIssuer>,
    policy: &LifecyclePolicy,
    link_base: &str,
) -> (Arc<dyn IdentityOps>, Arc<dyn IdentityOps>)
where
    N: NotificationDispatcher,
{
    if let Err(e) = mailer.connect().await {
        tracing::warn!(error = %e, "Mail channel unavailable at startup, sends will retry");
    }

    let users = IdentityService::<UserKind, _, _>::new(
        Arc::new(PgAccountStore::new(pool.clone(), Role::User)),
        Arc::clone(&mailer),
        Arc::clone(sessions),
        policy.clone(),
        link_base.to_string(),
    );
    let admins = IdentityService::<AdminKind, _, _>::new(
        Arc::new(PgAccountStore::new(pool.clone(), Role::Admin)),
        mailer,
        Arc::clone(sessions),
        policy.clone(),
        link_base.to_string(),
    );

    (Arc::new(users), Arc::new(admins))
}
