use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Duration;
use identity_service::domain::account::errors::DispatchError;
use identity_service::domain::account::kind::AdminKind;
use identity_service::domain::account::kind::UserKind;
use identity_service::domain::account::notifications::EmailMessage;
use identity_service::domain::account::ports::IdentityOps;
use identity_service::domain::account::ports::NotificationDispatcher;
use identity_service::domain::account::service::IdentityService;
use identity_service::domain::account::service::LifecyclePolicy;
use identity_service::domain::account::session::SessionTokenIssuer;
use identity_service::inbound::http::router::create_router;
use identity_service::outbound::repositories::memory::InMemoryAccountStore;

pub const TEST_JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

/// Test application that spawns a real server over in-memory storage.
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub outbox: Outbox,
    pub sessions: Arc<SessionTokenIssuer>,
}

/// Dispatcher that captures every message instead of delivering it, so
/// tests can read verification links and temporary passwords off the mail.
#[derive(Clone, Default)]
pub struct Outbox {
    messages: Arc<Mutex<Vec<EmailMessage>>>,
}

impl Outbox {
    /// All captured messages, oldest first.
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// The most recent message sent to `recipient`. Panics if there is none.
    pub fn last_to(&self, recipient: &str) -> EmailMessage {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == recipient)
            .cloned()
            .unwrap_or_else(|| panic!("no mail captured for {recipient}"))
    }
}

#[async_trait]
impl NotificationDispatcher for Outbox {
    async fn connect(&self) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), DispatchError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let (user_store, admin_store) = InMemoryAccountStore::pair();
        let outbox = Outbox::default();
        let sessions = Arc::new(SessionTokenIssuer::new(
            TEST_JWT_SECRET,
            Duration::minutes(15),
            Duration::days(7),
        ));
        let policy = LifecyclePolicy::default();

        let users: Arc<dyn IdentityOps> = Arc::new(IdentityService::<UserKind, _, _>::new(
            Arc::new(user_store),
            Arc::new(outbox.clone()),
            Arc::clone(&sessions),
            policy.clone(),
            address.clone(),
        ));
        let admins: Arc<dyn IdentityOps> = Arc::new(IdentityService::<AdminKind, _, _>::new(
            Arc::new(admin_store),
            Arc::new(outbox.clone()),
            Arc::clone(&sessions),
            policy,
            address.clone(),
        ));

        let router = create_router(users, admins, Arc::clone(&sessions));

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server error");
        });

        Self {
            address,
            api_client: reqwest::Client::new(),
            outbox,
            sessions,
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(format!("{}{}", self.address, path))
    }

    /// Helper to make POST request with Bearer token
    pub fn post_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.post(path).bearer_auth(token)
    }
}

/// Pull the one-time token out of a captured mail body.
///
/// Links embed the token as the final query parameter, so it runs until
/// the closing quote of the href.
pub fn extract_token(html_body: &str) -> String {
    let start = html_body
        .find("token=")
        .expect("mail body carries no token link")
        + "token=".len();
    let rest = &html_body[start..];
    let end = rest
        .find(|c: char| c == '"' || c == '<' || c == '&')
        .unwrap_or(rest.len());
    rest[..end].to_string()
}

/// Pull the temporary password out of a staff credentials mail body.
pub fn extract_temporary_password(html_body: &str) -> String {
    let start = html_body
        .find("<code>")
        .expect("mail body carries no temporary password")
        + "<code>".len();
    let rest = &html_body[start..];
    let end = rest.find("</code>").expect("unterminated code block");
    rest[..end].to_string()
}
