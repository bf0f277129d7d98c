//! Reusable assistant identity that hands out sessions.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::DEFAULT_ENDPOINT;

/// An assistant, a user and a token, plus the HTTP client sessions share.
///
/// # Example
///
/// ```no_run
/// use yuanqi_client::{CancellationToken, Chat, Message};
///
/// # async fn example() -> yuanqi_client::Result<()> {
/// let chat = Chat::new("assistant-id", "user-id", "token")?;
///
/// let mut stream = chat
///     .session()
///     .with_stream(true)
///     .add_message(Message::user("讲个故事"))
///     .stream_request(&CancellationToken::new());
///
/// while let Some(event) = stream.recv().await {
///     print!("{}", event?.text());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Chat {
    inner: Arc<ChatInner>,
}

struct ChatInner {
    http: reqwest::Client,
    assistant_id: String,
    user_id: String,
    token: String,
    version: Option<String>,
    timeout: Option<Duration>,
    endpoint: String,
}

impl Chat {
    /// Create a chat with default settings.
    pub fn new(
        assistant_id: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        Self::builder()
            .assistant_id(assistant_id)
            .user_id(user_id)
            .token(token)
            .build()
    }

    /// Create a new chat builder.
    pub fn builder() -> ChatBuilder {
        ChatBuilder::new()
    }

    /// Start an empty session for this assistant.
    pub fn session(&self) -> Session {
        let inner = &self.inner;
        let mut session = Session::with_http_client(
            inner.assistant_id.clone(),
            inner.user_id.clone(),
            inner.token.clone(),
            inner.http.clone(),
        )
        .with_endpoint(inner.endpoint.clone());

        if let Some(version) = &inner.version {
            session = session.with_version(version.clone());
        }
        if let Some(timeout) = inner.timeout {
            session = session.with_timeout(timeout);
        }
        session
    }

    /// Assistant id.
    pub fn assistant_id(&self) -> &str {
        &self.inner.assistant_id
    }

    /// User id.
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Endpoint sessions send to.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("assistant_id", &self.inner.assistant_id)
            .field("user_id", &self.inner.user_id)
            .field("version", &self.inner.version)
            .field("timeout", &self.inner.timeout)
            .field("endpoint", &self.inner.endpoint)
            .finish_non_exhaustive()
    }
}

/// Builder for creating a [`Chat`].
#[derive(Debug, Default)]
pub struct ChatBuilder {
    assistant_id: String,
    user_id: String,
    token: String,
    version: Option<String>,
    timeout: Option<Duration>,
    endpoint: Option<String>,
    user_agent: Option<String>,
    http: Option<reqwest::Client>,
}

impl ChatBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the assistant id.
    pub fn assistant_id(mut self, id: impl Into<String>) -> Self {
        self.assistant_id = id.into();
        self
    }

    /// Set the user id.
    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = id.into();
        self
    }

    /// Set the API token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Pin an assistant version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the per-request timeout of every session.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use an existing HTTP client instead of building one.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the chat.
    ///
    /// Only the endpoint is checked here; identity and token are validated by
    /// the server.
    pub fn build(self) -> Result<Chat> {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Url::parse(&endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        let http = match self.http {
            Some(http) => http,
            None => {
                let user_agent = self
                    .user_agent
                    .unwrap_or_else(|| format!("yuanqi-client/{}", env!("CARGO_PKG_VERSION")));
                reqwest::Client::builder().user_agent(user_agent).build()?
            }
        };

        Ok(Chat {
            inner: Arc::new(ChatInner {
                http,
                assistant_id: self.assistant_id,
                user_id: self.user_id,
                token: self.token,
                version: self.version,
                timeout: self.timeout,
                endpoint,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_inherits_identity() {
        let chat = Chat::builder()
            .assistant_id("asst")
            .user_id("user-1")
            .token("secret")
            .version("2")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        let session = chat.session();
        assert_eq!(session.assistant_id(), "asst");
        assert_eq!(session.user_id(), "user-1");
        assert_eq!(session.version(), Some("2"));
        assert_eq!(session.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(session.endpoint(), DEFAULT_ENDPOINT);
        assert!(!session.is_stream());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_sessions_are_independent() {
        let chat = Chat::new("asst", "user-1", "secret").unwrap();
        let first = chat.session().add_message(crate::Message::user("a"));
        let second = chat.session();
        assert_eq!(first.messages().len(), 1);
        assert!(second.messages().is_empty());
    }

    #[test]
    fn test_missing_identity_is_not_rejected_locally() {
        assert!(Chat::new("", "", "").is_ok());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = Chat::builder().endpoint("::not a url::").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_hides_token() {
        let chat = Chat::new("asst", "user-1", "secret").unwrap();
        assert!(!format!("{:?}", chat).contains("secret"));
    }
}
