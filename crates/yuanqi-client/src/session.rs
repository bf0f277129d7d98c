//! Conversation state and the two ways of sending it.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::response::SessionResponse;
use crate::stream::ResponseStream;
use crate::transport::{DEFAULT_ENDPOINT, Transport, cancellable};

/// Which revision of the agent answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    /// The published agent.
    #[default]
    Published,
    /// The draft agent (internal callers only).
    Preview,
}

impl ChatType {
    /// Wire name of the chat type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Published => "published",
            ChatType::Preview => "preview",
        }
    }
}

impl FromStr for ChatType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "published" => Ok(ChatType::Published),
            "preview" => Ok(ChatType::Preview),
            other => Err(Error::Config(format!(
                "unknown chat type '{}' (expected 'published' or 'preview')",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body of an agent chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Assistant to talk to.
    pub assistant_id: String,
    /// Caller-side user id, used for the agent's statistics.
    pub user_id: String,
    /// Assistant version (internal callers only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Whether the reply is streamed.
    pub stream: bool,
    /// Published or draft agent.
    #[serde(default)]
    pub chat_type: ChatType,
    /// Conversation, oldest first.
    pub messages: Vec<Message>,
}

/// Outcome of [`Session::send`].
#[derive(Debug)]
pub enum Reply {
    /// The full response of a non-streaming session.
    Complete(SessionResponse),
    /// Events of a streaming session.
    Stream(ResponseStream),
}

/// A conversation ready to be sent to an assistant.
///
/// Sessions are plain values: fluent setters consume and return the session,
/// and nothing is validated locally. A missing assistant id, user id or token
/// is reported by the server as an [`Error::Status`].
///
/// # Example
///
/// ```no_run
/// use yuanqi_client::{CancellationToken, Message, Session};
///
/// # async fn example() -> yuanqi_client::Result<()> {
/// let session = Session::new("assistant-id", "user-id", "token")
///     .add_message(Message::user("你好"));
///
/// let response = session.request(&CancellationToken::new()).await?;
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    assistant_id: String,
    user_id: String,
    token: String,
    version: Option<String>,
    timeout: Option<Duration>,
    stream: bool,
    chat_type: ChatType,
    messages: Vec<Message>,
    endpoint: String,
    http: reqwest::Client,
}

impl Session {
    /// Create a session with its own HTTP client.
    pub fn new(
        assistant_id: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self::with_http_client(assistant_id, user_id, token, reqwest::Client::new())
    }

    /// Create a session that sends through an existing HTTP client.
    pub fn with_http_client(
        assistant_id: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            user_id: user_id.into(),
            token: token.into(),
            version: None,
            timeout: None,
            stream: false,
            chat_type: ChatType::default(),
            messages: Vec::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            http,
        }
    }

    /// Ask for a streamed reply.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Select the published or draft agent.
    pub fn with_chat_type(mut self, chat_type: ChatType) -> Self {
        self.chat_type = chat_type;
        self
    }

    /// Pin an assistant version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Bound each request made from this session.
    ///
    /// Without a timeout (or with a zero one) a request only ends when the
    /// server answers or the cancellation token fires.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send to another endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Append one message to the conversation.
    pub fn add_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Append messages to the conversation, keeping their order.
    pub fn add_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Assistant id.
    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// User id.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Pinned assistant version.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the session asks for a streamed reply.
    pub fn is_stream(&self) -> bool {
        self.stream
    }

    /// Published or draft agent.
    pub fn chat_type(&self) -> ChatType {
        self.chat_type
    }

    /// Conversation so far.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Endpoint requests go to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The request body this session sends.
    pub fn completion_request(&self) -> CompletionRequest {
        CompletionRequest {
            assistant_id: self.assistant_id.clone(),
            user_id: self.user_id.clone(),
            version: self.version.clone(),
            stream: self.stream,
            chat_type: self.chat_type,
            messages: self.messages.clone(),
        }
    }

    /// Send the conversation and wait for the complete reply.
    ///
    /// Fails with [`Error::StreamingSession`] if the streaming flag is set.
    pub async fn request(&self, cancel: &CancellationToken) -> Result<SessionResponse> {
        if self.stream {
            return Err(Error::StreamingSession);
        }

        let body = Transport::encode(&self.completion_request())?;
        tracing::debug!(
            assistant_id = %self.assistant_id,
            messages = self.messages.len(),
            "Sending agent chat request"
        );

        let response = self.transport().post(body, cancel).await?;
        let body = cancellable(cancel, response.bytes()).await?;
        decode_response(&body)
    }

    /// Send the conversation and receive the reply as a stream of events.
    ///
    /// The request is always sent with `stream: true`. Every failure,
    /// including a non-2xx status, arrives as the final item of the stream.
    /// Must be called from within a Tokio runtime.
    pub fn stream_request(&self, cancel: &CancellationToken) -> ResponseStream {
        let mut request = self.completion_request();
        request.stream = true;

        let body = match Transport::encode(&request) {
            Ok(body) => body,
            Err(e) => return ResponseStream::failed(e),
        };
        tracing::debug!(
            assistant_id = %self.assistant_id,
            messages = self.messages.len(),
            "Sending streaming agent chat request"
        );

        ResponseStream::spawn(self.transport(), body, cancel.clone())
    }

    /// Send the conversation the way the streaming flag asks for.
    pub async fn send(&self, cancel: &CancellationToken) -> Result<Reply> {
        if self.stream {
            Ok(Reply::Stream(self.stream_request(cancel)))
        } else {
            self.request(cancel).await.map(Reply::Complete)
        }
    }

    fn transport(&self) -> Transport {
        Transport {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            token: self.token.clone(),
            timeout: self.timeout,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("assistant_id", &self.assistant_id)
            .field("user_id", &self.user_id)
            .field("token", &"[redacted]")
            .field("version", &self.version)
            .field("timeout", &self.timeout)
            .field("stream", &self.stream)
            .field("chat_type", &self.chat_type)
            .field("messages", &self.messages)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Decode a complete 2xx response body.
///
/// This is all or nothing: a body that fails to decode yields no
/// [`SessionResponse`], not even one with the fields that did parse. The raw
/// body travels inside [`Error::Decode`] instead, so a caller that wants
/// whatever the agent sent (an `id` for support, say) can read it from there
/// as a [`serde_json::Value`].
pub fn decode_response(body: &[u8]) -> Result<SessionResponse> {
    serde_json::from_slice(body).map_err(|e| Error::decode(e, body.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Content, Role};
    use serde_json::json;

    fn session() -> Session {
        Session::new("asst", "user-1", "secret")
    }

    #[test]
    fn test_request_body_shape() {
        let request = session()
            .with_chat_type(ChatType::Preview)
            .add_message(Message::user("你好"))
            .completion_request();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "assistant_id": "asst",
                "user_id": "user-1",
                "stream": false,
                "chat_type": "preview",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "你好"}]}]
            })
        );
    }

    #[test]
    fn test_token_never_in_body() {
        let body = Transport::encode(&session().with_version("3").completion_request()).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(!text.contains("secret"));
        assert!(text.contains(r#""version":"3""#));
    }

    #[test]
    fn test_request_round_trip() {
        let request = session()
            .add_message(Message::user("你好"))
            .completion_request();
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: CompletionRequest = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded, request);
        let message = &decoded.messages[0];
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content[0], Content::text("你好"));
    }

    #[test]
    fn test_messages_keep_order() {
        let session = session()
            .add_message(Message::user("1"))
            .add_messages([Message::assistant("2"), Message::user("3")]);
        let texts: Vec<String> = session.messages().iter().map(Message::text).collect();
        assert_eq!(texts, ["1", "2", "3"]);
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", session());
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn test_chat_type_parse() {
        assert_eq!("preview".parse::<ChatType>().unwrap(), ChatType::Preview);
        assert_eq!("published".parse::<ChatType>().unwrap(), ChatType::Published);
        assert!("draft".parse::<ChatType>().is_err());
    }

    #[test]
    fn test_decode_response_returns_no_partial_value() {
        let body = br#"{"id":"resp-9","created":1,"choices":"not a list"}"#;
        let err = decode_response(body).unwrap_err();
        match err {
            Error::Decode { body, .. } => {
                let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
                assert_eq!(raw["id"], "resp-9");
            }
            other => panic!("expected a decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_response_keeps_body_on_error() {
        match decode_response(b"<html>gateway</html>") {
            Err(Error::Decode { body, .. }) => assert_eq!(&body[..], b"<html>gateway</html>"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_rejects_streaming_session() {
        let err = session()
            .with_stream(true)
            .request(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StreamingSession));
    }
}
