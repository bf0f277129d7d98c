//! HTTP client SDK for the Tencent Yuanqi agent chat completions API.
//!
//! A [`Session`] holds one conversation: who is talking (assistant id, user
//! id, token) and the messages so far. It can be sent two ways:
//!
//! - [`Session::request`] waits for the complete [`SessionResponse`].
//! - [`Session::stream_request`] returns a [`ResponseStream`] that yields
//!   [`StreamEvent`]s as the server produces them, ending either cleanly or
//!   with exactly one error.
//!
//! Every operation takes a [`CancellationToken`]; cancelling it aborts the
//! HTTP exchange and surfaces [`Error::Cancelled`].
//!
//! # Example
//!
//! ```no_run
//! use yuanqi_client::{CancellationToken, Chat, Content, FileUrl, Message, Role};
//!
//! # async fn example() -> yuanqi_client::Result<()> {
//! let chat = Chat::new("assistant-id", "user-id", "token")?;
//! let cancel = CancellationToken::new();
//!
//! // Ask a question and wait for the answer
//! let response = chat
//!     .session()
//!     .add_message(Message::user("你好"))
//!     .request(&cancel)
//!     .await?;
//! println!("{}", response.text());
//!
//! // Stream an answer about a picture
//! let question = Message::builder(Role::User)
//!     .text("这张图片里有什么？")
//!     .file_url(FileUrl::new("https://example.com/1.jpg").with_kind("image"))
//!     .build();
//! let mut stream = chat
//!     .session()
//!     .with_stream(true)
//!     .add_message(question)
//!     .stream_request(&cancel);
//! while let Some(event) = stream.recv().await {
//!     print!("{}", event?.text());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! [`Error::kind`] sorts every failure into one of four classes: a non-2xx
//! status ([`ErrorKind::Transport`]), a request that could not be encoded,
//! a payload that could not be decoded, and network / cancellation failures
//! ([`ErrorKind::Io`]). Nothing is retried.

pub mod chat;
pub mod error;
pub mod message;
pub mod response;
pub mod session;
pub mod stream;
mod transport;

pub use chat::{Chat, ChatBuilder};
pub use error::{Error, ErrorKind, ErrorResponse, Result};
pub use message::{Content, FileUrl, Message, MessageBuilder, Role};
pub use response::{
    Choice, ChoiceMessage, Delta, FinishReason, Function, SessionResponse, Step, StreamEvent,
    ToolCall, Usage,
};
pub use session::{ChatType, CompletionRequest, Reply, Session, decode_response};
pub use stream::{EVENT_BUFFER, MAX_LINE_LEN, ResponseStream, StreamState, TryRecvError};
pub use transport::{DEFAULT_ENDPOINT, HEADER_X_SOURCE, X_SOURCE_OPENAPI};

pub use tokio_util::sync::CancellationToken;
