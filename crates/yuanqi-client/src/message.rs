//! Conversation messages sent to the agent.
//!
//! A [`Message`] is one turn of the conversation: a [`Role`] plus an ordered
//! list of [`Content`] blocks. Turns must alternate between user and
//! assistant; the server enforces that, not this crate.

use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user.
    User,
    /// The agent.
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// A file (image, video, document...) referenced by URL.
    FileUrl {
        /// The referenced file.
        file_url: FileUrl,
    },
}

impl Content {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a file reference block.
    pub fn file_url(file_url: FileUrl) -> Self {
        Self::FileUrl { file_url }
    }

    /// Create an image reference block.
    pub fn image(url: impl Into<String>) -> Self {
        Self::file_url(FileUrl::new(url).with_kind("image"))
    }

    /// The text of a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            Content::FileUrl { .. } => None,
        }
    }
}

/// A file referenced by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUrl {
    /// File kind, e.g. `image`, `video`, `audio`, `pdf`, `doc`, `txt`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Where the file can be fetched.
    pub url: String,
}

impl FileUrl {
    /// Reference a file with no declared kind.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            kind: String::new(),
            url: url.into(),
        }
    }

    /// Declare the file kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,
    /// Content blocks, in order.
    pub content: Vec<Content>,
}

impl Message {
    /// Create a message from a role and its content blocks.
    pub fn new(role: Role, content: impl IntoIterator<Item = Content>) -> Self {
        Self {
            role,
            content: content.into_iter().collect(),
        }
    }

    /// A user message holding a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, [Content::text(text)])
    }

    /// An assistant message holding a single text block.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, [Content::text(text)])
    }

    /// Start building a message step by step.
    pub fn builder(role: Role) -> MessageBuilder {
        MessageBuilder::new(role)
    }

    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(Content::as_text).collect()
    }
}

/// Step-wise construction of a [`Message`] with several content blocks.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    role: Role,
    content: Vec<Content>,
}

impl MessageBuilder {
    /// Start a message for the given role.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            content: Vec::new(),
        }
    }

    /// Append a text block.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content.push(Content::text(text));
        self
    }

    /// Append a file reference block.
    pub fn file_url(mut self, file_url: FileUrl) -> Self {
        self.content.push(Content::file_url(file_url));
        self
    }

    /// Append arbitrary content blocks.
    pub fn content(mut self, content: impl IntoIterator<Item = Content>) -> Self {
        self.content.extend(content);
        self
    }

    /// Finish the message.
    pub fn build(self) -> Message {
        Message {
            role: self.role,
            content: self.content,
        }
    }
}
