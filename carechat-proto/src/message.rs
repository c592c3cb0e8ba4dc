//! Message types for the consultation chat.
//!
//! These types describe both the JSON wire shape of the consultation API
//! (`id`, `content`, `authorId`, `authorRole`, `createdAt`) and the
//! client-side delivery state that never crosses the wire
//! ([`MessageStatus`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed message content length in characters.
pub const MAX_CONTENT_LEN: usize = 2000;

/// Prefix that marks a locally-generated, pre-confirmation message id.
const LOCAL_ID_PREFIX: &str = "local-";

/// Unique identifier for a message.
///
/// Either a server-assigned id, or a temporary `local-<millis>-<random>`
/// id minted by [`MessageId::local`] for an optimistic send that has not
/// been confirmed yet. The two kinds are distinguished structurally via
/// [`is_local`](MessageId::is_local) — reconciliation never guesses by
/// content equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a fresh temporary id for a locally-originated message.
    #[must_use]
    pub fn local(now: Timestamp) -> Self {
        Self(format!(
            "{LOCAL_ID_PREFIX}{}-{}",
            now.as_millis(),
            Uuid::new_v4().simple()
        ))
    }

    /// Wraps a server-assigned identifier.
    #[must_use]
    pub fn server(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns `true` if this is a temporary pre-confirmation id.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    /// Returns the string representation of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a consultation conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Creates a conversation identifier from its server-side id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a message author (patient, doctor, staff member).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(String);

impl AuthorId {
    /// Creates an author identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AuthorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a message author within the consultation platform.
///
/// The wire values are the platform's own (French) role names. Roles this
/// client does not know about deserialize to [`AuthorRole::Other`] rather
/// than failing the whole fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorRole {
    /// The patient side of the consultation.
    Patient,
    /// The doctor side of the consultation.
    Medecin,
    /// Platform administrator.
    Administrator,
    /// Practice profile account.
    Profil,
    /// Service account (automated messages).
    Service,
    /// Any role this client version does not recognize.
    #[serde(other)]
    Other,
}

impl AuthorRole {
    /// Returns the wire name of this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Medecin => "medecin",
            Self::Administrator => "administrator",
            Self::Profil => "profil",
            Self::Service => "service",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AuthorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Millisecond-precision UTC timestamp.
///
/// Stored as milliseconds since the UNIX epoch; serialized as an RFC 3339
/// instant because that is what the consultation API emits for `createdAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Creates a timestamp from milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns this timestamp shifted forward by `millis`, saturating.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Formats this timestamp as an RFC 3339 instant with millisecond
    /// precision, e.g. `2026-08-06T09:30:00.000Z`.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        let millis = i64::try_from(self.0).unwrap_or(i64::MAX);
        chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    /// Parses an RFC 3339 instant. Instants before the UNIX epoch clamp
    /// to zero.
    ///
    /// # Errors
    ///
    /// Returns a [`chrono::ParseError`] if `value` is not valid RFC 3339.
    pub fn parse_rfc3339(value: &str) -> Result<Self, chrono::ParseError> {
        let parsed = chrono::DateTime::parse_from_rfc3339(value)?;
        Ok(Self(u64::try_from(parsed.timestamp_millis()).unwrap_or(0)))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}

/// Delivery lifecycle of a message, tracked client-side only.
///
/// `Pending` exists only for locally-originated messages awaiting server
/// confirmation. Everything the server returns is `Confirmed`, which is why
/// the field is skipped on serialization and defaults to `Confirmed` when
/// deserializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Optimistically inserted, awaiting server confirmation.
    Pending,
    /// Known to the server. Terminal for all server-originated messages.
    #[default]
    Confirmed,
    /// Send failed. Terminal and removable.
    Failed,
}

/// A single consultation chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier (server-assigned, or temporary pre-confirmation).
    pub id: MessageId,
    /// The message text, 1..=[`MAX_CONTENT_LEN`] characters after trimming.
    pub content: String,
    /// Who wrote the message.
    pub author_id: AuthorId,
    /// The author's role on the platform.
    pub author_role: AuthorRole,
    /// When the message was created.
    pub created_at: Timestamp,
    /// Client-side delivery state; never crosses the wire.
    #[serde(skip)]
    pub status: MessageStatus,
}

impl Message {
    /// Builds an optimistic `Pending` message with a fresh temporary id.
    #[must_use]
    pub fn pending(
        content: String,
        author_id: AuthorId,
        author_role: AuthorRole,
        now: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::local(now),
            content,
            author_id,
            author_role,
            created_at: now,
            status: MessageStatus::Pending,
        }
    }
}

/// Error returned when message content fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Content is empty after trimming.
    #[error("message content is empty")]
    Empty,
    /// Content exceeds the maximum allowed length.
    #[error("message too long ({len} characters, max {max})")]
    TooLong {
        /// Actual length of the trimmed content in characters.
        len: usize,
        /// Maximum allowed length in characters.
        max: usize,
    },
}

/// Validates raw input text for sending.
///
/// Trims surrounding whitespace and checks the 1..=[`MAX_CONTENT_LEN`]
/// character bound. Returns the trimmed content on success.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] if nothing remains after trimming, or
/// [`ValidationError::TooLong`] if the trimmed content exceeds
/// [`MAX_CONTENT_LEN`] characters.
pub fn validate_content(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_CONTENT_LEN {
        return Err(ValidationError::TooLong {
            len,
            max: MAX_CONTENT_LEN,
        });
    }
    Ok(trimmed.to_string())
}
