use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker that distinguishes a failed answer from a normal one.
pub const ERROR_PREFIX: &str = "Error: ";

/// A document processed by the remote service.
///
/// Field names are the wire contract and must round-trip exactly.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub page_count: u32,
    pub chunk_count: u32,
    #[serde(with = "upload_time")]
    pub upload_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message in a document conversation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConversationTurn {
    pub id: u64,
    pub role: TurnRole,
    pub text: String,
    pub sources: Vec<String>,
}

impl ConversationTurn {
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            role: TurnRole::User,
            text: text.into(),
            sources: Vec::new(),
        }
    }

    pub fn assistant(id: u64, text: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            id,
            role: TurnRole::Assistant,
            text: text.into(),
            sources,
        }
    }

    pub fn error(id: u64, message: &str) -> Self {
        Self::assistant(id, format!("{ERROR_PREFIX}{message}"), Vec::new())
    }

    pub fn is_error(&self) -> bool {
        self.role == TurnRole::Assistant && self.text.starts_with(ERROR_PREFIX)
    }
}

/// The service emits naive timestamps (no offset); those are read as UTC.
mod upload_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid upload_time: {raw}")))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }
}
