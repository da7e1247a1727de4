//! Memory record model
//!
//! [`MemoryDraft`] is the untyped shape accepted at the boundary (CLI, JSON).
//! Validation turns it into a [`MemoryRecord`] whose required metadata is
//! pulled out into typed fields; everything else rides along in `extra`.

use chrono::{DateTime, Utc};
use sdk::errors::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a record. Each kind owns exactly one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Trip,
    Destination,
    UserPreference,
    Research,
    Cultural,
    Budget,
    AgentInsight,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 7] = [
        MemoryKind::Trip,
        MemoryKind::Destination,
        MemoryKind::UserPreference,
        MemoryKind::Research,
        MemoryKind::Cultural,
        MemoryKind::Budget,
        MemoryKind::AgentInsight,
    ];

    /// Partition used for labels that do not name a kind.
    pub const FALLBACK: MemoryKind = MemoryKind::AgentInsight;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trip => "trip",
            Self::Destination => "destination",
            Self::UserPreference => "user_preference",
            Self::Research => "research",
            Self::Cultural => "cultural",
            Self::Budget => "budget",
            Self::AgentInsight => "agent_insight",
        }
    }

    /// Parses a kind label. `itinerary` is accepted as an alias for `trip`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "trip" | "itinerary" => Some(Self::Trip),
            "destination" => Some(Self::Destination),
            "user_preference" => Some(Self::UserPreference),
            "research" => Some(Self::Research),
            "cultural" => Some(Self::Cultural),
            "budget" => Some(Self::Budget),
            "agent_insight" => Some(Self::AgentInsight),
            _ => None,
        }
    }

    /// Total routing: unknown labels land in the fallback partition.
    pub fn route(label: &str) -> Self {
        Self::from_label(label).unwrap_or(Self::FALLBACK)
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    pub fn partition_suffix(&self) -> &'static str {
        match self {
            Self::Trip => "trips",
            Self::Destination => "destinations",
            Self::UserPreference => "user_preferences",
            Self::Research => "research",
            Self::Cultural => "cultural",
            Self::Budget => "budget",
            Self::AgentInsight => "agent_insights",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Trip => "Planned trips and itineraries",
            Self::Destination => "Destination research and highlights",
            Self::UserPreference => "Traveler preferences and history",
            Self::Research => "Verified facts and logistics research",
            Self::Cultural => "Cultural insights and etiquette",
            Self::Budget => "Budget analyses and price data",
            Self::AgentInsight => "Worker observations and uncategorised notes",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record metadata with the keys the engine branches on pulled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Which worker (or caller) produced the record
    pub source: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Finer-grained tag than the kind, e.g. `budget_analysis`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn new(source: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            created_at,
            destination: None,
            user_id: None,
            memory_type: None,
            chunk_index: None,
            chunk_count: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_memory_type(mut self, memory_type: impl Into<String>) -> Self {
        self.memory_type = Some(memory_type.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A validated unit of knowledge. Create-once; corrections are new records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub kind: MemoryKind,
    pub content: String,
    pub metadata: Metadata,
}

impl MemoryRecord {
    pub fn new(
        id: impl Into<String>,
        kind: MemoryKind,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            metadata,
        }
    }

    /// Generates an id of the form `<kind>_<uuid>`.
    pub fn generate_id(kind: MemoryKind) -> String {
        format!("{}_{}", kind, uuid::Uuid::new_v4().simple())
    }

    /// Checks the fields a typed record can still leave blank.
    pub fn check(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.id.trim().is_empty() {
            missing.push("id");
        }
        if self.content.trim().is_empty() {
            missing.push("content");
        }
        if self.metadata.source.trim().is_empty() {
            missing.push("metadata.source");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::missing(missing))
        }
    }
}

/// The atomic stored unit. Owned by exactly one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub kind: MemoryKind,
    pub content: String,
    pub metadata: Metadata,
}

impl From<MemoryRecord> for Fragment {
    fn from(record: MemoryRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            content: record.content,
            metadata: record.metadata,
        }
    }
}

/// Untyped record as received from callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl MemoryDraft {
    /// Validates every required field and reports all that are missing at once.
    pub fn validate(self) -> Result<MemoryRecord, ValidationError> {
        let mut missing: Vec<&str> = Vec::new();

        let id = non_empty(self.id);
        let kind = non_empty(self.kind);
        let content = non_empty(self.content);
        if id.is_none() {
            missing.push("id");
        }
        if kind.is_none() {
            missing.push("kind");
        }
        if content.is_none() {
            missing.push("content");
        }

        let mut metadata = match self.metadata {
            Some(map) => map,
            None => {
                missing.push("metadata");
                Map::new()
            }
        };

        let has_metadata = !missing.contains(&"metadata");
        let source = take_string(&mut metadata, "source");
        let created_at = take_string(&mut metadata, "created_at");
        if has_metadata {
            if source.is_none() {
                missing.push("metadata.source");
            }
            if created_at.is_none() {
                missing.push("metadata.created_at");
            }
        }

        if !missing.is_empty() {
            return Err(ValidationError::missing(missing));
        }

        // All present after the check above.
        let (Some(id), Some(label), Some(content), Some(source), Some(created_at)) =
            (id, kind, content, source, created_at)
        else {
            return Err(ValidationError::missing(vec!["id"]));
        };

        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| {
                ValidationError::invalid("metadata.created_at", "invalid RFC 3339 timestamp")
            })?;

        let kind = MemoryKind::route(&label);
        let mut memory_type = take_string(&mut metadata, "memory_type");
        if MemoryKind::from_label(&label).is_none() && memory_type.is_none() {
            memory_type = Some(label.trim().to_string());
        }

        // Chunk tags are assigned by the chunker only.
        metadata.remove("chunk_index");
        metadata.remove("chunk_count");

        Ok(MemoryRecord {
            id,
            kind,
            content,
            metadata: Metadata {
                source,
                created_at,
                destination: take_string(&mut metadata, "destination"),
                user_id: take_string(&mut metadata, "user_id"),
                memory_type,
                chunk_index: None,
                chunk_count: None,
                extra: metadata.into_iter().collect(),
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Null) | None => None,
        Some(Value::String(_)) => None,
        Some(other) => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: Value) -> MemoryDraft {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let err = draft(json!({ "id": "x" })).validate().unwrap_err();
        assert_eq!(err.fields, vec!["kind", "content", "metadata"]);
    }

    #[test]
    fn missing_metadata_keys_are_reported() {
        let err = draft(json!({
            "id": "x",
            "type": "trip",
            "content": "hello",
            "metadata": { "destination": "Tokyo" }
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.fields, vec!["metadata.source", "metadata.created_at"]);
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let err = draft(json!({
            "id": "",
            "type": "trip",
            "content": "  ",
            "metadata": { "source": "cli", "created_at": "2026-01-01T00:00:00Z" }
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.fields, vec!["id", "content"]);
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let err = draft(json!({
            "id": "x",
            "type": "trip",
            "content": "hello",
            "metadata": { "source": "cli", "created_at": "yesterday" }
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.fields, vec!["metadata.created_at"]);
    }

    #[test]
    fn unknown_kind_routes_to_fallback_and_keeps_label() {
        let record = draft(json!({
            "id": "x",
            "type": "weather",
            "content": "Rainy season in June.",
            "metadata": {
                "source": "cli",
                "created_at": "2026-01-01T00:00:00Z",
                "destination": "Tokyo",
                "confidence": 0.9
            }
        }))
        .validate()
        .unwrap();

        assert_eq!(record.kind, MemoryKind::AgentInsight);
        assert_eq!(record.metadata.memory_type.as_deref(), Some("weather"));
        assert_eq!(record.metadata.destination.as_deref(), Some("Tokyo"));
        assert_eq!(record.metadata.extra.get("confidence"), Some(&json!(0.9)));
    }

    #[test]
    fn itinerary_is_a_trip() {
        assert_eq!(MemoryKind::from_label("Itinerary"), Some(MemoryKind::Trip));
        assert_eq!(MemoryKind::route("nonsense"), MemoryKind::AgentInsight);
        for kind in MemoryKind::ALL {
            assert_eq!(MemoryKind::from_label(kind.as_str()), Some(kind));
        }
    }
}
