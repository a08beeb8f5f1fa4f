//! The typed memory store's entities: `Memory`, `Embedding`, `Link`, `Feedback`,
//! and the shared `Filter` set used by lexical/vector/ranking code alike.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `type ∈ {working, episodic, semantic, procedural}` — governs halflife and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Working,
    Episodic,
    Semantic,
    Procedural,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Working => "working",
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
            MemoryType::Procedural => "procedural",
        }
    }

    /// Halflife in days, used by the recency feature (spec §4.6).
    pub fn halflife_days(&self) -> f64 {
        match self {
            MemoryType::Working => 2.0,
            MemoryType::Episodic => 30.0,
            MemoryType::Semantic => 180.0,
            MemoryType::Procedural => 90.0,
        }
    }

    /// Importance type-boost term (spec §4.6).
    pub fn importance_boost(&self) -> f64 {
        match self {
            MemoryType::Working => -0.05,
            MemoryType::Episodic => 0.0,
            MemoryType::Semantic => 0.1,
            MemoryType::Procedural => 0.05,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "working" => Ok(MemoryType::Working),
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            "procedural" => Ok(MemoryType::Procedural),
            other => Err(crate::error::Error::InvalidArgument(format!(
                "unknown memory type '{other}'"
            ))),
        }
    }
}

/// `privacy_scope ∈ {private, team, public}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyScope {
    Private,
    Team,
    Public,
}

impl PrivacyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyScope::Private => "private",
            PrivacyScope::Team => "team",
            PrivacyScope::Public => "public",
        }
    }
}

impl Default for PrivacyScope {
    fn default() -> Self {
        PrivacyScope::Private
    }
}

impl FromStr for PrivacyScope {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(PrivacyScope::Private),
            "team" => Ok(PrivacyScope::Team),
            "public" => Ok(PrivacyScope::Public),
            other => Err(crate::error::Error::InvalidArgument(format!(
                "unknown privacy scope '{other}'"
            ))),
        }
    }
}

/// The canonical entity (spec §3). Every invariant in `crate::model::invariants`
/// is checked against this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Memory {
    pub id: String,
    pub memory_type: MemoryType,
    pub content: String,
    pub importance: f64,
    pub privacy_scope: PrivacyScope,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_accessed: Option<chrono::DateTime<chrono::Utc>>,
    pub pinned: bool,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub view_count: i64,
    pub cite_count: i64,
    pub edit_count: i64,
    pub project: Option<String>,
    pub user: Option<String>,
    pub agent: Option<String>,
}

impl Memory {
    /// First line of content, truncated to 120 chars — spec §9's stand-in for
    /// a `title` column that does not exist in the persisted schema.
    pub fn title(&self) -> String {
        let first_line = self.content.lines().next().unwrap_or("");
        first_line.chars().take(120).collect()
    }

    pub fn age_days(&self, now: chrono::DateTime<chrono::Utc>) -> f64 {
        (now - self.created_at).num_milliseconds() as f64 / 86_400_000.0
    }
}

/// Input to the `store` operation (spec §6). Uses `deny_unknown_fields` to
/// catch typo'd tool arguments early, matching the teacher's `IngestInput`
/// convention.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreInput {
    pub content: String,
    #[serde(default)]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub importance: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub privacy_scope: Option<String>,
}

impl Default for StoreInput {
    fn default() -> Self {
        StoreInput {
            content: String::new(),
            memory_type: None,
            tags: Vec::new(),
            importance: None,
            source: None,
            privacy_scope: None,
        }
    }
}

/// `Embedding` (spec §3): at most one per memory, dimension fixed at creation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Embedding {
    pub memory_id: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Embedding {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// `relation ∈ {derived_from, duplicates, references}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRelation {
    DerivedFrom,
    Duplicates,
    References,
}

impl LinkRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRelation::DerivedFrom => "derived_from",
            LinkRelation::Duplicates => "duplicates",
            LinkRelation::References => "references",
        }
    }
}

impl FromStr for LinkRelation {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "derived_from" => Ok(LinkRelation::DerivedFrom),
            "duplicates" => Ok(LinkRelation::Duplicates),
            "references" => Ok(LinkRelation::References),
            other => Err(crate::error::Error::InvalidArgument(format!(
                "unknown link relation '{other}'"
            ))),
        }
    }
}

/// A directed edge between two memories (spec §3).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Link {
    pub source_id: String,
    pub target_id: String,
    pub relation: LinkRelation,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// `event_type ∈ {helpful, unhelpful, used, cited}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackEvent {
    Helpful,
    Unhelpful,
    Used,
    Cited,
}

impl FeedbackEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackEvent::Helpful => "helpful",
            FeedbackEvent::Unhelpful => "unhelpful",
            FeedbackEvent::Used => "used",
            FeedbackEvent::Cited => "cited",
        }
    }
}

impl FromStr for FeedbackEvent {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "helpful" => Ok(FeedbackEvent::Helpful),
            "unhelpful" => Ok(FeedbackEvent::Unhelpful),
            "used" => Ok(FeedbackEvent::Used),
            "cited" => Ok(FeedbackEvent::Cited),
            other => Err(crate::error::Error::InvalidArgument(format!(
                "unknown feedback event '{other}'"
            ))),
        }
    }
}

/// Append-only feedback record (spec §3). Feeds usage and spaced-repetition inputs.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Feedback {
    pub memory_id: String,
    pub event_type: FeedbackEvent,
    pub score: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The shared filter set (spec §6): type, tags, privacy, time window, pinned, id list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Filter {
    pub memory_type: Vec<String>,
    pub tags: Vec<String>,
    pub privacy_scope: Vec<String>,
    pub time_from: Option<chrono::DateTime<chrono::Utc>>,
    pub time_to: Option<chrono::DateTime<chrono::Utc>>,
    pub pinned: Option<bool>,
    pub id: Vec<String>,
    pub importance_min: Option<f64>,
}

/// Ordering requested from `scan_candidates` (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    CreatedAtDesc,
    CreatedAtAsc,
}

impl Filter {
    /// Whether `memory` satisfies every predicate in the filter set (spec
    /// §6). Used both as the SQL-level predicate's in-memory fallback (the
    /// FTS5 branch of `lexical_search` can't express tag/time/importance
    /// predicates in the `MATCH` query) and, in the hybrid layer, to check
    /// vector-only candidates that never passed through a filtered scan.
    pub fn matches(&self, memory: &Memory) -> bool {
        if !self.memory_type.is_empty()
            && !self
                .memory_type
                .contains(&memory.memory_type.as_str().to_string())
        {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| memory.tags.contains(t)) {
            return false;
        }
        if !self.privacy_scope.is_empty()
            && !self
                .privacy_scope
                .contains(&memory.privacy_scope.as_str().to_string())
        {
            return false;
        }
        if let Some(from) = self.time_from {
            if memory.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.time_to {
            if memory.created_at > to {
                return false;
            }
        }
        if let Some(pinned) = self.pinned {
            if memory.pinned != pinned {
                return false;
            }
        }
        if !self.id.is_empty() && !self.id.contains(&memory.id) {
            return false;
        }
        if let Some(min) = self.importance_min {
            if memory.importance < min {
                return false;
            }
        }
        true
    }
}
