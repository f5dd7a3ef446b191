//! The data entity descriptor

use crate::state::{Attributes, ModificationState};
use std::fmt;

/// Declared kind of an entity; selects the adapter that handles it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Filesystem,
    Mailbox,
    Hyperlink,
    Feed,
    FlatList,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Mailbox => "mailbox",
            Self::Hyperlink => "hyperlink",
            Self::Feed => "feed",
            Self::FlatList => "flat-list",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "filesystem" => Some(Self::Filesystem),
            "mailbox" => Some(Self::Mailbox),
            "hyperlink" => Some(Self::Hyperlink),
            "feed" => Some(Self::Feed),
            "flat-list" => Some(Self::FlatList),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One crawlable unit of data
///
/// Descriptors are created by adapters during discovery, enriched with a
/// modification state by the change tracker and consumed once by the engine.
/// `parent_id` is a back-reference only; depth strictly increases along it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntity {
    /// Stable external identifier (path, URL, mailbox reference)
    pub source_id: String,
    pub parent_id: Option<String>,
    pub depth: u32,
    pub kind: SourceKind,
    /// Adapter-supplied content identity marker; empty when unknown
    pub content_fingerprint: String,
    pub modification_state: ModificationState,
    pub attributes: Attributes,
    /// Set only on `ModificationState::Error` records
    pub error_message: Option<String>,
    /// Set only on `ModificationState::Error` records
    pub error_stacktrace: Option<String>,
}

impl DataEntity {
    /// Creates a depth-0 entity for the start of a crawl
    pub fn root(kind: SourceKind, source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            parent_id: None,
            depth: 0,
            kind,
            content_fingerprint: String::new(),
            modification_state: ModificationState::New,
            attributes: Attributes::new(),
            error_message: None,
            error_stacktrace: None,
        }
    }

    /// Creates a child descriptor one level below `parent`
    pub fn child_of(parent: &DataEntity, kind: SourceKind, source_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent.source_id.clone()),
            depth: parent.depth + 1,
            ..Self::root(kind, source_id)
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.content_fingerprint = fingerprint.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// Builds the `Error` record delivered to the sink for a failed entity
    pub fn error_record(&self, message: String, stacktrace: String) -> Self {
        Self {
            source_id: self.source_id.clone(),
            parent_id: self.parent_id.clone(),
            depth: self.depth,
            kind: self.kind,
            content_fingerprint: self.content_fingerprint.clone(),
            modification_state: ModificationState::Error,
            attributes: self.attributes.clone(),
            error_message: Some(message),
            error_stacktrace: Some(stacktrace),
        }
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }
}
