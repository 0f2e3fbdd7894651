// 🔑 Canonical identifiers
//
// The legacy linked-data schema references members by URI
// ("http://data.parliament.uk/members/172"), the current schema by plain
// number. Both collapse into these newtypes at ingestion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical member identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

/// Canonical division identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DivisionId(pub u64);

/// Last non-empty path segment of a URI, ignoring any query or fragment
pub fn uri_tail(uri: &str) -> Option<&str> {
    let path = uri.split(['?', '#']).next().unwrap_or("");
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

impl MemberId {
    /// Parse a bare numeric id ("172", " 172 ")
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u64>().ok().map(MemberId)
    }

    /// Extract the id from a member URI
    pub fn from_uri(uri: &str) -> Option<Self> {
        uri_tail(uri).and_then(Self::parse)
    }
}

impl DivisionId {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u64>().ok().map(DivisionId)
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        uri_tail(uri).and_then(Self::parse)
    }

    /// Accept either a JSON number or a numeric string
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_u64().map(DivisionId),
            serde_json::Value::String(s) => Self::parse(s),
            _ => None,
        }
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DivisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
