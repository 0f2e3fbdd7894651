// 🏛️ Party Registry - Tracked parties + name normalization
//
// Problem solved:
// - "Labour", "Labour (Co-op)" → one canonical party
// - The tallied party list is data, not code
// - Anything not tracked lands in an explicit Other bucket

use serde::{Deserialize, Serialize};

// ============================================================================
// PARTY DEFINITIONS
// ============================================================================

/// A party that gets its own tally row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyDefinition {
    /// Canonical name as it appears on the roster (after merges)
    pub full_name: String,

    /// Label emitted in tally rows
    pub short_name: String,
}

impl PartyDefinition {
    pub fn new(full_name: &str, short_name: &str) -> Self {
        PartyDefinition {
            full_name: full_name.to_string(),
            short_name: short_name.to_string(),
        }
    }
}

/// Collapse every party name starting with `prefix` into `canonical`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMerge {
    pub prefix: String,
    pub canonical: String,
}

/// Where a party name falls for tallying purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyBucket<'a> {
    Tracked(&'a PartyDefinition),
    Other,
}

impl PartyBucket<'_> {
    pub fn is_tracked(&self) -> bool {
        matches!(self, PartyBucket::Tracked(_))
    }
}

pub fn default_parties() -> Vec<PartyDefinition> {
    [
        "Labour",
        "Conservative",
        "Scottish National Party",
        "Liberal Democrat",
        "Sinn Féin",
        "Plaid Cymru",
        "Democratic Unionist Party",
        "Green Party",
        "Independent",
    ]
    .iter()
    .map(|name| PartyDefinition::new(name, name))
    .collect()
}

pub fn default_merges() -> Vec<PartyMerge> {
    vec![PartyMerge {
        prefix: "Labour".to_string(),
        canonical: "Labour".to_string(),
    }]
}

// ============================================================================
// PARTY REGISTRY
// ============================================================================

#[derive(Debug, Clone)]
pub struct PartyRegistry {
    /// Tracked parties, in configuration order
    parties: Vec<PartyDefinition>,

    /// Prefix merges, first match wins
    merges: Vec<PartyMerge>,
}

impl PartyRegistry {
    /// Registry with the Commons parties tracked by default
    pub fn new() -> Self {
        PartyRegistry::from_parts(default_parties(), default_merges())
    }

    pub fn from_parts(parties: Vec<PartyDefinition>, merges: Vec<PartyMerge>) -> Self {
        PartyRegistry { parties, merges }
    }

    /// Apply the first matching merge rule; unmatched names pass through
    pub fn canonical_name(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        self.merges
            .iter()
            .find(|m| trimmed.starts_with(&m.prefix))
            .map(|m| m.canonical.clone())
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// Bucket for a canonical party name
    pub fn bucket(&self, canonical: &str) -> PartyBucket<'_> {
        self.position(canonical)
            .map(|idx| PartyBucket::Tracked(&self.parties[idx]))
            .unwrap_or(PartyBucket::Other)
    }

    /// Index of a tracked party in configuration order
    pub fn position(&self, canonical: &str) -> Option<usize> {
        self.parties.iter().position(|p| p.full_name == canonical)
    }

    pub fn tracked(&self) -> &[PartyDefinition] {
        &self.parties
    }

    pub fn tracked_count(&self) -> usize {
        self.parties.len()
    }
}

impl Default for PartyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
