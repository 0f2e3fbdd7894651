// 🗳️ Division Entity - one roll-call vote, schema-independent
//
// Both provider schemas normalize into DivisionResult. Everything
// downstream (reconciliation, tallies, annotations) only ever sees this.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::ids::{DivisionId, MemberId};

// ============================================================================
// SOURCE SCHEMA
// ============================================================================

/// Which provider schema a division payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSchema {
    /// Linked-data API, members referenced by URI
    Legacy,

    /// Votes services API, members referenced by numeric id
    Current,
}

impl SourceSchema {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceSchema::Legacy => "Linked-data (legacy)",
            SourceSchema::Current => "Commons votes services",
        }
    }

    /// Short code for internal use
    pub fn code(&self) -> &str {
        match self {
            SourceSchema::Legacy => "legacy",
            SourceSchema::Current => "current",
        }
    }
}

impl Default for SourceSchema {
    fn default() -> Self {
        SourceSchema::Current
    }
}

impl std::str::FromStr for SourceSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" | "lda" => Ok(SourceSchema::Legacy),
            "current" | "new" => Ok(SourceSchema::Current),
            other => Err(format!("unknown schema '{}'", other)),
        }
    }
}

// ============================================================================
// VOTE SETS
// ============================================================================

/// The four membership sets a member id can appear in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteSet {
    AyeVoters,
    NoVoters,
    AyeTellers,
    NoTellers,
}

impl VoteSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteSet::AyeVoters => "ayeVoters",
            VoteSet::NoVoters => "noVoters",
            VoteSet::AyeTellers => "ayeTellers",
            VoteSet::NoTellers => "noTellers",
        }
    }
}

// ============================================================================
// PROVIDER FIGURES
// ============================================================================

/// Figures only the linked-data schema publishes; passed through untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFigures {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<i64>,

    /// The provider's own abstain figure, not the computed abstainCount
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_abstain_count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_not_vote_count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_eligible_count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended_or_expelled_count: Option<u32>,
}

// ============================================================================
// DIVISION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DivisionResult {
    pub id: DivisionId,
    pub number: u32,
    pub title: String,

    /// YYYY-MM-DD when the source date was parseable, verbatim otherwise
    pub date: String,

    pub schema: SourceSchema,

    pub aye_voters: BTreeSet<MemberId>,
    pub no_voters: BTreeSet<MemberId>,

    /// Source order preserved, normally two entries
    pub aye_tellers: Vec<MemberId>,
    pub no_tellers: Vec<MemberId>,

    /// Raw counts as reported by the source (tellers excluded)
    pub aye_count: u32,
    pub no_count: u32,

    /// Party label the source attached to a voter, when it has one
    pub source_parties: HashMap<MemberId, String>,

    /// Empty for current-schema divisions
    pub provider: ProviderFigures,
}

impl DivisionResult {
    /// Empty division, filled in by parsers and fixtures
    pub fn new(id: DivisionId, number: u32, title: &str, schema: SourceSchema) -> Self {
        DivisionResult {
            id,
            number,
            title: title.to_string(),
            date: String::new(),
            schema,
            aye_voters: BTreeSet::new(),
            no_voters: BTreeSet::new(),
            aye_tellers: Vec::new(),
            no_tellers: Vec::new(),
            aye_count: 0,
            no_count: 0,
            source_parties: HashMap::new(),
            provider: ProviderFigures::default(),
        }
    }

    /// Every set this member id appears in, in precedence order
    pub fn memberships(&self, id: MemberId) -> Vec<VoteSet> {
        let mut sets = Vec::new();
        if self.aye_voters.contains(&id) {
            sets.push(VoteSet::AyeVoters);
        }
        if self.no_voters.contains(&id) {
            sets.push(VoteSet::NoVoters);
        }
        if self.aye_tellers.contains(&id) {
            sets.push(VoteSet::AyeTellers);
        }
        if self.no_tellers.contains(&id) {
            sets.push(VoteSet::NoTellers);
        }
        sets
    }

    /// Ids appearing in more than one set, each paired with its sets
    pub fn contradictions(&self) -> Vec<(MemberId, Vec<VoteSet>)> {
        let mut seen = BTreeSet::new();
        self.aye_voters
            .iter()
            .chain(self.no_voters.iter())
            .chain(self.aye_tellers.iter())
            .chain(self.no_tellers.iter())
            .filter(|id| seen.insert(**id))
            .filter_map(|id| {
                let sets = self.memberships(*id);
                (sets.len() > 1).then_some((*id, sets))
            })
            .collect()
    }
}
