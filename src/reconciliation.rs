// ⚖️ Reconciliation Engine - one vote record per (member, division)
//
// Classification precedence, first match wins:
//   1. ayeVoters  → Aye, not teller
//   2. noVoters   → No, not teller
//   3. ayeTellers → Aye, teller
//   4. noTellers  → No, teller
//   5. otherwise  → DidNotVote
//
// The precedence is total: contradictory input (an id in several sets)
// still yields exactly one outcome. Contradictions are logged and reported
// so upstream data problems stay visible.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::annotations::AnnotationFields;
use crate::entities::{DivisionId, DivisionResult, Member, MemberId, VoteSet};

// ============================================================================
// VOTE OUTCOME
// ============================================================================

/// Serialized with the provider's own vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteOutcome {
    #[serde(rename = "AyeVote")]
    Aye,

    #[serde(rename = "NoVote")]
    No,

    #[serde(rename = "A")]
    DidNotVote,
}

impl VoteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteOutcome::Aye => "AyeVote",
            VoteOutcome::No => "NoVote",
            VoteOutcome::DidNotVote => "A",
        }
    }
}

// ============================================================================
// VOTE RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    #[serde(skip)]
    pub member_id: MemberId,

    pub vote_title: String,
    pub division_number: u32,
    pub division_id: DivisionId,

    #[serde(rename = "vote")]
    pub outcome: VoteOutcome,

    #[serde(rename = "teller")]
    pub is_teller: bool,

    /// Set by the annotation joiner, absent otherwise
    #[serde(flatten)]
    pub annotation: Option<AnnotationFields>,
}

/// An id found in more than one set of the same division
#[derive(Debug, Clone, PartialEq)]
pub struct Contradiction {
    pub division_id: DivisionId,
    pub member_id: MemberId,
    pub sets: Vec<VoteSet>,
    pub resolved_as: VoteOutcome,
}

impl Contradiction {
    pub fn describe(&self) -> String {
        let sets: Vec<&str> = self.sets.iter().map(VoteSet::as_str).collect();
        format!(
            "member {} appears in {} of division {}; resolved as {}",
            self.member_id,
            sets.join(" and "),
            self.division_id,
            self.resolved_as.as_str()
        )
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    /// One row per member (roster order), one record per division (input order)
    pub member_votes: Vec<Vec<VoteRecord>>,
    pub contradictions: Vec<Contradiction>,
}

impl ReconciliationReport {
    pub fn record_count(&self) -> usize {
        self.member_votes.iter().map(Vec::len).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} members, {} vote records, {} contradictions",
            self.member_votes.len(),
            self.record_count(),
            self.contradictions.len()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Apply teller rules 3 and 4 (default: true)
    pub include_tellers: bool,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            include_tellers: true,
        }
    }

    pub fn without_tellers() -> Self {
        ReconciliationEngine {
            include_tellers: false,
        }
    }

    /// Classify one member in one division: (outcome, is_teller)
    pub fn classify(&self, member: MemberId, division: &DivisionResult) -> (VoteOutcome, bool) {
        if division.aye_voters.contains(&member) {
            (VoteOutcome::Aye, false)
        } else if division.no_voters.contains(&member) {
            (VoteOutcome::No, false)
        } else if self.include_tellers && division.aye_tellers.contains(&member) {
            (VoteOutcome::Aye, true)
        } else if self.include_tellers && division.no_tellers.contains(&member) {
            (VoteOutcome::No, true)
        } else {
            (VoteOutcome::DidNotVote, false)
        }
    }

    /// Build the record for one (member, division) pair
    pub fn record(&self, member: &Member, division: &DivisionResult) -> VoteRecord {
        let (outcome, is_teller) = self.classify(member.id, division);

        VoteRecord {
            member_id: member.id,
            vote_title: division.title.clone(),
            division_number: division.number,
            division_id: division.id,
            outcome,
            is_teller,
            annotation: None,
        }
    }

    /// Cross product of members × divisions
    pub fn reconcile(&self, members: &[Member], divisions: &[DivisionResult]) -> ReconciliationReport {
        let member_votes = members
            .iter()
            .map(|member| {
                divisions
                    .iter()
                    .map(|division| self.record(member, division))
                    .collect()
            })
            .collect();

        let contradictions = divisions
            .iter()
            .flat_map(|division| self.detect_contradictions(division))
            .collect();

        ReconciliationReport {
            member_votes,
            contradictions,
        }
    }

    /// Ids the precedence had to arbitrate between sets
    pub fn detect_contradictions(&self, division: &DivisionResult) -> Vec<Contradiction> {
        division
            .contradictions()
            .into_iter()
            .filter_map(|(member_id, sets)| {
                let sets: Vec<VoteSet> = sets
                    .into_iter()
                    .filter(|set| {
                        self.include_tellers
                            || matches!(set, VoteSet::AyeVoters | VoteSet::NoVoters)
                    })
                    .collect();
                if sets.len() < 2 {
                    return None;
                }

                let (resolved_as, _) = self.classify(member_id, division);
                let contradiction = Contradiction {
                    division_id: division.id,
                    member_id,
                    sets,
                    resolved_as,
                };
                warn!("{}", contradiction.describe());
                Some(contradiction)
            })
            .collect()
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
