// 📦 Document Assembler - final output shape
//
//   { "divisionsInfo": [ DivisionSummary... ], "membersInfo": [ MemberWithVotes... ] }
//
// Division order follows the requested id list, member order follows the
// roster. Divisions without data appear as { "id": ..., "hasData": false }.

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::annotations::AnnotationFields;
use crate::entities::{DivisionId, DivisionResult, Member, ProviderFigures};
use crate::error::Result;
use crate::reconciliation::VoteRecord;
use crate::tally::{DivisionTally, PartyCount};

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub divisions_info: Vec<DivisionSummary>,
    pub members_info: Vec<MemberWithVotes>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionSummary {
    pub id: DivisionId,
    pub has_data: bool,

    #[serde(flatten)]
    pub detail: Option<DivisionDetail>,

    #[serde(flatten)]
    pub annotation: Option<AnnotationFields>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionDetail {
    pub title: String,
    pub number: u32,
    pub date: String,
    pub ayes_count: u32,
    pub noes_count: u32,
    pub abstain_count: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ayes_by_party: Option<Vec<PartyCount>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub noes_by_party: Option<Vec<PartyCount>>,

    /// Linked-data extras (uin, margin, provider counts), absent otherwise
    #[serde(flatten)]
    pub provider: ProviderFigures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberWithVotes {
    #[serde(flatten)]
    pub member: Member,
    pub votes: Vec<VoteRecord>,
}

impl DivisionSummary {
    pub fn no_data(id: DivisionId) -> Self {
        DivisionSummary {
            id,
            has_data: false,
            detail: None,
            annotation: None,
        }
    }
}

impl Document {
    pub fn divisions_with_data(&self) -> usize {
        self.divisions_info.iter().filter(|d| d.has_data).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} divisions ({} with data), {} members",
            self.divisions_info.len(),
            self.divisions_with_data(),
            self.members_info.len()
        )
    }
}

// ============================================================================
// ASSEMBLER
// ============================================================================

/// One requested division, resolved or not
#[derive(Debug, Clone)]
pub enum DivisionSlot {
    Found {
        division: DivisionResult,
        tally: DivisionTally,
    },
    Missing(DivisionId),
}

pub struct DocumentAssembler {
    /// Emit ayesByParty / noesByParty (default: true)
    pub include_party_breakdown: bool,
}

impl DocumentAssembler {
    pub fn new() -> Self {
        DocumentAssembler {
            include_party_breakdown: true,
        }
    }

    pub fn with_party_breakdown(include_party_breakdown: bool) -> Self {
        DocumentAssembler {
            include_party_breakdown,
        }
    }

    pub fn summarize(&self, slot: DivisionSlot) -> DivisionSummary {
        match slot {
            DivisionSlot::Missing(id) => DivisionSummary::no_data(id),
            DivisionSlot::Found { division, tally } => {
                let (ayes_by_party, noes_by_party) = if self.include_party_breakdown {
                    (Some(tally.ayes_by_party), Some(tally.noes_by_party))
                } else {
                    (None, None)
                };

                DivisionSummary {
                    id: division.id,
                    has_data: true,
                    detail: Some(DivisionDetail {
                        title: division.title,
                        number: division.number,
                        date: division.date,
                        ayes_count: tally.totals.ayes_count,
                        noes_count: tally.totals.noes_count,
                        abstain_count: tally.totals.abstain_count,
                        ayes_by_party,
                        noes_by_party,
                        provider: division.provider,
                    }),
                    annotation: None,
                }
            }
        }
    }

    /// `member_votes` is indexed like `members`
    pub fn assemble(
        &self,
        slots: Vec<DivisionSlot>,
        members: Vec<Member>,
        member_votes: Vec<Vec<VoteRecord>>,
    ) -> Document {
        let divisions_info = slots.into_iter().map(|slot| self.summarize(slot)).collect();

        let members_info = members
            .into_iter()
            .zip(member_votes.into_iter().chain(std::iter::repeat_with(Vec::new)))
            .map(|(member, votes)| MemberWithVotes { member, votes })
            .collect();

        Document {
            divisions_info,
            members_info,
        }
    }
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Write pretty JSON to a sibling temp file, then rename it into place
pub fn write_atomic<P: AsRef<Path>>(path: P, document: &Document) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(document).map_err(std::io::Error::from)?;

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, json)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    debug!(path = %path.display(), "document written");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
