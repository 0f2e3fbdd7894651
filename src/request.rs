// 🎯 Division Selection - which divisions a run covers
//
// Either an explicit comma-separated id list ("1001, 1002,1003") or every
// division named in the annotation sheet. Order is preserved: it is the
// order of divisionsInfo and of every member's votes.

use crate::entities::DivisionId;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DivisionSelection {
    Explicit(Vec<DivisionId>),
    FromAnnotations,
}

impl DivisionSelection {
    pub fn explicit(raw: &str) -> Result<Self> {
        parse_division_ids(raw).map(DivisionSelection::Explicit)
    }

    pub fn is_annotation_driven(&self) -> bool {
        matches!(self, DivisionSelection::FromAnnotations)
    }
}

/// Split, trim and parse a comma-separated id list
pub fn parse_division_ids(raw: &str) -> Result<Vec<DivisionId>> {
    if raw.trim().is_empty() {
        return Err(PipelineError::InputValidation(
            "no division ids given".to_string(),
        ));
    }

    raw.split(',')
        .map(str::trim)
        .map(|token| {
            if token.is_empty() {
                return Err(PipelineError::InputValidation(format!(
                    "empty entry in division list '{}'",
                    raw
                )));
            }
            DivisionId::parse(token).ok_or_else(|| {
                PipelineError::InputValidation(format!("'{}' is not a division id", token))
            })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
