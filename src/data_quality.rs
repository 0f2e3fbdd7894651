// ✅ Data Quality Report - non-fatal findings of one run
//
// Nothing here aborts a run (strict integrity is enforced by the pipeline).
// Findings are collected while the pipeline works and logged once at the end:
// missing divisions, contradictory set membership, negative abstain counts,
// annotation rows that matched nothing, and oddities noticed by the parsers.

use serde::Serialize;
use tracing::{info, warn};

use crate::entities::DivisionId;
use crate::error::PipelineError;
use crate::reconciliation::Contradiction;
use crate::tally::DivisionTotals;

// ============================================================================
// QUALITY ISSUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Critical, // Output contains a figure that cannot be right
    Warning,  // Output is valid but the source disagreed with itself
    Info,     // Expected degradation (no data, unused annotation)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityIssue {
    pub severity: Severity,

    /// Division the finding is about, when there is one
    pub division: Option<DivisionId>,

    pub issue: String,
    pub recommendation: String,
}

impl QualityIssue {
    fn new(severity: Severity, division: Option<DivisionId>, issue: String, recommendation: &str) -> Self {
        QualityIssue {
            severity,
            division,
            issue,
            recommendation: recommendation.to_string(),
        }
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing_division(&mut self, id: DivisionId) {
        self.issues.push(QualityIssue::new(
            Severity::Info,
            Some(id),
            PipelineError::DivisionNotFound(id).to_string(),
            "Check the division id; it is emitted with hasData: false",
        ));
    }

    pub fn contradiction(&mut self, contradiction: &Contradiction) {
        self.issues.push(QualityIssue::new(
            Severity::Warning,
            Some(contradiction.division_id),
            contradiction.describe(),
            "Resolved by precedence; compare against the published division list",
        ));
    }

    /// Records a finding only when the totals are inconsistent
    pub fn check_totals(&mut self, id: DivisionId, totals: &DivisionTotals) {
        if totals.is_consistent() {
            return;
        }
        self.issues.push(QualityIssue::new(
            Severity::Critical,
            Some(id),
            format!("abstain count is {}", totals.abstain_count),
            "The division lists more participants than the roster has members; check the roster is current",
        ));
    }

    pub fn unmatched_annotation(&mut self, id: DivisionId) {
        self.issues.push(QualityIssue::new(
            Severity::Info,
            Some(id),
            PipelineError::UnmatchedAnnotation(id).to_string(),
            "Remove the row or add the division to the request",
        ));
    }

    pub fn skipped_annotation(&mut self, reason: &str) {
        self.issues.push(QualityIssue::new(
            Severity::Warning,
            None,
            reason.to_string(),
            "Fix the row in the annotation sheet",
        ));
    }

    pub fn parser_note(&mut self, id: DivisionId, note: &str) {
        self.issues.push(QualityIssue::new(
            Severity::Warning,
            Some(id),
            note.to_string(),
            "Inspect the raw division payload",
        ));
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.count(Severity::Critical) > 0
    }

    pub fn for_division(&self, id: DivisionId) -> Vec<&QualityIssue> {
        self.issues.iter().filter(|i| i.division == Some(id)).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Issues: {} ({} critical, {} warnings, {} info)",
            self.issues.len(),
            self.count(Severity::Critical),
            self.count(Severity::Warning),
            self.count(Severity::Info)
        )
    }

    /// Warnings and critical findings individually, then the summary line
    pub fn log(&self) {
        for issue in self.issues.iter().filter(|i| i.severity != Severity::Info) {
            match issue.division {
                Some(id) => warn!(division = %id, severity = ?issue.severity, "{}", issue.issue),
                None => warn!(severity = ?issue.severity, "{}", issue.issue),
            }
        }
        info!("{}", self.summary());
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{MemberId, VoteSet};
    use crate::reconciliation::VoteOutcome;

    #[test]
    fn test_totals_only_reported_when_negative() {
        let mut report = QualityReport::new();
        report.check_totals(
            DivisionId(1),
            &DivisionTotals {
                ayes_count: 10,
                noes_count: 5,
                abstain_count: 3,
            },
        );
        assert!(report.issues.is_empty());

        report.check_totals(
            DivisionId(2),
            &DivisionTotals {
                ayes_count: 10,
                noes_count: 5,
                abstain_count: -2,
            },
        );
        assert!(report.has_critical_issues());
        assert_eq!(report.for_division(DivisionId(2)).len(), 1);
        assert!(report.issues[0].issue.contains("-2"));
    }

    #[test]
    fn test_severities() {
        let mut report = QualityReport::new();
        report.missing_division(DivisionId(42));
        report.unmatched_annotation(DivisionId(7));
        report.skipped_annotation("row 3: divisionId is not numeric");
        report.contradiction(&Contradiction {
            division_id: DivisionId(1),
            member_id: MemberId(5),
            sets: vec![VoteSet::AyeVoters, VoteSet::NoVoters],
            resolved_as: VoteOutcome::Aye,
        });

        assert_eq!(report.count(Severity::Info), 2);
        assert_eq!(report.count(Severity::Warning), 2);
        assert!(!report.has_critical_issues());
        assert!(report.issues[0].issue.contains("42"));

        println!("✅ {}", report.summary());
    }
}
