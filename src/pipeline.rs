// 🔄 Pipeline - one parameterized run over a resolved snapshot
//
//   roster ──► normalize ──► RosterIndex ─┐
//   payloads ─────────────────► extract ──┴─► reconcile ─► tally ─► assemble ─► join
//
// Everything here is synchronous and pure: retrieval happens before, in
// `fetch`, and the result is handed over as a `Snapshot`.

use serde_json::Value;
use tracing::{debug, info};

use crate::annotations::{AnnotationJoiner, AnnotationSet};
use crate::config::PipelineConfig;
use crate::data_quality::QualityReport;
use crate::document::{DivisionSlot, Document, DocumentAssembler};
use crate::entities::{DivisionId, DivisionResult};
use crate::error::{PipelineError, Result};
use crate::parser::{extract, Extraction, RawDivision, RosterIndex};
use crate::reconciliation::ReconciliationEngine;
use crate::roster::normalize_roster;
use crate::tally::TallyAggregator;

/// All inputs of a run, already retrieved
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub roster: Value,

    /// In requested order
    pub divisions: Vec<RawDivision>,

    /// None when annotations are disabled
    pub annotations: Option<AnnotationSet>,
}

impl Snapshot {
    pub fn requested_ids(&self) -> Vec<DivisionId> {
        self.divisions.iter().map(|d| d.requested_id).collect()
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub document: Document,
    pub quality: QualityReport,
}

pub fn run(config: &PipelineConfig, snapshot: &Snapshot) -> Result<RunOutput> {
    let mut quality = QualityReport::new();

    // 1. Roster
    let registry = config.party_registry();
    let members = normalize_roster(&snapshot.roster, &registry)?;
    let index = RosterIndex::from_members(&members);
    info!(members = members.len(), "roster normalized");

    // 2. Divisions, keeping a hole for every id without data
    let mut found: Vec<DivisionResult> = Vec::new();
    let mut order: Vec<Option<usize>> = Vec::with_capacity(snapshot.divisions.len());

    for raw in &snapshot.divisions {
        match extract(raw, &index)? {
            Extraction::Found(parsed) => {
                for note in &parsed.notes {
                    quality.parser_note(parsed.division.id, note);
                }
                order.push(Some(found.len()));
                found.push(parsed.division);
            }
            Extraction::NoData(id) => {
                debug!("{}", PipelineError::DivisionNotFound(id));
                quality.missing_division(id);
                order.push(None);
            }
        }
    }
    info!(
        requested = snapshot.divisions.len(),
        with_data = found.len(),
        schema = config.schema_version.code(),
        "divisions extracted"
    );

    // 3. Reconciliation
    let engine = if config.include_tellers {
        ReconciliationEngine::new()
    } else {
        ReconciliationEngine::without_tellers()
    };
    let report = engine.reconcile(&members, &found);
    for contradiction in &report.contradictions {
        quality.contradiction(contradiction);
    }
    info!("{}", report.summary());

    // 4. Tallies
    let aggregator = TallyAggregator::new(&registry, &members).with_tellers(config.include_tellers);
    let mut tallies = Vec::with_capacity(found.len());
    for division in &found {
        let tally = aggregator.tally(division);
        if config.strict_integrity && !tally.totals.is_consistent() {
            return Err(PipelineError::DataIntegrity(format!(
                "division {} has abstain count {}",
                division.id, tally.totals.abstain_count
            )));
        }
        quality.check_totals(division.id, &tally.totals);
        tallies.push(tally);
    }

    // 5. Assembly, requested order restored
    let mut resolved: Vec<Option<_>> = found.into_iter().zip(tallies).map(Some).collect();
    let slots = snapshot
        .divisions
        .iter()
        .zip(order)
        .map(|(raw, slot)| match slot.and_then(|idx| resolved[idx].take()) {
            Some((division, tally)) => DivisionSlot::Found { division, tally },
            None => DivisionSlot::Missing(raw.requested_id),
        })
        .collect();

    let assembler = DocumentAssembler::with_party_breakdown(config.include_party_breakdown);
    let mut document = assembler.assemble(slots, members, report.member_votes);

    // 6. Annotations
    if config.include_annotations {
        if let Some(annotations) = &snapshot.annotations {
            for reason in &annotations.skipped {
                quality.skipped_annotation(reason);
            }
            let joined = AnnotationJoiner::new(annotations).join(&mut document);
            for id in joined.unmatched {
                quality.unmatched_annotation(id);
            }
            info!(annotated = joined.annotated.len(), "annotations joined");
        }
    }

    info!("{}", document.summary());

    Ok(RunOutput { document, quality })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::parse_annotation_json;
    use crate::entities::SourceSchema;
    use serde_json::json;

    fn create_test_roster() -> Value {
        json!({
            "Members": { "Member": [
                { "@Member_Id": "1", "DisplayAs": "Alice", "Party": { "#text": "Labour" } },
                { "@Member_Id": "2", "DisplayAs": "Bob", "Party": { "#text": "Conservative" } },
                { "@Member_Id": "3", "DisplayAs": "Carol", "Party": { "#text": "Labour (Co-op)" } }
            ]}
        })
    }

    fn create_test_division(id: u64, ayes: &[u64], noes: &[u64]) -> Value {
        let voters = |ids: &[u64]| -> Vec<Value> {
            ids.iter()
                .map(|id| json!({ "MemberId": id, "Name": format!("M{}", id), "Party": "" }))
                .collect()
        };
        json!({
            "DivisionId": id,
            "Number": 3,
            "Title": format!("Division {}", id),
            "Date": "2019-01-15T19:00:00",
            "AyeCount": ayes.len(),
            "NoCount": noes.len(),
            "Ayes": voters(ayes),
            "Noes": voters(noes),
            "AyeTellers": [],
            "NoTellers": []
        })
    }

    fn snapshot(divisions: Vec<(u64, Option<Value>)>) -> Snapshot {
        Snapshot {
            roster: create_test_roster(),
            divisions: divisions
                .into_iter()
                .map(|(id, payload)| RawDivision::new(DivisionId(id), SourceSchema::Current, payload))
                .collect(),
            annotations: None,
        }
    }

    #[test]
    fn test_scenario_a_end_to_end() {
        let snap = snapshot(vec![(1001, Some(create_test_division(1001, &[1], &[2])))]);
        let output = run(&PipelineConfig::default(), &snap).unwrap();
        let doc = output.document;

        let carol = &doc.members_info[2];
        assert_eq!(carol.member.party, "Labour");
        assert_eq!(carol.votes[0].outcome.as_str(), "A");

        let detail = doc.divisions_info[0].detail.as_ref().unwrap();
        let labour = detail
            .ayes_by_party
            .as_ref()
            .unwrap()
            .iter()
            .find(|r| r.party == "Labour")
            .unwrap();
        assert_eq!(labour.votes, 1);
        assert_eq!(detail.abstain_count, 1);
        assert_eq!(detail.date, "2019-01-15");
    }

    #[test]
    fn test_missing_division_keeps_position() {
        let snap = snapshot(vec![
            (1002, Some(create_test_division(1002, &[2], &[]))),
            (42, None),
            (1001, Some(create_test_division(1001, &[1], &[2]))),
        ]);
        let output = run(&PipelineConfig::default(), &snap).unwrap();
        let doc = &output.document;

        let ids: Vec<u64> = doc.divisions_info.iter().map(|d| d.id.0).collect();
        assert_eq!(ids, vec![1002, 42, 1001]);
        assert!(!doc.divisions_info[1].has_data);

        let alice_votes: Vec<u64> = doc.members_info[0].votes.iter().map(|v| v.division_id.0).collect();
        assert_eq!(alice_votes, vec![1002, 1001]);
        assert_eq!(output.quality.for_division(DivisionId(42)).len(), 1);
    }

    #[test]
    fn test_annotations_only_when_enabled() {
        let mut snap = snapshot(vec![(1001, Some(create_test_division(1001, &[1], &[])))]);
        snap.annotations = Some(
            parse_annotation_json(&json!([
                { "divisionId": 1001, "amendmentGloss": "Gloss", "amendmentTitle": "Title", "isFinalVote": 1, "ayeWithGvt": 0 },
                { "divisionId": 77, "amendmentGloss": "Other", "amendmentTitle": "Other", "isFinalVote": 0, "ayeWithGvt": 0 }
            ]))
            .unwrap(),
        );

        let output = run(&PipelineConfig::default(), &snap).unwrap();
        let annotation = output.document.divisions_info[0].annotation.as_ref().unwrap();
        assert_eq!(annotation.gloss_title, "Title");
        assert!(output.document.members_info[0].votes[0].annotation.is_some());
        assert_eq!(output.quality.for_division(DivisionId(77)).len(), 1);

        let config = PipelineConfig {
            include_annotations: false,
            ..PipelineConfig::default()
        };
        let output = run(&config, &snap).unwrap();
        assert!(output.document.divisions_info[0].annotation.is_none());
    }

    #[test]
    fn test_strict_integrity_aborts() {
        // Five voters against a three-member roster
        let snap = snapshot(vec![(1001, Some(create_test_division(1001, &[1, 2, 3, 4], &[5])))]);

        let lenient = run(&PipelineConfig::default(), &snap).unwrap();
        assert_eq!(
            lenient.document.divisions_info[0].detail.as_ref().unwrap().abstain_count,
            -2
        );
        assert!(lenient.quality.has_critical_issues());

        let strict = PipelineConfig {
            strict_integrity: true,
            ..PipelineConfig::default()
        };
        assert!(matches!(run(&strict, &snap), Err(PipelineError::DataIntegrity(_))));
    }

    #[test]
    fn test_bad_roster_aborts() {
        let mut snap = snapshot(vec![]);
        snap.roster = json!({ "Members": { "Member": [ { "DisplayAs": "No Id" } ] } });
        assert!(matches!(
            run(&PipelineConfig::default(), &snap),
            Err(PipelineError::SchemaMismatch { .. })
        ));
    }
}
