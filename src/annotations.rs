// 📝 Annotation Joiner - curated commentary keyed by division id
//
// The commentary sheet comes either as the docs-data JSON export
//   { "sheets": { "Sheet1": [ { "divisionId": 1001, "amendmentGloss": ..., ... } ] } }
// or as a CSV export of the same sheet. Rows are matched to divisions by
// exact numeric id and copied onto the division summary and every vote
// record of that division. Joining is assignment, so re-joining is a no-op.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, warn};

use crate::document::Document;
use crate::entities::DivisionId;
use crate::error::{PipelineError, Result};

// ============================================================================
// ANNOTATION TYPES
// ============================================================================

/// Fields copied onto summaries and vote records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationFields {
    pub gloss_text: String,
    pub gloss_title: String,
    pub is_main_vote: bool,

    /// The aye side voted with the government
    #[serde(rename = "ayeWithGvt")]
    pub aye_aligns_with_government: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub division_id: DivisionId,
    pub fields: AnnotationFields,
}

/// Parsed sheet: at most one annotation per division id, sheet order kept
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    rows: Vec<Annotation>,

    /// Rows that could not be used, with the reason
    pub skipped: Vec<String>,
}

impl AnnotationSet {
    pub fn from_rows(rows: Vec<Annotation>) -> Self {
        let mut set = AnnotationSet::default();
        for row in rows {
            set.push(row);
        }
        set
    }

    /// First row for an id wins
    fn push(&mut self, row: Annotation) {
        if self.get(row.division_id).is_some() {
            debug!(division = %row.division_id, "duplicate annotation row ignored");
            self.skipped
                .push(format!("duplicate annotation for division {}", row.division_id));
        } else {
            self.rows.push(row);
        }
    }

    pub fn get(&self, id: DivisionId) -> Option<&Annotation> {
        self.rows.iter().find(|a| a.division_id == id)
    }

    /// Division ids in sheet order
    pub fn division_ids(&self) -> Vec<DivisionId> {
        self.rows.iter().map(|a| a.division_id).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.rows.iter()
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse the docs-data JSON export (or a bare array of rows)
pub fn parse_annotation_json(document: &Value) -> Result<AnnotationSet> {
    let rows = document
        .as_array()
        .or_else(|| document.pointer("/sheets/Sheet1").and_then(Value::as_array))
        .ok_or_else(|| PipelineError::schema("annotations", "sheets.Sheet1"))?;

    Ok(parse_rows(rows.iter()))
}

/// Parse a CSV export of the sheet (header row required)
pub fn parse_annotation_csv<R: Read>(reader: R) -> Result<AnnotationSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::schema("annotations csv", e.to_string()))?
        .clone();

    if !headers.iter().any(|h| h == "divisionId") {
        return Err(PipelineError::schema("annotations csv", "divisionId"));
    }

    let mut rows = Vec::new();
    for (line_num, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            PipelineError::schema(format!("annotations csv line {}", line_num + 2), e.to_string())
        })?;

        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(Value::Object(row));
    }

    Ok(parse_rows(rows.iter()))
}

fn parse_rows<'a>(rows: impl Iterator<Item = &'a Value>) -> AnnotationSet {
    let mut set = AnnotationSet::default();

    for (idx, row) in rows.enumerate() {
        match parse_row(row) {
            Some(annotation) => set.push(annotation),
            None => {
                warn!(row = idx + 1, "annotation row has no usable divisionId");
                set.skipped
                    .push(format!("annotation row {} has no usable divisionId", idx + 1));
            }
        }
    }

    set
}

fn parse_row(row: &Value) -> Option<Annotation> {
    let division_id = row.get("divisionId").and_then(DivisionId::from_json)?;

    Some(Annotation {
        division_id,
        fields: AnnotationFields {
            gloss_text: text(row, "amendmentGloss"),
            gloss_title: text(row, "amendmentTitle"),
            is_main_vote: flag(row.get("isFinalVote")),
            aye_aligns_with_government: flag(row.get("ayeWithGvt")),
        },
    })
}

fn text(row: &Value, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// 0/1 flags: 1, "1" and true are true; everything else is false
fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        Some(Value::String(s)) => s.trim() == "1",
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

// ============================================================================
// JOINER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinReport {
    /// Divisions that received annotation fields
    pub annotated: Vec<DivisionId>,

    /// Annotation rows for divisions that were not requested
    pub unmatched: Vec<DivisionId>,
}

pub struct AnnotationJoiner<'a> {
    annotations: &'a AnnotationSet,
}

impl<'a> AnnotationJoiner<'a> {
    pub fn new(annotations: &'a AnnotationSet) -> Self {
        AnnotationJoiner { annotations }
    }

    /// Enrich every division with data, and its vote records
    pub fn join(&self, document: &mut Document) -> JoinReport {
        let mut report = JoinReport::default();
        let mut annotated = HashSet::new();

        for summary in document.divisions_info.iter_mut() {
            if !summary.has_data {
                continue;
            }
            if let Some(annotation) = self.annotations.get(summary.id) {
                summary.annotation = Some(annotation.fields.clone());
                annotated.insert(summary.id);
                report.annotated.push(summary.id);
            }
        }

        for member in document.members_info.iter_mut() {
            for vote in member.votes.iter_mut() {
                if !annotated.contains(&vote.division_id) {
                    continue;
                }
                if let Some(annotation) = self.annotations.get(vote.division_id) {
                    vote.annotation = Some(annotation.fields.clone());
                }
            }
        }

        let requested: HashSet<DivisionId> = document.divisions_info.iter().map(|d| d.id).collect();
        for annotation in self.annotations.iter() {
            if !requested.contains(&annotation.division_id) {
                let err = PipelineError::UnmatchedAnnotation(annotation.division_id);
                debug!("{}", err);
                report.unmatched.push(annotation.division_id);
            }
        }

        report
    }
}

// ============================================================================
// TESTS
// ============================================================================
