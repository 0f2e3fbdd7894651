// 📋 Roster Normalizer - raw member rows → canonical Members
//
// Input is the members data platform document:
//   { "Members": { "Member": [ { "@Member_Id": "172", "DisplayAs": ..., "Party": { "#text": ..., "@Id": ... } } ] } }
// A bare array of rows is accepted too. Row order is kept; it becomes the
// member order of the output document.

use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::entities::{Member, MemberId, PartyRegistry};
use crate::error::{PipelineError, Result};

/// Normalize a roster document into members, in input order
pub fn normalize_roster(document: &Value, parties: &PartyRegistry) -> Result<Vec<Member>> {
    let rows = roster_rows(document)?;

    let mut members = Vec::with_capacity(rows.len());
    let mut seen = HashSet::new();

    for (idx, row) in rows.iter().enumerate() {
        let member = normalize_row(row, idx, parties)?;

        if !seen.insert(member.id) {
            return Err(PipelineError::schema(
                format!("roster row {}", idx + 1),
                format!("@Member_Id (duplicate id {})", member.id),
            ));
        }

        members.push(member);
    }

    debug!(count = members.len(), "roster normalized");
    Ok(members)
}

fn roster_rows(document: &Value) -> Result<Vec<&Value>> {
    if let Some(rows) = document.as_array() {
        return Ok(rows.iter().collect());
    }

    let member = document
        .get("Members")
        .and_then(|m| m.get("Member"))
        .ok_or_else(|| PipelineError::schema("roster", "Members.Member"))?;

    // A single-member result comes back as an object rather than an array
    match member {
        Value::Array(rows) => Ok(rows.iter().collect()),
        Value::Object(_) => Ok(vec![member]),
        _ => Err(PipelineError::schema("roster", "Members.Member")),
    }
}

fn normalize_row(row: &Value, idx: usize, parties: &PartyRegistry) -> Result<Member> {
    let what = || format!("roster row {}", idx + 1);

    let id = match row.get("@Member_Id") {
        Some(Value::String(s)) => MemberId::parse(s),
        Some(Value::Number(n)) => n.as_u64().map(MemberId),
        _ => None,
    }
    .ok_or_else(|| PipelineError::schema(what(), "@Member_Id"))?;

    let name = required_str(row, "DisplayAs").ok_or_else(|| PipelineError::schema(what(), "DisplayAs"))?;

    let party = row.get("Party");
    let party_name = party
        .and_then(|p| p.get("#text").and_then(Value::as_str).or_else(|| p.as_str()))
        .ok_or_else(|| PipelineError::schema(what(), "Party.#text"))?;

    let party_id = party
        .and_then(|p| p.get("@Id"))
        .map(scalar_to_string)
        .unwrap_or_default();

    Ok(Member {
        id,
        name: name.to_string(),
        list_as: optional_str(row, "ListAs"),
        party: parties.canonical_name(party_name),
        party_id,
        constituency: optional_str(row, "MemberFrom"),
        gender: optional_str(row, "Gender"),
    })
}

fn required_str<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

fn optional_str(row: &Value, key: &str) -> String {
    row.get(key).map(scalar_to_string).unwrap_or_default()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
