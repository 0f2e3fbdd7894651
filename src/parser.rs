// 🏗️ Division Extractor - two provider schemas, one canonical shape
//
// Legacy (linked-data) payloads reference members by URI and split tellers
// by URL path; current payloads carry numeric ids and explicit teller lists.
// Each schema gets one parser; both produce a DivisionResult keyed by
// MemberId so nothing downstream branches on schema.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::entities::{DivisionId, DivisionResult, Member, MemberId, ProviderFigures, SourceSchema};
use crate::error::{PipelineError, Result};

// ============================================================================
// CORE TYPES
// ============================================================================

/// One retrieved division payload, tagged with the schema it was fetched as
#[derive(Debug, Clone)]
pub struct RawDivision {
    pub requested_id: DivisionId,
    pub schema: SourceSchema,

    /// None when the source had nothing for this id
    pub payload: Option<Value>,
}

impl RawDivision {
    pub fn new(requested_id: DivisionId, schema: SourceSchema, payload: Option<Value>) -> Self {
        RawDivision {
            requested_id,
            schema,
            payload,
        }
    }

    /// Absent, null and empty-object payloads all mean "no data"
    pub fn has_payload(&self) -> bool {
        match &self.payload {
            None | Some(Value::Null) => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }
}

/// Output of a parser: the division plus anything odd noticed on the way
#[derive(Debug, Clone)]
pub struct ParsedDivision {
    pub division: DivisionResult,
    pub notes: Vec<String>,
}

/// Output of extraction for one requested id
#[derive(Debug, Clone)]
pub enum Extraction {
    Found(ParsedDivision),
    NoData(DivisionId),
}

/// Name → id lookup for legacy tellers that only carry a printed name
#[derive(Debug, Clone, Default)]
pub struct RosterIndex {
    by_name: HashMap<String, Option<MemberId>>,
}

impl RosterIndex {
    pub fn from_members(members: &[Member]) -> Self {
        let mut by_name: HashMap<String, Option<MemberId>> = HashMap::new();
        for member in members {
            by_name
                .entry(name_key(&member.name))
                .and_modify(|slot| *slot = None) // ambiguous
                .or_insert(Some(member.id));
        }
        RosterIndex { by_name }
    }

    /// Resolve a display name; ambiguous or unknown names resolve to None
    pub fn resolve_name(&self, name: &str) -> Option<MemberId> {
        self.by_name.get(&name_key(name)).copied().flatten()
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// DivisionParser - one implementation per provider schema
pub trait DivisionParser: Send + Sync {
    /// Parse a non-empty payload into a canonical division
    fn parse(&self, requested: DivisionId, payload: &Value, roster: &RosterIndex) -> Result<ParsedDivision>;

    /// Get the schema this parser handles
    fn schema(&self) -> SourceSchema;

    /// Get parser version (for provenance in logs)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

/// Get the parser for a schema
pub fn get_parser(schema: SourceSchema) -> Box<dyn DivisionParser> {
    match schema {
        SourceSchema::Legacy => Box::new(LegacyParser::new()),
        SourceSchema::Current => Box::new(CurrentParser::new()),
    }
}

/// Extract one division, mapping an empty payload to NoData
pub fn extract(raw: &RawDivision, roster: &RosterIndex) -> Result<Extraction> {
    let payload = match &raw.payload {
        Some(payload) if raw.has_payload() => payload,
        _ => {
            debug!(division = %raw.requested_id, "no payload for division");
            return Ok(Extraction::NoData(raw.requested_id));
        }
    };

    let parser = get_parser(raw.schema);
    let parsed = parser.parse(raw.requested_id, payload, roster)?;

    debug!(
        division = %parsed.division.id,
        schema = parser.schema().code(),
        parser_version = parser.version(),
        ayes = parsed.division.aye_voters.len(),
        noes = parsed.division.no_voters.len(),
        "division extracted"
    );

    Ok(Extraction::Found(parsed))
}

/// Normalize a provider date to YYYY-MM-DD, passing unparseable input through
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return datetime.date().format("%Y-%m-%d").to_string();
    }
    // Fractional seconds, offsets and similar: the date prefix is enough
    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    raw.to_string()
}

/// Insert into a voter set, noting duplicates
fn insert_voter(set: &mut std::collections::BTreeSet<MemberId>, id: MemberId, label: &str, notes: &mut Vec<String>) {
    if !set.insert(id) {
        notes.push(format!("member {} listed twice in {}", id, label));
    }
}

/// Append to a teller list, noting duplicates
fn push_teller(list: &mut Vec<MemberId>, id: MemberId, label: &str, notes: &mut Vec<String>) {
    if list.contains(&id) {
        notes.push(format!("member {} listed twice in {}", id, label));
    } else {
        list.push(id);
    }
}

fn value_as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// LEGACY PARSER (linked-data API)
// ============================================================================

pub struct LegacyParser;

impl LegacyParser {
    pub fn new() -> Self {
        LegacyParser
    }

    /// "{ "AyesCount": [ { "_value": 302 } ] }" style typed counts
    fn typed_count(topic: &Value, key: &str, what: &str) -> Result<u32> {
        topic
            .get(key)
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("_value"))
            .and_then(value_as_u32)
            .ok_or_else(|| PipelineError::schema(what, format!("{}[0]._value", key)))
    }

    fn typed_value<'v>(topic: &'v Value, key: &str) -> Option<&'v Value> {
        topic.get(key).and_then(|v| v.get(0)).and_then(|v| v.get("_value"))
    }

    /// Published alongside the counts but not always present
    fn provider_figures(topic: &Value) -> ProviderFigures {
        let count = |key: &str| Self::typed_value(topic, key).and_then(value_as_u32);

        ProviderFigures {
            uin: topic.get("uin").and_then(Value::as_str).map(str::to_string),
            margin: Self::typed_value(topic, "Margin").and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }),
            reported_abstain_count: count("AbstainCount"),
            did_not_vote_count: count("Didnotvotecount"),
            error_count: count("Errorvotecount"),
            non_eligible_count: count("Noneligiblecount"),
            suspended_or_expelled_count: count("Suspendedorexpelledvotescount"),
        }
    }

    fn member_uri(entry: &Value) -> Option<&str> {
        entry
            .get("member")
            .and_then(|m| m.get(0))
            .and_then(|m| m.get("_about"))
            .and_then(Value::as_str)
    }

    /// Teller side lives in the path: ".../922224/AyeTellers/1"
    fn teller_is_aye(about: &str) -> bool {
        let segments: Vec<&str> = about.trim_end_matches('/').split('/').collect();
        segments.len() >= 2 && segments[segments.len() - 2].eq_ignore_ascii_case("AyeTellers")
    }
}

impl Default for LegacyParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DivisionParser for LegacyParser {
    fn parse(&self, requested: DivisionId, payload: &Value, roster: &RosterIndex) -> Result<ParsedDivision> {
        let what = format!("division {}", requested);

        let topic = payload
            .pointer("/result/primaryTopic")
            .ok_or_else(|| PipelineError::schema(&what, "result.primaryTopic"))?;

        let id = topic
            .get("_about")
            .and_then(Value::as_str)
            .and_then(DivisionId::from_uri)
            .unwrap_or(requested);

        let title = topic
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::schema(&what, "title"))?;

        let number = topic
            .get("divisionNumber")
            .and_then(value_as_u32)
            .ok_or_else(|| PipelineError::schema(&what, "divisionNumber"))?;

        let date = topic
            .get("date")
            .and_then(|d| d.get("_value").or(Some(d)))
            .and_then(Value::as_str)
            .map(normalize_date)
            .unwrap_or_default();

        let mut division = DivisionResult::new(id, number, title, SourceSchema::Legacy);
        division.date = date;
        division.aye_count = Self::typed_count(topic, "AyesCount", &what)?;
        division.no_count = Self::typed_count(topic, "Noesvotecount", &what)?;
        division.provider = Self::provider_figures(topic);

        let mut notes = Vec::new();

        let votes = topic
            .get("vote")
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::schema(&what, "vote"))?;

        for (idx, vote) in votes.iter().enumerate() {
            let member = Self::member_uri(vote)
                .and_then(MemberId::from_uri)
                .ok_or_else(|| PipelineError::schema(&what, format!("vote[{}].member[0]._about", idx)))?;

            let vote_type = vote
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| PipelineError::schema(&what, format!("vote[{}].type", idx)))?;

            // "http://data.parliament.uk/schema/parl#AyeVote" → "AyeVote"
            match vote_type.rsplit('#').next().unwrap_or(vote_type) {
                "AyeVote" => insert_voter(&mut division.aye_voters, member, "ayeVoters", &mut notes),
                "NoVote" => insert_voter(&mut division.no_voters, member, "noVoters", &mut notes),
                other => debug!(division = %id, member = %member, vote_type = other, "ignoring vote type"),
            }
        }

        // Tellers are optional in this schema
        let tellers = topic.get("teller").and_then(Value::as_array).cloned().unwrap_or_default();

        for (idx, teller) in tellers.iter().enumerate() {
            let about = teller
                .get("_about")
                .and_then(Value::as_str)
                .ok_or_else(|| PipelineError::schema(&what, format!("teller[{}]._about", idx)))?;

            let printed = teller
                .get("memberPrinted")
                .and_then(|m| m.get("_value").or(Some(m)))
                .and_then(Value::as_str);

            let member = Self::member_uri(teller)
                .and_then(MemberId::from_uri)
                .or_else(|| printed.and_then(|name| roster.resolve_name(name)));

            let Some(member) = member else {
                let name = printed.unwrap_or("<unnamed>");
                warn!(division = %id, teller = name, "could not resolve teller to a member");
                notes.push(format!("unresolved teller '{}'", name));
                continue;
            };

            if Self::teller_is_aye(about) {
                push_teller(&mut division.aye_tellers, member, "ayeTellers", &mut notes);
            } else {
                push_teller(&mut division.no_tellers, member, "noTellers", &mut notes);
            }
        }

        Ok(ParsedDivision { division, notes })
    }

    fn schema(&self) -> SourceSchema {
        SourceSchema::Legacy
    }
}

// ============================================================================
// CURRENT PARSER (votes services API)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrentDivision {
    division_id: u64,
    number: u32,
    title: String,
    date: String,
    aye_count: u32,
    no_count: u32,
    ayes: Vec<CurrentVoter>,
    noes: Vec<CurrentVoter>,
    #[serde(default)]
    aye_tellers: Option<Vec<CurrentVoter>>,
    #[serde(default)]
    no_tellers: Option<Vec<CurrentVoter>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrentVoter {
    member_id: u64,
    #[serde(default)]
    party: Option<String>,
}

pub struct CurrentParser;

impl CurrentParser {
    const REQUIRED: [&'static str; 8] = [
        "DivisionId", "Number", "Title", "Date", "AyeCount", "NoCount", "Ayes", "Noes",
    ];

    pub fn new() -> Self {
        CurrentParser
    }
}

impl Default for CurrentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DivisionParser for CurrentParser {
    fn parse(&self, requested: DivisionId, payload: &Value, _roster: &RosterIndex) -> Result<ParsedDivision> {
        let what = format!("division {}", requested);

        // Name the missing field before serde gets a chance to
        if let Some(missing) = Self::REQUIRED.iter().find(|key| payload.get(**key).map_or(true, Value::is_null)) {
            return Err(PipelineError::schema(&what, *missing));
        }

        let raw: CurrentDivision = serde_json::from_value(payload.clone())
            .map_err(|e| PipelineError::schema(&what, e.to_string()))?;

        let mut division = DivisionResult::new(
            DivisionId(raw.division_id),
            raw.number,
            &raw.title,
            SourceSchema::Current,
        );
        division.date = normalize_date(&raw.date);
        division.aye_count = raw.aye_count;
        division.no_count = raw.no_count;

        let mut notes = Vec::new();

        for voter in &raw.ayes {
            insert_voter(&mut division.aye_voters, MemberId(voter.member_id), "ayeVoters", &mut notes);
        }
        for voter in &raw.noes {
            insert_voter(&mut division.no_voters, MemberId(voter.member_id), "noVoters", &mut notes);
        }
        for teller in raw.aye_tellers.iter().flatten() {
            push_teller(&mut division.aye_tellers, MemberId(teller.member_id), "ayeTellers", &mut notes);
        }
        for teller in raw.no_tellers.iter().flatten() {
            push_teller(&mut division.no_tellers, MemberId(teller.member_id), "noTellers", &mut notes);
        }

        let everyone = raw
            .ayes
            .iter()
            .chain(&raw.noes)
            .chain(raw.aye_tellers.iter().flatten())
            .chain(raw.no_tellers.iter().flatten());
        for voter in everyone {
            if let Some(party) = &voter.party {
                division
                    .source_parties
                    .entry(MemberId(voter.member_id))
                    .or_insert_with(|| party.clone());
            }
        }

        Ok(ParsedDivision { division, notes })
    }

    fn schema(&self) -> SourceSchema {
        SourceSchema::Current
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn current_payload() -> Value {
        json!({
            "DivisionId": 1001,
            "Number": 12,
            "Title": "European Union (Withdrawal) Bill",
            "Date": "2019-01-15T00:00:00",
            "AyeCount": 10,
            "NoCount": 3,
            "Ayes": [
                { "MemberId": 1, "Name": "Alice", "Party": "Labour" },
                { "MemberId": 4, "Name": "Dan", "Party": "Labour (Co-op)" }
            ],
            "Noes": [ { "MemberId": 2, "Name": "Bob", "Party": "Conservative" } ],
            "AyeTellers": [ { "MemberId": 5, "Party": "Labour" }, { "MemberId": 6, "Party": "Labour" } ],
            "NoTellers": [ { "MemberId": 7, "Party": "Conservative" } ]
        })
    }

    fn legacy_payload() -> Value {
        json!({
            "result": { "primaryTopic": {
                "_about": "http://data.parliament.uk/resources/922224",
                "title": "Finance Bill: Amendment 3",
                "divisionNumber": "276",
                "date": { "_value": "2018-11-21", "_datatype": "dateTime" },
                "uin": "CD:2018-11-21:276",
                "AyesCount": [ { "_value": 2 } ],
                "Noesvotecount": [ { "_value": 1 } ],
                "Margin": [ { "_value": 1 } ],
                "AbstainCount": [ { "_value": 0 } ],
                "Didnotvotecount": [ { "_value": 3 } ],
                "Errorvotecount": [ { "_value": 0 } ],
                "Noneligiblecount": [ { "_value": "7" } ],
                "Suspendedorexpelledvotescount": [ { "_value": 0 } ],
                "vote": [
                    { "member": [ { "_about": "http://data.parliament.uk/members/1" } ], "type": "http://data.parliament.uk/schema/parl#AyeVote" },
                    { "member": [ { "_about": "http://data.parliament.uk/members/3" } ], "type": "http://data.parliament.uk/schema/parl#AyeVote" },
                    { "member": [ { "_about": "http://data.parliament.uk/members/2" } ], "type": "http://data.parliament.uk/schema/parl#NoVote" }
                ],
                "teller": [
                    { "_about": "http://data.parliament.uk/resources/922224/AyeTellers/1", "memberPrinted": { "_value": "Erin" } },
                    { "_about": "http://data.parliament.uk/resources/922224/NoTellers/1",
                      "member": [ { "_about": "http://data.parliament.uk/members/8" } ] }
                ]
            }}
        })
    }

    fn roster_index() -> RosterIndex {
        RosterIndex::from_members(&[
            Member::new(1, "Alice", "Labour"),
            Member::new(5, "Erin", "Labour"),
        ])
    }

    #[test]
    fn test_current_parser() {
        let raw = RawDivision::new(DivisionId(1001), SourceSchema::Current, Some(current_payload()));
        let Extraction::Found(parsed) = extract(&raw, &RosterIndex::default()).unwrap() else {
            panic!("expected data");
        };
        let d = parsed.division;

        assert_eq!(d.id, DivisionId(1001));
        assert_eq!(d.number, 12);
        assert_eq!(d.date, "2019-01-15");
        assert_eq!(d.aye_count, 10);
        assert_eq!(d.aye_voters.len(), 2);
        assert!(d.no_voters.contains(&MemberId(2)));
        assert_eq!(d.aye_tellers, vec![MemberId(5), MemberId(6)]);
        assert_eq!(d.no_tellers, vec![MemberId(7)]);
        assert_eq!(d.source_parties.get(&MemberId(4)).map(String::as_str), Some("Labour (Co-op)"));
        assert!(parsed.notes.is_empty());
    }

    #[test]
    fn test_current_parser_null_tellers() {
        let mut payload = current_payload();
        payload["AyeTellers"] = Value::Null;
        payload.as_object_mut().unwrap().remove("NoTellers");

        let parsed = CurrentParser::new()
            .parse(DivisionId(1001), &payload, &RosterIndex::default())
            .unwrap();
        assert!(parsed.division.aye_tellers.is_empty());
        assert!(parsed.division.no_tellers.is_empty());
    }

    #[test]
    fn test_current_parser_missing_field() {
        let mut payload = current_payload();
        payload.as_object_mut().unwrap().remove("AyeCount");

        let err = CurrentParser::new()
            .parse(DivisionId(1001), &payload, &RosterIndex::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { ref field, .. } if field == "AyeCount"));
    }

    #[test]
    fn test_legacy_parser() {
        let parsed = LegacyParser::new()
            .parse(DivisionId(922224), &legacy_payload(), &roster_index())
            .unwrap();
        let d = parsed.division;

        assert_eq!(d.id, DivisionId(922224));
        assert_eq!(d.number, 276);
        assert_eq!(d.date, "2018-11-21");
        assert_eq!(d.aye_count, 2);
        assert_eq!(d.no_count, 1);
        assert!(d.aye_voters.contains(&MemberId(1)));
        assert!(d.aye_voters.contains(&MemberId(3)));
        assert!(d.no_voters.contains(&MemberId(2)));
        // Erin resolved by printed name, the no teller by URI
        assert_eq!(d.aye_tellers, vec![MemberId(5)]);
        assert_eq!(d.no_tellers, vec![MemberId(8)]);
        assert!(d.source_parties.is_empty());

        assert_eq!(d.provider.uin.as_deref(), Some("CD:2018-11-21:276"));
        assert_eq!(d.provider.margin, Some(1));
        assert_eq!(d.provider.reported_abstain_count, Some(0));
        assert_eq!(d.provider.did_not_vote_count, Some(3));
        assert_eq!(d.provider.error_count, Some(0));
        assert_eq!(d.provider.non_eligible_count, Some(7));
        assert_eq!(d.provider.suspended_or_expelled_count, Some(0));
    }

    #[test]
    fn test_provider_figures_optional() {
        let mut payload = legacy_payload();
        let topic = payload["result"]["primaryTopic"].as_object_mut().unwrap();
        topic.remove("uin");
        topic.remove("Margin");
        topic.insert("Didnotvotecount".to_string(), json!([]));

        let d = LegacyParser::new()
            .parse(DivisionId(922224), &payload, &roster_index())
            .unwrap()
            .division;
        assert_eq!(d.provider.uin, None);
        assert_eq!(d.provider.margin, None);
        assert_eq!(d.provider.did_not_vote_count, None);
        assert_eq!(d.provider.error_count, Some(0));

        // The current schema has none of these
        let raw = RawDivision::new(DivisionId(1001), SourceSchema::Current, Some(current_payload()));
        let Extraction::Found(parsed) = extract(&raw, &RosterIndex::default()).unwrap() else {
            panic!("expected data");
        };
        assert_eq!(parsed.division.provider, ProviderFigures::default());
    }

    #[test]
    fn test_legacy_unresolved_teller_is_noted() {
        let mut payload = legacy_payload();
        payload["result"]["primaryTopic"]["teller"][0]["memberPrinted"]["_value"] = json!("Nobody Known");

        let parsed = LegacyParser::new()
            .parse(DivisionId(922224), &payload, &roster_index())
            .unwrap();
        assert!(parsed.division.aye_tellers.is_empty());
        assert_eq!(parsed.notes.len(), 1);
        assert!(parsed.notes[0].contains("Nobody Known"));
    }

    #[test]
    fn test_legacy_missing_counts() {
        let mut payload = legacy_payload();
        payload["result"]["primaryTopic"].as_object_mut().unwrap().remove("Noesvotecount");

        let err = LegacyParser::new()
            .parse(DivisionId(922224), &payload, &roster_index())
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_teller_side_from_path() {
        assert!(LegacyParser::teller_is_aye("http://x/resources/1/AyeTellers/1"));
        assert!(!LegacyParser::teller_is_aye("http://x/resources/1/NoTellers/2"));
        assert!(!LegacyParser::teller_is_aye("AyeTellers"));
    }

    #[test]
    fn test_empty_payloads_are_no_data() {
        for payload in [None, Some(Value::Null), Some(json!({}))] {
            let raw = RawDivision::new(DivisionId(42), SourceSchema::Current, payload);
            assert!(matches!(
                extract(&raw, &RosterIndex::default()).unwrap(),
                Extraction::NoData(DivisionId(42))
            ));
        }
    }

    #[test]
    fn test_duplicate_voter_noted() {
        let mut payload = current_payload();
        payload["Ayes"] = json!([{ "MemberId": 1 }, { "MemberId": 1 }]);

        let parsed = CurrentParser::new()
            .parse(DivisionId(1001), &payload, &RosterIndex::default())
            .unwrap();
        assert_eq!(parsed.division.aye_voters.len(), 1);
        assert_eq!(parsed.notes.len(), 1);
    }

    #[test]
    fn test_roster_index_ambiguous_names() {
        let index = RosterIndex::from_members(&[
            Member::new(1, "Sam Smith", "Labour"),
            Member::new(2, "Sam Smith", "Conservative"),
            Member::new(3, "Jo Jones", "Labour"),
        ]);
        assert_eq!(index.resolve_name("Sam Smith"), None);
        assert_eq!(index.resolve_name(" jo jones "), Some(MemberId(3)));
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2018-11-21"), "2018-11-21");
        assert_eq!(normalize_date("2019-01-15T19:40:00"), "2019-01-15");
        assert_eq!(normalize_date("2019-01-15T19:40:00.123Z"), "2019-01-15");
        assert_eq!(normalize_date("last Tuesday"), "last Tuesday");
    }
}
