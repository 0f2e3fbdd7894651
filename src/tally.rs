// 📊 Party Tally Aggregator - per-party counts + division totals
//
// For each tracked party and each side:
//   count = voters of that side in the party + tellers of that side in the party
//
// Rows are ordered by count descending; ties go to the lexicographically
// greater name first. Every tracked party appears on both sides, even at 0.
//
// Totals:
//   ayesCount    = raw AyeCount + |ayeTellers|
//   noesCount    = raw NoCount + |noTellers|
//   abstainCount = members - |ayeVoters| - |noVoters| - |ayeTellers| - |noTellers|
//
// A negative abstain count means the division lists more participants than
// the roster has members. It is reported, never clamped.

use serde::Serialize;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;

use crate::entities::{DivisionResult, Member, MemberId, PartyRegistry};

// ============================================================================
// TALLY TYPES
// ============================================================================

/// One tally row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyCount {
    pub party: String,
    pub votes: u32,
}

impl PartyCount {
    pub fn new(party: &str, votes: u32) -> Self {
        PartyCount {
            party: party.to_string(),
            votes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisionTotals {
    pub ayes_count: u32,
    pub noes_count: u32,

    /// Signed so integrity faults stay visible
    pub abstain_count: i64,
}

impl DivisionTotals {
    pub fn is_consistent(&self) -> bool {
        self.abstain_count >= 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DivisionTally {
    pub totals: DivisionTotals,
    pub ayes_by_party: Vec<PartyCount>,
    pub noes_by_party: Vec<PartyCount>,
}

/// Count descending, then name descending
pub fn compare_rows(a: &PartyCount, b: &PartyCount) -> Ordering {
    b.votes.cmp(&a.votes).then_with(|| b.party.cmp(&a.party))
}

pub fn sort_tally(rows: &mut [PartyCount]) {
    rows.sort_by(compare_rows);
}

/// Raw source count plus tellers, clamped at u32::MAX
fn saturating_total(raw: u32, tellers: usize) -> u32 {
    raw.saturating_add(u32::try_from(tellers).unwrap_or(u32::MAX))
}

// ============================================================================
// TALLY AGGREGATOR
// ============================================================================

pub struct TallyAggregator<'a> {
    registry: &'a PartyRegistry,

    /// Canonical party of every roster member
    party_of: HashMap<MemberId, &'a str>,

    total_members: usize,

    /// Count tellers on top of voters (default: true)
    include_tellers: bool,
}

impl<'a> TallyAggregator<'a> {
    pub fn new(registry: &'a PartyRegistry, members: &'a [Member]) -> Self {
        TallyAggregator {
            registry,
            party_of: members.iter().map(|m| (m.id, m.party.as_str())).collect(),
            total_members: members.len(),
            include_tellers: true,
        }
    }

    pub fn with_tellers(mut self, include_tellers: bool) -> Self {
        self.include_tellers = include_tellers;
        self
    }

    /// Roster party first; the source's own label for ids off the roster
    fn party_for<'d>(&'d self, id: MemberId, division: &'d DivisionResult) -> Option<Cow<'d, str>> {
        if let Some(party) = self.party_of.get(&id) {
            return Some(Cow::Borrowed(*party));
        }
        division
            .source_parties
            .get(&id)
            .map(|raw| Cow::Owned(self.registry.canonical_name(raw)))
    }

    fn tellers<'d>(&self, tellers: &'d [MemberId]) -> &'d [MemberId] {
        if self.include_tellers {
            tellers
        } else {
            &[]
        }
    }

    fn count_side<'d>(
        &self,
        division: &DivisionResult,
        participants: impl Iterator<Item = &'d MemberId>,
    ) -> Vec<PartyCount> {
        let mut counts = vec![0u32; self.registry.tracked_count()];

        for id in participants {
            let Some(party) = self.party_for(*id, division) else {
                continue;
            };
            // Other bucket: not tallied
            if let Some(idx) = self.registry.position(&party) {
                counts[idx] += 1;
            }
        }

        let mut rows: Vec<PartyCount> = self
            .registry
            .tracked()
            .iter()
            .zip(counts)
            .map(|(party, votes)| PartyCount::new(&party.short_name, votes))
            .collect();
        sort_tally(&mut rows);
        rows
    }

    pub fn ayes_by_party(&self, division: &DivisionResult) -> Vec<PartyCount> {
        let tellers = self.tellers(&division.aye_tellers);
        self.count_side(division, division.aye_voters.iter().chain(tellers))
    }

    pub fn noes_by_party(&self, division: &DivisionResult) -> Vec<PartyCount> {
        let tellers = self.tellers(&division.no_tellers);
        self.count_side(division, division.no_voters.iter().chain(tellers))
    }

    pub fn totals(&self, division: &DivisionResult) -> DivisionTotals {
        let aye_tellers = self.tellers(&division.aye_tellers).len();
        let no_tellers = self.tellers(&division.no_tellers).len();

        let participants = division.aye_voters.len() + division.no_voters.len() + aye_tellers + no_tellers;
        let abstain_count = self.total_members as i64 - participants as i64;

        if abstain_count < 0 {
            warn!(
                division = %division.id,
                members = self.total_members,
                participants,
                "abstain count is negative"
            );
        }

        DivisionTotals {
            ayes_count: saturating_total(division.aye_count, aye_tellers),
            noes_count: saturating_total(division.no_count, no_tellers),
            abstain_count,
        }
    }

    pub fn tally(&self, division: &DivisionResult) -> DivisionTally {
        DivisionTally {
            totals: self.totals(division),
            ayes_by_party: self.ayes_by_party(division),
            noes_by_party: self.noes_by_party(division),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DivisionId, PartyDefinition, SourceSchema};

    fn votes_for(rows: &[PartyCount], party: &str) -> u32 {
        rows.iter()
            .find(|r| r.party == party)
            .map(|r| r.votes)
            .unwrap_or_else(|| panic!("{} missing from tally", party))
    }

    fn roster() -> Vec<Member> {
        vec![
            Member::new(1, "Alice", "Labour"),
            Member::new(2, "Bob", "Conservative"),
            // Already canonical: the roster normalizer merged "Labour (Co-op)"
            Member::new(3, "Carol", "Labour"),
            Member::new(4, "Dan", "Alliance"),
        ]
    }

    #[test]
    fn test_labour_tally_counts_only_aye_voters() {
        let registry = PartyRegistry::new();
        let members = roster();
        let aggregator = TallyAggregator::new(&registry, &members);

        let mut division = DivisionResult::new(DivisionId(1), 1, "A", SourceSchema::Current);
        division.aye_voters.insert(MemberId(1));
        division.no_voters.insert(MemberId(2));

        let ayes = aggregator.ayes_by_party(&division);
        assert_eq!(votes_for(&ayes, "Labour"), 1);
        assert_eq!(votes_for(&aggregator.noes_by_party(&division), "Conservative"), 1);
    }

    #[test]
    fn test_every_tracked_party_present_on_both_sides() {
        let registry = PartyRegistry::new();
        let members = roster();
        let aggregator = TallyAggregator::new(&registry, &members);
        let division = DivisionResult::new(DivisionId(1), 1, "Empty", SourceSchema::Current);

        let tally = aggregator.tally(&division);
        assert_eq!(tally.ayes_by_party.len(), registry.tracked_count());
        assert_eq!(tally.noes_by_party.len(), registry.tracked_count());
        assert!(tally.ayes_by_party.iter().all(|r| r.votes == 0));
    }

    #[test]
    fn test_tie_break_reverse_alphabetical() {
        let mut rows = vec![
            PartyCount::new("Green Party", 5),
            PartyCount::new("Conservative", 9),
            PartyCount::new("Labour", 5),
            PartyCount::new("Independent", 0),
            PartyCount::new("Sinn Féin", 0),
        ];
        sort_tally(&mut rows);

        let order: Vec<&str> = rows.iter().map(|r| r.party.as_str()).collect();
        assert_eq!(
            order,
            vec!["Conservative", "Labour", "Green Party", "Sinn Féin", "Independent"]
        );
    }

    #[test]
    fn test_tellers_counted_with_voters() {
        let registry = PartyRegistry::new();
        let members = roster();
        let aggregator = TallyAggregator::new(&registry, &members);

        let mut division = DivisionResult::new(DivisionId(1), 1, "B", SourceSchema::Current);
        division.aye_count = 10;
        division.no_count = 4;
        division.aye_voters.insert(MemberId(1));
        division.aye_tellers = vec![MemberId(3), MemberId(2)];
        division.no_tellers = vec![MemberId(4)];
        division.source_parties.insert(MemberId(9), "Conservative".to_string());
        division.no_tellers.push(MemberId(9));

        let tally = aggregator.tally(&division);
        assert_eq!(tally.totals.ayes_count, 12);
        assert_eq!(tally.totals.noes_count, 6);
        assert_eq!(votes_for(&tally.ayes_by_party, "Labour"), 2);
        assert_eq!(votes_for(&tally.ayes_by_party, "Conservative"), 1);
        assert_eq!(tally.ayes_by_party[0].party, "Labour");
        // Dan is Alliance (untracked); the off-roster teller counts by source party
        assert_eq!(votes_for(&tally.noes_by_party, "Conservative"), 1);
        assert_eq!(tally.noes_by_party.iter().map(|r| r.votes).sum::<u32>(), 1);
        assert_eq!(tally.totals.abstain_count, -1);

        let without = TallyAggregator::new(&registry, &members).with_tellers(false);
        let tally = without.tally(&division);
        assert_eq!(tally.totals.ayes_count, 10);
        assert_eq!(tally.totals.noes_count, 4);
        assert_eq!(votes_for(&tally.ayes_by_party, "Labour"), 1);
        assert_eq!(votes_for(&tally.noes_by_party, "Conservative"), 0);
        assert_eq!(tally.totals.abstain_count, 3);
    }

    #[test]
    fn test_teller_inclusive_totals_saturate() {
        let registry = PartyRegistry::new();
        let members = roster();
        let aggregator = TallyAggregator::new(&registry, &members);

        let mut division = DivisionResult::new(DivisionId(1), 1, "G", SourceSchema::Current);
        division.aye_count = u32::MAX;
        division.no_count = u32::MAX - 1;
        division.aye_tellers = vec![MemberId(1)];
        division.no_tellers = vec![MemberId(2), MemberId(3)];

        let totals = aggregator.totals(&division);
        assert_eq!(totals.ayes_count, u32::MAX);
        assert_eq!(totals.noes_count, u32::MAX);
    }

    #[test]
    fn test_other_bucket_not_tallied() {
        let registry = PartyRegistry::new();
        let members = roster();
        let aggregator = TallyAggregator::new(&registry, &members);

        let mut division = DivisionResult::new(DivisionId(1), 1, "C", SourceSchema::Current);
        division.aye_voters.insert(MemberId(4));

        let ayes = aggregator.ayes_by_party(&division);
        assert_eq!(ayes.iter().map(|r| r.votes).sum::<u32>(), 0);
        assert!(ayes.iter().all(|r| r.party != "Alliance"));
    }

    #[test]
    fn test_source_party_fallback_for_unknown_member() {
        let registry = PartyRegistry::new();
        let members = roster();
        let aggregator = TallyAggregator::new(&registry, &members);

        let mut division = DivisionResult::new(DivisionId(1), 1, "D", SourceSchema::Current);
        division.aye_voters.insert(MemberId(99));
        division
            .source_parties
            .insert(MemberId(99), "Labour (Co-op)".to_string());

        assert_eq!(votes_for(&aggregator.ayes_by_party(&division), "Labour"), 1);
    }

    #[test]
    fn test_abstain_count_and_negative_fault() {
        let registry = PartyRegistry::new();
        let members = roster();
        let aggregator = TallyAggregator::new(&registry, &members);

        let mut division = DivisionResult::new(DivisionId(1), 1, "E", SourceSchema::Current);
        division.aye_voters.insert(MemberId(1));
        division.no_voters.insert(MemberId(2));
        assert_eq!(aggregator.totals(&division).abstain_count, 2);
        assert!(aggregator.totals(&division).is_consistent());

        for id in 10..15 {
            division.aye_voters.insert(MemberId(id));
        }
        let totals = aggregator.totals(&division);
        assert_eq!(totals.abstain_count, -3);
        assert!(!totals.is_consistent());
    }

    #[test]
    fn test_short_names_emitted() {
        let registry = PartyRegistry::from_parts(
            vec![
                PartyDefinition::new("Labour", "Lab"),
                PartyDefinition::new("Conservative", "Con"),
            ],
            vec![],
        );
        let members = roster();
        let aggregator = TallyAggregator::new(&registry, &members);

        let mut division = DivisionResult::new(DivisionId(1), 1, "F", SourceSchema::Current);
        division.no_voters.insert(MemberId(2));

        let noes = aggregator.noes_by_party(&division);
        assert_eq!(noes, vec![PartyCount::new("Con", 1), PartyCount::new("Lab", 0)]);
    }
}
