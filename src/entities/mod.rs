// Entity Models
// Canonical shapes every source is normalized into before reconciliation.
//
// - Identifiers are canonicalized once, at the ingestion boundary
// - Members come from the roster, divisions from either source schema
// - Parties are resolved through a configurable registry

pub mod ids;
pub mod party;
pub mod member;
pub mod division;

pub use ids::{DivisionId, MemberId};
pub use party::{PartyBucket, PartyDefinition, PartyMerge, PartyRegistry};
pub use member::Member;
pub use division::{DivisionResult, ProviderFigures, SourceSchema, VoteSet};
