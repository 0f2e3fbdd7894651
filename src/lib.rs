// Division Votes - Core Library
// Reconciles division payloads against the member roster; used by the CLI and tests

pub mod error;
pub mod entities;
pub mod config;
pub mod request;
pub mod roster;         // Roster Normalizer
pub mod parser;         // Division Extractor (legacy + current schemas)
pub mod reconciliation; // Reconciliation Engine
pub mod tally;          // Party Tally Aggregator
pub mod annotations;    // Annotation Joiner
pub mod document;       // Document Assembler
pub mod data_quality;
pub mod pipeline;
pub mod fetch;

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use entities::{
    DivisionId, MemberId,
    Member, DivisionResult, ProviderFigures, SourceSchema, VoteSet,
    PartyDefinition, PartyMerge, PartyRegistry, PartyBucket,
};
pub use config::{PipelineConfig, Endpoints};
pub use request::{DivisionSelection, parse_division_ids};
pub use roster::normalize_roster;
pub use parser::{
    DivisionParser, RawDivision, ParsedDivision, Extraction, RosterIndex,
    get_parser, extract, LegacyParser, CurrentParser,
};
pub use reconciliation::{
    ReconciliationEngine, ReconciliationReport, VoteOutcome, VoteRecord, Contradiction,
};
pub use tally::{TallyAggregator, DivisionTally, DivisionTotals, PartyCount};
pub use annotations::{
    Annotation, AnnotationFields, AnnotationSet, AnnotationJoiner, JoinReport,
    parse_annotation_json, parse_annotation_csv,
};
pub use document::{
    Document, DivisionSummary, DivisionDetail, MemberWithVotes,
    DivisionSlot, DocumentAssembler, write_atomic,
};
pub use data_quality::{QualityReport, QualityIssue, Severity};
pub use pipeline::{run, Snapshot, RunOutput};
pub use fetch::{SourceClient, DirectorySource, gather_snapshot};
#[cfg(feature = "http")]
pub use fetch::HttpSource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
