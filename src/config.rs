// ⚙️ Pipeline Configuration - behaviour as data
//
// One pipeline covers every historical variant (legacy votes only, legacy
// with tellers, current API, annotation-driven). The differences live here.
// Every field has a default, so "{}" is a complete config file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::entities::party::{default_merges, default_parties};
use crate::entities::{DivisionId, PartyDefinition, PartyMerge, PartyRegistry, SourceSchema};
use crate::error::{PipelineError, Result};

pub const ROSTER_URL: &str =
    "http://data.parliament.uk/membersdataplatform/services/mnis/members/query/House=Commons%7CIsEligible=true/";
pub const CURRENT_DIVISION_URL: &str = "https://commonsvotes-services.digiminster.com/data/division/{id}.json";
pub const LEGACY_DIVISION_URL: &str =
    "http://lda.data.parliament.uk/commonsdivisions/id/{id}.json?_properties=teller.memberPrinted";
pub const ANNOTATIONS_URL: &str =
    "https://interactive.guim.co.uk/docsdata-test/1TvMfmTvlemRxZ-OST9e7CyeSIul7ATmAew9FTVwYczU.json";

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoints {
    pub roster: String,

    /// URL templates, "{id}" is replaced by the division id
    pub current_division: String,
    pub legacy_division: String,

    pub annotations: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            roster: ROSTER_URL.to_string(),
            current_division: CURRENT_DIVISION_URL.to_string(),
            legacy_division: LEGACY_DIVISION_URL.to_string(),
            annotations: ANNOTATIONS_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn division_url(&self, schema: SourceSchema, id: DivisionId) -> String {
        let template = match schema {
            SourceSchema::Legacy => &self.legacy_division,
            SourceSchema::Current => &self.current_division,
        };
        template.replace("{id}", &id.to_string())
    }
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub schema_version: SourceSchema,
    pub include_annotations: bool,
    pub include_tellers: bool,
    pub include_party_breakdown: bool,

    /// Abort on a negative abstain count instead of reporting it
    pub strict_integrity: bool,

    pub parties: Vec<PartyDefinition>,
    pub party_merges: Vec<PartyMerge>,

    pub endpoints: Endpoints,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            schema_version: SourceSchema::Current,
            include_annotations: true,
            include_tellers: true,
            include_party_breakdown: true,
            strict_integrity: false,
            parties: default_parties(),
            party_merges: default_merges(),
            endpoints: Endpoints::default(),
        }
    }
}

impl PipelineConfig {
    /// Linked-data votes only: no tellers, no breakdown, no annotations
    pub fn legacy_votes() -> Self {
        PipelineConfig {
            schema_version: SourceSchema::Legacy,
            include_annotations: false,
            include_tellers: false,
            include_party_breakdown: false,
            ..Self::default()
        }
    }

    /// Linked-data votes with teller attribution
    pub fn legacy_with_tellers() -> Self {
        PipelineConfig {
            include_tellers: true,
            ..Self::legacy_votes()
        }
    }

    /// Load config from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(content)
            .map_err(|e| PipelineError::Config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, template) in [
            ("endpoints.currentDivision", &self.endpoints.current_division),
            ("endpoints.legacyDivision", &self.endpoints.legacy_division),
        ] {
            if !template.contains("{id}") {
                return Err(PipelineError::Config(format!("{} must contain {{id}}", name)));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for party in &self.parties {
            if !seen.insert(party.short_name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "party short name '{}' is listed twice",
                    party.short_name
                )));
            }
        }

        Ok(())
    }

    pub fn party_registry(&self) -> PartyRegistry {
        PartyRegistry::from_parts(self.parties.clone(), self.party_merges.clone())
    }
}

// ============================================================================
// TESTS
// ============================================================================
