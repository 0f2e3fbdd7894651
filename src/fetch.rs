// 🌐 Sources - retrieval of roster, divisions and annotations
//
// `SourceClient` is the seam between the pure pipeline and the outside
// world. Two implementations:
// - HttpSource       the public endpoints (feature "http")
// - DirectorySource  a local snapshot: roster.json, divisions/{id}.json,
//                    annotations.json or annotations.csv
//
// `gather_snapshot` fans out over every request at once and collects the
// results positionally, so requested order survives any completion order.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::annotations::{parse_annotation_csv, parse_annotation_json, AnnotationSet};
use crate::config::PipelineConfig;
use crate::entities::{DivisionId, SourceSchema};
use crate::error::{PipelineError, Result};
use crate::parser::RawDivision;
use crate::pipeline::Snapshot;
use crate::request::DivisionSelection;

#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch_roster(&self) -> Result<Value>;

    /// None when the source has nothing for this id
    async fn fetch_division(&self, id: DivisionId, schema: SourceSchema) -> Result<Option<Value>>;

    async fn fetch_annotations(&self) -> Result<AnnotationSet>;

    /// Source name for logs
    fn name(&self) -> &str;
}

/// Parse a response body, treating a blank body as "no data"
fn parse_body(what: &str, body: &str) -> Result<Option<Value>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| PipelineError::fetch(what, format!("invalid JSON: {}", e)))
}

// ============================================================================
// HTTP SOURCE
// ============================================================================

#[cfg(feature = "http")]
pub use http::HttpSource;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::config::Endpoints;
    use reqwest::StatusCode;
    use std::time::Duration;
    use tracing::debug;

    const USER_AGENT: &str = concat!("division-votes/", env!("CARGO_PKG_VERSION"));
    const TIMEOUT_SECS: u64 = 30;

    pub struct HttpSource {
        http_client: reqwest::Client,
        endpoints: Endpoints,
    }

    impl HttpSource {
        pub fn new(endpoints: Endpoints) -> Result<Self> {
            let http_client = reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(TIMEOUT_SECS))
                .build()
                .map_err(|e| PipelineError::fetch("http client", e))?;

            Ok(HttpSource {
                http_client,
                endpoints,
            })
        }

        /// GET a URL; Ok(None) on 404
        async fn get_text(&self, what: &str, url: &str) -> Result<Option<String>> {
            debug!(url = %url, "GET {}", what);

            let response = self
                .http_client
                .get(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .send()
                .await
                .map_err(|e| PipelineError::fetch(what, e))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(PipelineError::fetch(what, format!("HTTP {}", status.as_u16())));
            }

            let body = response.text().await.map_err(|e| PipelineError::fetch(what, e))?;
            Ok(Some(body))
        }
    }

    #[async_trait]
    impl SourceClient for HttpSource {
        async fn fetch_roster(&self) -> Result<Value> {
            let body = self
                .get_text("roster", &self.endpoints.roster)
                .await?
                .unwrap_or_default();
            parse_body("roster", &body)?.ok_or_else(|| PipelineError::fetch("roster", "empty response"))
        }

        async fn fetch_division(&self, id: DivisionId, schema: SourceSchema) -> Result<Option<Value>> {
            let what = format!("division {}", id);
            let url = self.endpoints.division_url(schema, id);
            match self.get_text(&what, &url).await? {
                Some(body) => parse_body(&what, &body),
                None => Ok(None),
            }
        }

        async fn fetch_annotations(&self) -> Result<AnnotationSet> {
            let url = &self.endpoints.annotations;
            let body = self
                .get_text("annotations", url)
                .await?
                .ok_or_else(|| PipelineError::fetch("annotations", "HTTP 404"))?;

            if url.ends_with(".csv") {
                return parse_annotation_csv(body.as_bytes());
            }
            let document = parse_body("annotations", &body)?
                .ok_or_else(|| PipelineError::fetch("annotations", "empty response"))?;
            parse_annotation_json(&document)
        }

        fn name(&self) -> &str {
            "http"
        }
    }
}

// ============================================================================
// DIRECTORY SOURCE
// ============================================================================

pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        DirectorySource {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn division_path(&self, id: DivisionId) -> PathBuf {
        self.root.join("divisions").join(format!("{}.json", id))
    }

    /// Ok(None) when the file does not exist
    async fn read_optional(&self, what: &str, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::fetch(what, format!("{}: {}", path.display(), e))),
        }
    }
}

#[async_trait]
impl SourceClient for DirectorySource {
    async fn fetch_roster(&self) -> Result<Value> {
        let path = self.root.join("roster.json");
        let content = self
            .read_optional("roster", &path)
            .await?
            .ok_or_else(|| PipelineError::fetch("roster", format!("{} not found", path.display())))?;
        parse_body("roster", &content)?.ok_or_else(|| PipelineError::fetch("roster", "empty file"))
    }

    async fn fetch_division(&self, id: DivisionId, _schema: SourceSchema) -> Result<Option<Value>> {
        let what = format!("division {}", id);
        match self.read_optional(&what, &self.division_path(id)).await? {
            Some(content) => parse_body(&what, &content),
            None => Ok(None),
        }
    }

    async fn fetch_annotations(&self) -> Result<AnnotationSet> {
        let json_path = self.root.join("annotations.json");
        if let Some(content) = self.read_optional("annotations", &json_path).await? {
            let document = parse_body("annotations", &content)?
                .ok_or_else(|| PipelineError::fetch("annotations", "empty file"))?;
            return parse_annotation_json(&document);
        }

        let csv_path = self.root.join("annotations.csv");
        match self.read_optional("annotations", &csv_path).await? {
            Some(content) => parse_annotation_csv(content.as_bytes()),
            None => Err(PipelineError::fetch(
                "annotations",
                format!("neither annotations.json nor annotations.csv in {}", self.root.display()),
            )),
        }
    }

    fn name(&self) -> &str {
        "directory"
    }
}

// ============================================================================
// SNAPSHOT GATHERING
// ============================================================================

async fn fetch_divisions<C: SourceClient + ?Sized>(
    client: &C,
    ids: &[DivisionId],
    schema: SourceSchema,
) -> Result<Vec<RawDivision>> {
    try_join_all(ids.iter().map(|&id| async move {
        let payload = client.fetch_division(id, schema).await?;
        Ok::<_, PipelineError>(RawDivision::new(id, schema, payload))
    }))
    .await
}

async fn fetch_annotations_if<C: SourceClient + ?Sized>(client: &C, enabled: bool) -> Result<Option<AnnotationSet>> {
    if enabled {
        client.fetch_annotations().await.map(Some)
    } else {
        Ok(None)
    }
}

/// Retrieve everything a run needs; any failure aborts
pub async fn gather_snapshot<C: SourceClient + ?Sized>(
    client: &C,
    selection: &DivisionSelection,
    config: &PipelineConfig,
) -> Result<Snapshot> {
    let schema = config.schema_version;

    let snapshot = match selection {
        DivisionSelection::Explicit(ids) => {
            if ids.is_empty() {
                return Err(PipelineError::InputValidation("no division ids given".to_string()));
            }
            let (roster, divisions, annotations) = tokio::try_join!(
                client.fetch_roster(),
                fetch_divisions(client, ids, schema),
                fetch_annotations_if(client, config.include_annotations),
            )?;
            Snapshot {
                roster,
                divisions,
                annotations,
            }
        }
        DivisionSelection::FromAnnotations => {
            if !config.include_annotations {
                return Err(PipelineError::InputValidation(
                    "division selection from annotations requires annotations to be enabled".to_string(),
                ));
            }
            // The sheet decides which divisions to fetch
            let annotations = client.fetch_annotations().await?;
            let ids = annotations.division_ids();
            if ids.is_empty() {
                return Err(PipelineError::InputValidation(
                    "annotation sheet lists no divisions".to_string(),
                ));
            }
            let (roster, divisions) =
                tokio::try_join!(client.fetch_roster(), fetch_divisions(client, &ids, schema))?;
            Snapshot {
                roster,
                divisions,
                annotations: Some(annotations),
            }
        }
    };

    info!(
        source = client.name(),
        divisions = snapshot.divisions.len(),
        annotations = snapshot.annotations.as_ref().map_or(0, AnnotationSet::len),
        "snapshot gathered"
    );
    Ok(snapshot)
}

// ============================================================================
// TESTS
// ============================================================================
