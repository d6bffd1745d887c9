use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checks::Finding;
use crate::domain::Doi;
use crate::error::DatastoreError;

const HANDLE_API_BASE: &str = "https://doi.org/api/handles";
/// Handle API response code for a resolved DOI.
pub const RESOLVED: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoiField {
    Publication,
    Dataset,
}

impl DoiField {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "publication_doi" => Some(DoiField::Publication),
            "dataset_doi" => Some(DoiField::Dataset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadmeDoi {
    pub field: DoiField,
    pub line: usize,
    pub doi: Doi,
}

/// Collects the DOIs of a README's `publication_doi:` / `dataset_doi:` lines.
/// Values of `none` are skipped; values that are not DOIs become findings.
pub fn parse_readme(content: &str) -> (Vec<ReadmeDoi>, Vec<Finding>) {
    let mut dois = Vec::new();
    let mut findings = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some(field) = DoiField::from_key(key.trim()) else {
            continue;
        };
        let value = value.trim().trim_matches(|ch| ch == '"' || ch == '\'');
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            continue;
        }
        match value.parse::<Doi>() {
            Ok(doi) => dois.push(ReadmeDoi {
                field,
                line: line_number,
                doi,
            }),
            Err(err) => findings.push(Finding::error(Some(line_number), err.to_string())),
        }
    }
    (dois, findings)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DoiResponse {
    #[serde(rename = "responseCode")]
    pub response_code: i64,
    #[serde(default)]
    pub handle: Option<String>,
}

impl DoiResponse {
    pub fn resolved(&self) -> bool {
        self.response_code == RESOLVED
    }
}

pub trait DoiClient: Send + Sync {
    fn lookup(&self, doi: &Doi) -> Result<DoiResponse, DatastoreError>;
}

#[derive(Debug, Clone)]
pub struct DoiHttpClient {
    client: Client,
    base_url: String,
}

impl DoiHttpClient {
    pub fn new() -> Result<Self, DatastoreError> {
        Self::with_base_url(HANDLE_API_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, DatastoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!("ds-lint/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| DatastoreError::DoiHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl DoiClient for DoiHttpClient {
    fn lookup(&self, doi: &Doi) -> Result<DoiResponse, DatastoreError> {
        let url = format!("{}/{}", self.base_url, doi.as_str());
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| DatastoreError::DoiHttp(err.to_string()))?;
        // unknown handles come back as 404 with a JSON body
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let message = response
                .text()
                .unwrap_or_else(|_| "DOI request failed".to_string());
            return Err(DatastoreError::DoiStatus {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .map_err(|err| DatastoreError::DoiHttp(err.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoiCheck {
    pub field: DoiField,
    pub doi: String,
    pub resolved: bool,
    pub response_code: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadmeCheck {
    pub checks: Vec<DoiCheck>,
    pub findings: Vec<Finding>,
}

impl ReadmeCheck {
    pub fn passed(&self) -> bool {
        self.findings.is_empty() && self.checks.iter().all(|check| check.resolved)
    }
}

/// Looks up every DOI a README declares. Lookups that fail are recorded, not raised.
pub fn check_readme<C: DoiClient + ?Sized>(
    path: &Path,
    client: &C,
) -> Result<ReadmeCheck, DatastoreError> {
    let content = fs::read_to_string(path)
        .map_err(|err| DatastoreError::Filesystem(format!("read {}: {err}", path.display())))?;
    let (dois, mut findings) = parse_readme(&content);
    let mut checks = Vec::with_capacity(dois.len());
    for entry in dois {
        let check = match client.lookup(&entry.doi) {
            Ok(response) => {
                if response.resolved() {
                    info!(readme = %path.display(), doi = %entry.doi, "DOI resolved");
                } else {
                    warn!(readme = %path.display(), doi = %entry.doi, code = response.response_code, "invalid DOI");
                    findings.push(Finding::warning(
                        Some(entry.line),
                        format!("DOI {} did not resolve (code {})", entry.doi, response.response_code),
                    ));
                }
                DoiCheck {
                    field: entry.field,
                    doi: entry.doi.to_string(),
                    resolved: response.resolved(),
                    response_code: Some(response.response_code),
                    error: None,
                }
            }
            Err(err) => {
                warn!(readme = %path.display(), doi = %entry.doi, error = %err, "DOI lookup failed");
                findings.push(Finding::warning(
                    Some(entry.line),
                    format!("DOI {} lookup failed: {err}", entry.doi),
                ));
                DoiCheck {
                    field: entry.field,
                    doi: entry.doi.to_string(),
                    resolved: false,
                    response_code: None,
                    error: Some(err.to_string()),
                }
            }
        };
        checks.push(check);
    }
    Ok(ReadmeCheck { checks, findings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readme_fields() {
        let content = "\
identifier: Wm82.gnm2.ann1.FCtY
publication_doi: 10.1038/nature08670
dataset_doi: None
publication_doi: \"https://doi.org/10.1111/tpj.12345\"
dataset_doi: not-a-doi
";
        let (dois, findings) = parse_readme(content);
        assert_eq!(dois.len(), 2);
        assert_eq!(dois[0].field, DoiField::Publication);
        assert_eq!(dois[0].doi.as_str(), "10.1038/nature08670");
        assert_eq!(dois[1].doi.as_str(), "10.1111/tpj.12345");
        assert_eq!(dois[1].line, 4);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, Some(5));
    }

    #[test]
    fn handle_response_shape() {
        let response: DoiResponse =
            serde_json::from_str(r#"{"responseCode":1,"handle":"10.1038/nature08670","values":[]}"#)
                .unwrap();
        assert!(response.resolved());
        let missing: DoiResponse = serde_json::from_str(r#"{"responseCode":100}"#).unwrap();
        assert!(!missing.resolved());
    }
}
