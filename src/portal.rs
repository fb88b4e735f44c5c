use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::{Keypair, PORTAL_URL};
use crate::domain::{DonorAccession, ReferenceEpigenomeId};
use crate::error::SegwayError;

/// A portal link, either a bare `@id` or an embedded object carrying one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Link {
    Id(String),
    Embedded {
        #[serde(rename = "@id")]
        id: String,
    },
}

impl Link {
    pub fn id(&self) -> &str {
        match self {
            Link::Id(id) => id,
            Link::Embedded { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloudMetadata {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortalFile {
    #[serde(rename = "@id")]
    pub id: String,
    pub file_format: String,
    #[serde(default)]
    pub assembly: Option<String>,
    pub output_type: String,
    pub status: String,
    #[serde(default)]
    pub biological_replicates: Vec<u32>,
    #[serde(default)]
    pub preferred_default: Option<bool>,
    #[serde(default)]
    pub cloud_metadata: Option<CloudMetadata>,
    #[serde(default)]
    pub quality_metrics: Vec<Link>,
}

impl PortalFile {
    pub fn is_preferred_default(&self) -> bool {
        self.preferred_default == Some(true)
    }

    pub fn cloud_url(&self) -> Result<&str, SegwayError> {
        self.cloud_metadata
            .as_ref()
            .map(|meta| meta.url.as_str())
            .ok_or_else(|| {
                SegwayError::MalformedResponse(format!(
                    "could not identify cloud metadata from portal file {}",
                    self.id
                ))
            })
    }

    /// Biological replicates as a sorted set, so `[3, 1]` and `[1, 3]` compare equal.
    pub fn replicate_set(&self) -> Vec<u32> {
        let mut reps = self.biological_replicates.clone();
        reps.sort_unstable();
        reps.dedup();
        reps
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Target {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Replicate {
    pub biological_replicate_number: u32,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Analysis {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub files: Vec<Link>,
}

impl Analysis {
    pub fn contains(&self, file_id: &str) -> bool {
        self.files.iter().any(|link| link.id() == file_id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Experiment {
    #[serde(rename = "@id")]
    pub id: String,
    pub assay_title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(default)]
    pub replicates: Vec<Replicate>,
    #[serde(default)]
    pub files: Vec<PortalFile>,
    #[serde(default)]
    pub original_files: Vec<Link>,
    #[serde(default)]
    pub analyses: Vec<Analysis>,
    #[serde(default)]
    pub default_analysis: Option<Link>,
}

impl Experiment {
    pub fn target_label(&self) -> Result<&str, SegwayError> {
        self.target
            .as_ref()
            .map(|target| target.label.as_str())
            .ok_or_else(|| {
                SegwayError::MalformedResponse(format!("ChIP dataset {} has no target", self.id))
            })
    }

    /// The analysis named by `default_analysis`, if the dataset declares one.
    pub fn default_analysis(&self) -> Result<Option<&Analysis>, SegwayError> {
        let Some(default) = self.default_analysis.as_ref() else {
            return Ok(None);
        };
        self.analyses
            .iter()
            .find(|analysis| analysis.id == default.id())
            .map(Some)
            .ok_or_else(|| {
                SegwayError::MalformedResponse(format!(
                    "dataset {} names default analysis {} but does not embed it",
                    self.id,
                    default.id()
                ))
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceEpigenome {
    #[serde(default)]
    pub related_datasets: Vec<Experiment>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse<T> {
    #[serde(rename = "@graph")]
    graph: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct Biosample {
    #[serde(rename = "@id")]
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FileSummary {
    #[serde(rename = "@id")]
    id: String,
    #[serde(default)]
    assembly: Option<String>,
    #[serde(default)]
    cloud_metadata: Option<CloudMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct FlagstatsQc {
    mapped: u64,
}

fn decode<T: DeserializeOwned>(url_or_path: &str, map: Map<String, Value>) -> Result<T, SegwayError> {
    serde_json::from_value(Value::Object(map))
        .map_err(|err| SegwayError::MalformedResponse(format!("{url_or_path}: {err}")))
}

pub trait PortalClient {
    /// GET a JSON object. Relative paths resolve against the portal base url.
    fn get_json(
        &self,
        url_or_path: &str,
        query: &[(&str, &str)],
    ) -> Result<Map<String, Value>, SegwayError>;

    fn get<T: DeserializeOwned>(
        &self,
        url_or_path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SegwayError> {
        let map = self.get_json(url_or_path, query)?;
        decode(url_or_path, map)
    }

    /// Runs a `/search/` query. The portal answers an empty search with a 404.
    fn search<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<Vec<T>, SegwayError> {
        let mut query = params.to_vec();
        query.push(("limit", "all"));
        match self.get::<SearchResponse<T>>("search/", &query) {
            Ok(response) => Ok(response.graph),
            Err(SegwayError::PortalStatus { status: 404, .. }) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Fetches a reference epigenome and embeds the original files of each
    /// related dataset with one batched search per dataset.
    fn reference_epigenome(
        &self,
        id: &ReferenceEpigenomeId,
    ) -> Result<Vec<Experiment>, SegwayError> {
        let epigenome: ReferenceEpigenome = self.get(&id.path(), &[])?;
        let mut datasets = epigenome.related_datasets;
        for dataset in datasets.iter_mut() {
            if dataset.original_files.is_empty() {
                continue;
            }
            let mut params = vec![("type", "File")];
            params.extend(dataset.original_files.iter().map(|link| ("@id", link.id())));
            params.push(("frame", "object"));
            let files: Vec<PortalFile> = self.search(&params)?;
            tracing::debug!(dataset = %dataset.id, files = files.len(), "embedded original files");
            dataset.files = files;
        }
        Ok(datasets)
    }

    /// Experiments performed on biosamples of one donor with the given term name.
    fn experiments_for_donor(
        &self,
        donor: &DonorAccession,
        biosample_term_name: &str,
    ) -> Result<Vec<Experiment>, SegwayError> {
        let biosamples: Vec<Biosample> = self.search(&[
            ("type", "Biosample"),
            ("biosample_ontology.term_name", biosample_term_name),
            ("donor.accession", donor.as_str()),
        ])?;
        if biosamples.is_empty() {
            return Err(SegwayError::MissingBiosamples {
                donor: donor.to_string(),
                term_name: biosample_term_name.to_string(),
            });
        }
        let mut params = vec![("type", "Experiment"), ("frame", "embedded")];
        params.extend(
            biosamples
                .iter()
                .map(|biosample| ("replicates.library.biosample.@id", biosample.id.as_str())),
        );
        let experiments: Vec<Experiment> = self.search(&params)?;
        if experiments.is_empty() {
            return Err(SegwayError::MissingExperiments);
        }
        Ok(experiments)
    }

    fn assembly_of(&self, file: &str) -> Result<String, SegwayError> {
        let summary: FileSummary = self.get(file, &[])?;
        summary.assembly.ok_or_else(|| {
            SegwayError::MalformedResponse(format!("file {} does not have an assembly", summary.id))
        })
    }

    fn cloud_url_of(&self, file: &str) -> Result<String, SegwayError> {
        let summary: FileSummary = self.get(file, &[])?;
        summary.cloud_metadata.map(|meta| meta.url).ok_or_else(|| {
            SegwayError::MalformedResponse(format!(
                "could not identify cloud metadata from portal file {}",
                summary.id
            ))
        })
    }

    fn mapped_read_count(&self, quality_metric: &str) -> Result<u64, SegwayError> {
        let qc: FlagstatsQc = self.get(quality_metric, &[])?;
        Ok(qc.mapped)
    }
}

/// Resolves portal paths like `foo/bar` to `<base>/foo/bar`.
#[derive(Debug, Clone)]
pub struct UrlJoiner {
    base: Url,
}

impl UrlJoiner {
    pub fn new(base_url: &str) -> Result<Self, SegwayError> {
        if !base_url.ends_with('/') {
            return Err(SegwayError::InvalidBaseUrl(base_url.to_string()));
        }
        let base = Url::parse(base_url)
            .map_err(|err| SegwayError::InvalidBaseUrl(format!("{base_url}: {err}")))?;
        Ok(Self { base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    pub fn resolve(&self, url_or_path: &str) -> Result<Url, SegwayError> {
        if url_or_path.starts_with(self.base.as_str()) {
            return Url::parse(url_or_path)
                .map_err(|err| SegwayError::PortalHttp(format!("{url_or_path}: {err}")));
        }
        self.base
            .join(url_or_path)
            .map_err(|err| SegwayError::PortalHttp(format!("{url_or_path}: {err}")))
    }
}

#[derive(Clone)]
pub struct PortalHttpClient {
    client: Client,
    joiner: UrlJoiner,
    keypair: Option<Keypair>,
}

impl PortalHttpClient {
    pub fn new(keypair: Option<Keypair>) -> Result<Self, SegwayError> {
        Self::with_base_url(PORTAL_URL, keypair)
    }

    pub fn with_base_url(base_url: &str, keypair: Option<Keypair>) -> Result<Self, SegwayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("segway-utils/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SegwayError::PortalHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| SegwayError::PortalHttp(err.to_string()))?;
        Ok(Self {
            client,
            joiner: UrlJoiner::new(base_url)?,
            keypair,
        })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SegwayError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "portal request failed".to_string());
        Err(SegwayError::PortalStatus { status, message })
    }
}

impl PortalClient for PortalHttpClient {
    fn get_json(
        &self,
        url_or_path: &str,
        query: &[(&str, &str)],
    ) -> Result<Map<String, Value>, SegwayError> {
        let url = self.joiner.resolve(url_or_path)?;
        tracing::debug!(%url, params = query.len(), "portal GET");
        let mut request = self.client.get(url.clone()).query(query);
        if let Some(keypair) = &self.keypair {
            request = request.basic_auth(&keypair.key, Some(&keypair.secret));
        }
        let response = request
            .send()
            .map_err(|err| SegwayError::PortalHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let value: Value = response
            .json()
            .map_err(|err| SegwayError::PortalHttp(err.to_string()))?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(SegwayError::NonObjectResponse(url.to_string())),
        }
    }
}
