use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::Assembly;
use crate::error::SegwayError;

pub const PORTAL_URL: &str = "https://www.encodeproject.org/";

#[derive(Debug, Deserialize)]
struct KeypairFile {
    submit: Option<SubmitKeypair>,
}

#[derive(Debug, Deserialize)]
struct SubmitKeypair {
    key: Option<String>,
    secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypair {
    pub key: String,
    pub secret: String,
}

impl Keypair {
    pub fn load(path: &Path) -> Result<Self, SegwayError> {
        let path = expand_home(path)?;
        let content =
            fs::read_to_string(&path).map_err(|_| SegwayError::KeypairRead(path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SegwayError> {
        let file: KeypairFile = serde_json::from_str(content)
            .map_err(|err| SegwayError::InvalidKeypair(err.to_string()))?;
        let submit = file
            .submit
            .ok_or_else(|| SegwayError::InvalidKeypair("missing `submit`".to_string()))?;
        match (submit.key, submit.secret) {
            (Some(key), Some(secret)) => Ok(Self { key, secret }),
            (None, _) => Err(SegwayError::InvalidKeypair(
                "missing `submit.key`".to_string(),
            )),
            (_, None) => Err(SegwayError::InvalidKeypair(
                "missing `submit.secret`".to_string(),
            )),
        }
    }
}

fn expand_home(path: &Path) -> Result<PathBuf, SegwayError> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| SegwayError::Filesystem("unable to resolve home directory".to_string()))?;
    Ok(home.join(rest))
}

/// Segway tuning knobs. Unset values are left out so the workflow defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_segway_cpus: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minibatch_fraction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_train_rounds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segtransition_weight_scale: Option<f64>,
}

impl PipelineParams {
    pub fn to_properties(&self) -> Result<Map<String, Value>, SegwayError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(SegwayError::MalformedResponse(format!(
                "pipeline parameters serialized to {other}"
            ))),
            Err(err) => Err(SegwayError::MalformedResponse(err.to_string())),
        }
    }
}

/// Portal ids of the chrom sizes and annotation files matching an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceFiles {
    pub chrom_sizes: &'static str,
    pub annotation_gtf: &'static str,
}

impl ReferenceFiles {
    pub fn for_assembly(assembly: Assembly) -> Self {
        match assembly {
            Assembly::Grch38 => Self {
                chrom_sizes: "files/GRCh38_EBV.chrom.sizes/",
                annotation_gtf: "files/gencode.v29.primary_assembly.annotation_UCSC_names/",
            },
            Assembly::Mm10 => Self {
                chrom_sizes: "files/mm10_no_alt.chrom.sizes/",
                annotation_gtf: "files/gencode.vM21.primary_assembly.annotation_UCSC_names/",
            },
        }
    }
}
