use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SegwayError {
    #[error("invalid assay title: {0}")]
    InvalidAssay(String),

    #[error("invalid portal accession: {0}")]
    InvalidAccession(String),

    #[error("base url must end with a `/`: {0}")]
    InvalidBaseUrl(String),

    #[error("failed to read keypair file at {0}")]
    KeypairRead(PathBuf),

    #[error(
        "invalid keypairs file, must take the form of {{\"submit\": {{\"key\": ... , \"secret\": ...}}}}: {0}"
    )]
    InvalidKeypair(String),

    #[error("portal request failed: {0}")]
    PortalHttp(String),

    #[error("portal returned status {status}: {message}")]
    PortalStatus { status: u16, message: String },

    #[error("got a JSON array or scalar from url {0}, expected object")]
    NonObjectResponse(String),

    #[error("malformed portal response: {0}")]
    MalformedResponse(String),

    #[error("could not find biosamples with term name {term_name} and donor {donor}")]
    MissingBiosamples { donor: String, term_name: String },

    #[error("could not find any experiments")]
    MissingExperiments,

    #[error("found more than one file for {key}: found {found} but already found {existing}")]
    AmbiguousSelection {
        key: String,
        found: String,
        existing: String,
    },

    #[error("could not find all of the specified ChIP targets, missing {}", .0.join(", "))]
    MissingTargets(Vec<String>),

    #[error("could not find one or more of the required ChIP targets, missing {}", .0.join(", "))]
    MissingCoreTargets(Vec<String>),

    #[error("could not find any files")]
    NoFiles,

    #[error("{0}")]
    ArgumentMismatch(String),

    #[error("no color defined for label {0}")]
    UnknownLabel(String),

    #[error("no mnemonic defined for label {0}")]
    UnknownMnemonic(String),

    #[error("malformed row {line}: {message}")]
    MalformedRow { line: u64, message: String },

    #[error("RGB values must be between 0 and 255 inclusive: {0}")]
    InvalidRgb(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("TSV error: {0}")]
    Tsv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl From<csv::Error> for SegwayError {
    fn from(err: csv::Error) -> Self {
        SegwayError::Tsv(err.to_string())
    }
}
