use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SegwayError;

/// Statuses that take a dataset, replicate or file out of consideration.
pub const EXCLUDED_STATUSES: [&str; 4] = ["revoked", "archived", "replaced", "deleted"];

/// Histone marks every full Segway run is expected to include.
pub const CORE_TARGETS: [&str; 6] = [
    "H3K27ac", "H3K4me3", "H3K4me1", "H3K36me3", "H3K27me3", "H3K9me3",
];

pub const SIGNAL_FORMAT: &str = "bigWig";
pub const PVALUE_OUTPUT_TYPE: &str = "signal p-value";
pub const ALIGNMENTS_OUTPUT_TYPE: &str = "alignments";

pub fn is_excluded_status(status: &str) -> bool {
    EXCLUDED_STATUSES.contains(&status)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Assay {
    HistoneChip,
    TfChip,
    Dnase,
    Atac,
}

impl Assay {
    pub const ALL: [Assay; 4] = [Assay::HistoneChip, Assay::TfChip, Assay::Dnase, Assay::Atac];

    pub fn title(self) -> &'static str {
        match self {
            Assay::HistoneChip => "Histone ChIP-seq",
            Assay::TfChip => "TF ChIP-seq",
            Assay::Dnase => "DNase-seq",
            Assay::Atac => "ATAC-seq",
        }
    }

    /// Output type of the signal track the pipeline consumes for this assay.
    pub fn expected_output_type(self) -> &'static str {
        match self {
            Assay::Dnase => "read-depth normalized signal",
            Assay::HistoneChip | Assay::TfChip | Assay::Atac => "fold change over control",
        }
    }

    pub fn is_chip(self) -> bool {
        matches!(self, Assay::HistoneChip | Assay::TfChip)
    }

    /// Like `from_str`, but returns `None` for assays the pipeline does not use.
    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|assay| assay.title() == title)
    }
}

impl fmt::Display for Assay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

impl FromStr for Assay {
    type Err = SegwayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_title(value.trim()).ok_or_else(|| {
            let valid = Self::ALL.map(Assay::title).join(", ");
            SegwayError::InvalidAssay(format!("{value} (options are {valid})"))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Assembly {
    #[value(name = "GRCh38")]
    #[serde(rename = "GRCh38")]
    Grch38,
    #[value(name = "mm10")]
    #[serde(rename = "mm10")]
    Mm10,
}

impl Assembly {
    pub fn as_str(self) -> &'static str {
        match self {
            Assembly::Grch38 => "GRCh38",
            Assembly::Mm10 => "mm10",
        }
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DonorAccession(String);

impl DonorAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DonorAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DonorAccession {
    type Err = SegwayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let re = Regex::new(r"^ENC(DO|DN)\d{3}[A-Z]{3}$")
            .map_err(|err| SegwayError::InvalidAccession(err.to_string()))?;
        if !re.is_match(&normalized) {
            return Err(SegwayError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Portal path of a reference epigenome, e.g. `reference-epigenomes/ENCSR867OGI`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceEpigenomeId(String);

impl ReferenceEpigenomeId {
    const PREFIX: &'static str = "reference-epigenomes";

    pub fn accession(&self) -> &str {
        &self.0
    }

    pub fn path(&self) -> String {
        format!("{}/{}", Self::PREFIX, self.0)
    }
}

impl fmt::Display for ReferenceEpigenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReferenceEpigenomeId {
    type Err = SegwayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_matches('/');
        let accession = trimmed
            .strip_prefix(Self::PREFIX)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(trimmed)
            .to_uppercase();
        let re = Regex::new(r"^ENCSR\d{3}[A-Z]{3}$")
            .map_err(|err| SegwayError::InvalidAccession(err.to_string()))?;
        if !re.is_match(&accession) {
            return Err(SegwayError::InvalidAccession(value.to_string()));
        }
        Ok(Self(accession))
    }
}

/// Key under which at most one signal file may be selected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SelectionKey {
    Assay(Assay),
    AssayTarget(Assay, String),
    Dataset(String),
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionKey::Assay(assay) => write!(f, "assay {assay}"),
            SelectionKey::AssayTarget(assay, target) => {
                write!(f, "assay/target combination {assay},{target}")
            }
            SelectionKey::Dataset(id) => write!(f, "dataset {id}"),
        }
    }
}
