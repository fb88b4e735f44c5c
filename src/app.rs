use std::path::PathBuf;

use serde_json::Value;

use crate::config::{PipelineParams, ReferenceFiles};
use crate::domain::{Assay, Assembly, DonorAccession, ReferenceEpigenomeId};
use crate::error::SegwayError;
use crate::input_json::{self, InputJson};
use crate::portal::{Experiment, PortalClient};
use crate::select::{FileSelector, Selection, SelectionOptions, SelectionStrategy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Donor {
        donor: DonorAccession,
        biosample_term_name: String,
    },
    ReferenceEpigenome(ReferenceEpigenomeId),
}

impl DatasetSource {
    pub fn default_outfile(&self) -> PathBuf {
        match self {
            DatasetSource::Donor {
                biosample_term_name,
                ..
            } => PathBuf::from(format!("{}.json", biosample_term_name.replace(' ', "_"))),
            DatasetSource::ReferenceEpigenome(id) => PathBuf::from(format!("{}.json", id.accession())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputJsonRequest {
    pub source: DatasetSource,
    /// When absent the assembly is read from the chrom sizes file, falling back to GRCh38.
    pub assembly: Option<Assembly>,
    pub strategy: SelectionStrategy,
    pub skip_assays: Vec<Assay>,
    pub chip_targets: Option<Vec<String>>,
    pub core_marks: bool,
    pub chrom_sizes: Option<String>,
    pub annotation_gtf: Option<String>,
    pub params: PipelineParams,
    pub include_tracks: bool,
}

impl InputJsonRequest {
    pub fn new(source: DatasetSource) -> Self {
        Self {
            source,
            assembly: None,
            strategy: SelectionStrategy::default(),
            skip_assays: Vec::new(),
            chip_targets: None,
            core_marks: false,
            chrom_sizes: None,
            annotation_gtf: None,
            params: PipelineParams::default(),
            include_tracks: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputJsonResult {
    pub assembly: String,
    pub selection: Selection,
    pub input: InputJson,
}

pub struct App<C: PortalClient> {
    portal: C,
}

impl<C: PortalClient> App<C> {
    pub fn new(portal: C) -> Self {
        Self { portal }
    }

    pub fn datasets(&self, source: &DatasetSource) -> Result<Vec<Experiment>, SegwayError> {
        let datasets = match source {
            DatasetSource::Donor {
                donor,
                biosample_term_name,
            } => self.portal.experiments_for_donor(donor, biosample_term_name)?,
            DatasetSource::ReferenceEpigenome(id) => self.portal.reference_epigenome(id)?,
        };
        tracing::info!(datasets = datasets.len(), "fetched datasets");
        Ok(datasets)
    }

    pub fn build_input_json(&self, request: &InputJsonRequest) -> Result<InputJsonResult, SegwayError> {
        let assembly = self.resolve_assembly(request)?;
        let (chrom_sizes, annotation_gtf) = reference_files(request, &assembly)?;

        let datasets = self.datasets(&request.source)?;
        let selection = FileSelector::new(&self.portal, selection_options(request, &assembly))
            .select(&datasets)?;

        let mut extra = request.params.to_properties()?;
        extra.insert(
            "chrom_sizes".to_string(),
            Value::String(self.portal.cloud_url_of(&chrom_sizes)?),
        );
        extra.insert(
            "annotation_gtf".to_string(),
            Value::String(self.portal.cloud_url_of(&annotation_gtf)?),
        );
        if request.include_tracks {
            extra.insert(
                "tracks".to_string(),
                Value::Array(selection.tracks().into_iter().map(Value::String).collect()),
            );
        }
        let input = input_json::assemble(&selection.urls(), extra);
        Ok(InputJsonResult {
            assembly,
            selection,
            input,
        })
    }

    fn resolve_assembly(&self, request: &InputJsonRequest) -> Result<String, SegwayError> {
        if let Some(assembly) = request.assembly {
            return Ok(assembly.as_str().to_string());
        }
        match &request.chrom_sizes {
            Some(chrom_sizes) => {
                let assembly = self.portal.assembly_of(chrom_sizes)?;
                tracing::debug!(%assembly, chrom_sizes, "assembly read from chrom sizes");
                Ok(assembly)
            }
            None => Ok(Assembly::Grch38.as_str().to_string()),
        }
    }
}

fn selection_options(request: &InputJsonRequest, assembly: &str) -> SelectionOptions {
    let mut options = SelectionOptions::new(assembly, request.strategy);
    if request.core_marks {
        options = options.core_marks_only();
    } else {
        options.chip_targets = request.chip_targets.clone();
    }
    for assay in &request.skip_assays {
        if !options.skip_assays.contains(assay) {
            options.skip_assays.push(*assay);
        }
    }
    options
}

fn reference_files(
    request: &InputJsonRequest,
    assembly: &str,
) -> Result<(String, String), SegwayError> {
    if let (Some(chrom_sizes), Some(annotation_gtf)) = (&request.chrom_sizes, &request.annotation_gtf) {
        return Ok((chrom_sizes.clone(), annotation_gtf.clone()));
    }
    let defaults = match assembly {
        "GRCh38" => ReferenceFiles::for_assembly(Assembly::Grch38),
        "mm10" => ReferenceFiles::for_assembly(Assembly::Mm10),
        other => {
            return Err(SegwayError::ArgumentMismatch(format!(
                "no default reference files for assembly {other}, pass --chrom-sizes and --annotation-gtf"
            )));
        }
    };
    Ok((
        request
            .chrom_sizes
            .clone()
            .unwrap_or_else(|| defaults.chrom_sizes.to_string()),
        request
            .annotation_gtf
            .clone()
            .unwrap_or_else(|| defaults.annotation_gtf.to_string()),
    ))
}
