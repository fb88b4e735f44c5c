//! Picks the one signal track per assay (and ChIP target) that feeds Segway.
//!
//! Two rule sets exist. `PreferredDefault` trusts the portal's
//! `preferred_default` flags and keys selections by assay and target.
//! `ReplicateCount` keys by dataset and prefers the most replicated file,
//! breaking DNase-seq ties by mapped read count.

use std::collections::BTreeSet;

use clap::ValueEnum;

use crate::domain::{
    ALIGNMENTS_OUTPUT_TYPE, Assay, CORE_TARGETS, PVALUE_OUTPUT_TYPE, SIGNAL_FORMAT, SelectionKey,
    is_excluded_status,
};
use crate::error::SegwayError;
use crate::portal::{Experiment, PortalClient, PortalFile};

const FLAGSTATS_PREFIX: &str = "/samtools-flagstats";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SelectionStrategy {
    #[default]
    PreferredDefault,
    ReplicateCount,
}

#[derive(Debug, Clone)]
pub struct SelectionOptions {
    pub assembly: String,
    pub strategy: SelectionStrategy,
    pub skip_assays: Vec<Assay>,
    /// When set, ChIP datasets whose target is not listed are ignored and every
    /// listed target must end up selected.
    pub chip_targets: Option<Vec<String>>,
    pub required_targets: Vec<String>,
}

impl SelectionOptions {
    /// `PreferredDefault` requires the core histone marks; `ReplicateCount` requires nothing.
    pub fn new(assembly: impl Into<String>, strategy: SelectionStrategy) -> Self {
        let required_targets = match strategy {
            SelectionStrategy::PreferredDefault => {
                CORE_TARGETS.iter().map(|t| t.to_string()).collect()
            }
            SelectionStrategy::ReplicateCount => Vec::new(),
        };
        Self {
            assembly: assembly.into(),
            strategy,
            skip_assays: Vec::new(),
            chip_targets: None,
            required_targets,
        }
    }

    /// Restrict to the core histone marks and drop every other assay.
    pub fn core_marks_only(mut self) -> Self {
        self.chip_targets = Some(CORE_TARGETS.iter().map(|t| t.to_string()).collect());
        self.skip_assays = Assay::ALL
            .into_iter()
            .filter(|assay| *assay != Assay::HistoneChip)
            .collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Selected files in dataset order.
    pub files: Vec<(SelectionKey, String)>,
    /// ChIP targets in the order their datasets were seen.
    pub found_targets: Vec<String>,
}

impl Selection {
    pub fn urls(&self) -> Vec<String> {
        self.files.iter().map(|(_, url)| url.clone()).collect()
    }

    pub fn tracks(&self) -> Vec<String> {
        self.found_targets.clone()
    }

    pub fn contains_key(&self, key: &SelectionKey) -> bool {
        self.files.iter().any(|(selected, _)| selected == key)
    }

    fn record_target(&mut self, target: &str) {
        if !self.found_targets.iter().any(|found| found == target) {
            self.found_targets.push(target.to_string());
        }
    }

    fn insert_unique(&mut self, key: SelectionKey, file: &PortalFile) -> Result<(), SegwayError> {
        if let Some((_, existing)) = self.files.iter().find(|(selected, _)| *selected == key) {
            return Err(SegwayError::AmbiguousSelection {
                key: key.to_string(),
                found: file.id.clone(),
                existing: existing.clone(),
            });
        }
        tracing::info!(key = %key, file = %file.id, "selected");
        self.files.push((key, file.cloud_url()?.to_string()));
        Ok(())
    }
}

pub struct FileSelector<'a, C: PortalClient> {
    client: &'a C,
    options: SelectionOptions,
}

impl<'a, C: PortalClient> FileSelector<'a, C> {
    pub fn new(client: &'a C, options: SelectionOptions) -> Self {
        Self { client, options }
    }

    pub fn select(&self, datasets: &[Experiment]) -> Result<Selection, SegwayError> {
        let mut selection = Selection::default();
        for dataset in datasets {
            let Some(assay) = self.admit(dataset)? else {
                continue;
            };
            match self.options.strategy {
                SelectionStrategy::PreferredDefault => {
                    self.select_preferred_default(dataset, assay, &mut selection)?
                }
                SelectionStrategy::ReplicateCount => {
                    self.select_by_replicates(dataset, assay, &mut selection)?
                }
            }
        }
        self.validate(&selection)?;
        tracing::info!(
            files = selection.files.len(),
            targets = %selection.tracks().join(", "),
            "selected signal files"
        );
        Ok(selection)
    }

    /// Dataset-level filters shared by both rule sets.
    fn admit(&self, dataset: &Experiment) -> Result<Option<Assay>, SegwayError> {
        let Some(assay) = Assay::from_title(&dataset.assay_title) else {
            tracing::debug!(dataset = %dataset.id, assay = %dataset.assay_title, "unsupported assay");
            return Ok(None);
        };
        if dataset.status.as_deref().is_some_and(is_excluded_status) {
            tracing::debug!(dataset = %dataset.id, "excluded dataset status");
            return Ok(None);
        }
        if self.options.skip_assays.contains(&assay) {
            return Ok(None);
        }
        if assay.is_chip() {
            if let Some(allowed) = &self.options.chip_targets {
                let target = dataset.target_label()?;
                if !allowed.iter().any(|t| t == target) {
                    tracing::debug!(dataset = %dataset.id, chip_target = target, "target not requested");
                    return Ok(None);
                }
            }
        }
        Ok(Some(assay))
    }

    fn is_signal_candidate(&self, assay: Assay, file: &PortalFile) -> bool {
        file.file_format == SIGNAL_FORMAT
            && file.assembly.as_deref() == Some(self.options.assembly.as_str())
            && file.output_type == assay.expected_output_type()
            && !is_excluded_status(&file.status)
    }

    fn select_preferred_default(
        &self,
        dataset: &Experiment,
        assay: Assay,
        selection: &mut Selection,
    ) -> Result<(), SegwayError> {
        let default_analysis = dataset.default_analysis()?;
        for file in &dataset.files {
            if !self.is_signal_candidate(assay, file) {
                continue;
            }
            if let Some(analysis) = default_analysis {
                if !analysis.contains(&file.id) {
                    continue;
                }
            }
            let key = if assay.is_chip() {
                // ChIP fold change tracks carry no preferred default flag; the
                // p-value track of the same replicates does.
                let replicates = file.replicate_set();
                let has_preferred_sibling = dataset.files.iter().any(|other| {
                    other.output_type == PVALUE_OUTPUT_TYPE
                        && other.is_preferred_default()
                        && other.replicate_set() == replicates
                });
                if !has_preferred_sibling {
                    continue;
                }
                let target = dataset.target_label()?;
                selection.record_target(target);
                SelectionKey::AssayTarget(assay, target.to_string())
            } else {
                if !file.is_preferred_default() {
                    continue;
                }
                SelectionKey::Assay(assay)
            };
            selection.insert_unique(key, file)?;
        }
        Ok(())
    }

    fn select_by_replicates(
        &self,
        dataset: &Experiment,
        assay: Assay,
        selection: &mut Selection,
    ) -> Result<(), SegwayError> {
        if assay.is_chip() {
            selection.record_target(dataset.target_label()?);
        }
        let live_replicates = dataset
            .replicates
            .iter()
            .filter(|rep| !rep.status.as_deref().is_some_and(is_excluded_status))
            .map(|rep| rep.biological_replicate_number)
            .collect::<BTreeSet<_>>();
        let files = dataset
            .files
            .iter()
            .filter(|file| !is_excluded_status(&file.status))
            .collect::<Vec<_>>();
        let max_replicates = files
            .iter()
            .map(|file| file.biological_replicates.len())
            .max()
            .unwrap_or(0);
        let preferred = if assay == Assay::Dnase && live_replicates.len() > 1 {
            Some(self.dnase_preferred_replicates(dataset, &files)?)
        } else {
            None
        };

        for file in files {
            if !self.is_signal_candidate(assay, file) {
                continue;
            }
            match &preferred {
                Some(replicates) if file.replicate_set() != *replicates => continue,
                None if file.biological_replicates.len() < max_replicates => continue,
                _ => {}
            }
            selection.insert_unique(SelectionKey::Dataset(dataset.id.clone()), file)?;
        }
        Ok(())
    }

    /// Replicates of the alignment file with the most mapped reads.
    fn dnase_preferred_replicates(
        &self,
        dataset: &Experiment,
        files: &[&PortalFile],
    ) -> Result<Vec<u32>, SegwayError> {
        let mut best: Option<(u64, Vec<u32>)> = None;
        for bam in files
            .iter()
            .filter(|file| file.output_type == ALIGNMENTS_OUTPUT_TYPE)
        {
            let flagstats = bam
                .quality_metrics
                .iter()
                .filter(|qc| qc.id().starts_with(FLAGSTATS_PREFIX))
                .collect::<Vec<_>>();
            let [qc] = flagstats.as_slice() else {
                return Err(SegwayError::MalformedResponse(format!(
                    "expected one samtools flagstats quality metric for file {}, found {}",
                    bam.id,
                    flagstats.len()
                )));
            };
            let mapped = self.client.mapped_read_count(qc.id())?;
            tracing::debug!(file = %bam.id, mapped, "DNase alignment");
            if best.as_ref().is_none_or(|(max, _)| mapped > *max) {
                best = Some((mapped, bam.replicate_set()));
            }
        }
        best.map(|(_, replicates)| replicates).ok_or_else(|| {
            SegwayError::MalformedResponse(format!(
                "replicated DNase-seq dataset {} has no alignments",
                dataset.id
            ))
        })
    }

    fn validate(&self, selection: &Selection) -> Result<(), SegwayError> {
        if let Some(requested) = &self.options.chip_targets {
            let missing = missing_targets(requested, &selection.found_targets);
            if !missing.is_empty() {
                return Err(SegwayError::MissingTargets(missing));
            }
        }
        let missing = missing_targets(&self.options.required_targets, &selection.found_targets);
        if !missing.is_empty() {
            return Err(SegwayError::MissingCoreTargets(missing));
        }
        if selection.files.is_empty() {
            return Err(SegwayError::NoFiles);
        }
        Ok(())
    }
}

fn missing_targets(wanted: &[String], found: &[String]) -> Vec<String> {
    wanted
        .iter()
        .filter(|target| !found.contains(*target))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
