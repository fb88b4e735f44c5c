mod common;

use assert_matches::assert_matches;
use serde_json::{Value, json};

use segway_pipeline_utils::app::{App, DatasetSource, InputJsonRequest};
use segway_pipeline_utils::domain::Assembly;
use segway_pipeline_utils::error::SegwayError;
use segway_pipeline_utils::input_json::{read_input_json, write_input_json};
use segway_pipeline_utils::select::SelectionStrategy;

use common::FakePortal;

fn bigwig(id: &str, assembly: &str, output_type: &str, reps: &[u32]) -> Value {
    json!({
        "@id": id,
        "file_format": "bigWig",
        "assembly": assembly,
        "output_type": output_type,
        "status": "released",
        "biological_replicates": reps,
        "cloud_metadata": {"url": format!("s3://encode{id}")}
    })
}

fn epigenome_portal() -> FakePortal {
    FakePortal::default()
        .with(
            "reference-epigenomes/ENCSR867OGI",
            json!({
                "related_datasets": [
                    {
                        "@id": "/experiments/ENCSR000CHP/",
                        "assay_title": "Histone ChIP-seq",
                        "status": "released",
                        "target": {"label": "H3K4me3"},
                        "replicates": [{"biological_replicate_number": 1, "status": "released"}],
                        "original_files": ["/files/FC/", "/files/OLD/"]
                    },
                    {
                        "@id": "/experiments/ENCSR000DNS/",
                        "assay_title": "DNase-seq",
                        "status": "released",
                        "replicates": [{"biological_replicate_number": 1, "status": "released"}],
                        "original_files": ["/files/DN/"]
                    },
                    {
                        "@id": "/experiments/ENCSR000CTF/",
                        "assay_title": "TF ChIP-seq",
                        "status": "released",
                        "target": {"label": "CTCF"},
                        "original_files": []
                    }
                ]
            }),
        )
        .with(
            "search/?type=File&@id=/files/FC/&@id=/files/OLD/&frame=object&limit=all",
            json!({
                "@graph": [
                    bigwig("/files/FC/", "GRCh38", "fold change over control", &[1]),
                    {
                        "@id": "/files/OLD/",
                        "file_format": "bigWig",
                        "assembly": "GRCh38",
                        "output_type": "fold change over control",
                        "status": "archived",
                        "biological_replicates": [1]
                    }
                ]
            }),
        )
        .with(
            "search/?type=File&@id=/files/DN/&frame=object&limit=all",
            json!({"@graph": [bigwig("/files/DN/", "GRCh38", "read-depth normalized signal", &[1])]}),
        )
        .with(
            "files/GRCh38_EBV.chrom.sizes/",
            json!({
                "@id": "/files/GRCh38_EBV.chrom.sizes/",
                "assembly": "GRCh38",
                "cloud_metadata": {"url": "s3://encode/GRCh38_EBV.chrom.sizes.tsv"}
            }),
        )
        .with(
            "files/gencode.v29.primary_assembly.annotation_UCSC_names/",
            json!({
                "@id": "/files/gencode.v29.primary_assembly.annotation_UCSC_names/",
                "cloud_metadata": {"url": "s3://encode/gencode.v29.gtf.gz"}
            }),
        )
}

fn epigenome_request() -> InputJsonRequest {
    let mut request =
        InputJsonRequest::new(DatasetSource::ReferenceEpigenome("ENCSR867OGI".parse().unwrap()));
    request.strategy = SelectionStrategy::ReplicateCount;
    request.chip_targets = Some(vec!["H3K4me3".to_string()]);
    request.include_tracks = true;
    request.params.prior_strength = Some(1.5);
    request.params.num_segway_cpus = Some(96);
    request
}

#[test]
fn reference_epigenome_input_json() {
    let app = App::new(epigenome_portal());
    let result = app.build_input_json(&epigenome_request()).unwrap();
    assert_eq!(result.assembly, "GRCh38");
    assert_eq!(
        Value::Object(result.input),
        json!({
            "segway.bigwigs": ["s3://encode/files/FC/", "s3://encode/files/DN/"],
            "segway.tracks": ["H3K4me3"],
            "segway.prior_strength": 1.5,
            "segway.num_segway_cpus": 96,
            "segway.chrom_sizes": "s3://encode/GRCh38_EBV.chrom.sizes.tsv",
            "segway.annotation_gtf": "s3://encode/gencode.v29.gtf.gz"
        })
    );
}

#[test]
fn tracks_are_left_out_unless_requested() {
    let app = App::new(epigenome_portal());
    let mut request = epigenome_request();
    request.include_tracks = false;
    let result = app.build_input_json(&request).unwrap();
    assert!(!result.input.contains_key("segway.tracks"));
    assert_eq!(result.selection.tracks(), vec!["H3K4me3"]);
}

#[test]
fn input_json_written_with_sorted_keys() {
    let app = App::new(epigenome_portal());
    let result = app.build_input_json(&epigenome_request()).unwrap();
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("ENCSR867OGI.json");
    write_input_json(&path, &result.input).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("{\n    \"segway.annotation_gtf\": "));
    assert_eq!(read_input_json(&path).unwrap(), result.input);
}

fn donor_source(term_name: &str) -> DatasetSource {
    DatasetSource::Donor {
        donor: "ENCDO000AAA".parse().unwrap(),
        biosample_term_name: term_name.to_string(),
    }
}

#[test]
fn donor_with_assembly_from_chrom_sizes() {
    let portal = FakePortal::default()
        .with(
            "search/?type=Biosample&biosample_ontology.term_name=K562&donor.accession=ENCDO000AAA&limit=all",
            json!({"@graph": [{"@id": "/biosamples/ENCBS000AAA/"}]}),
        )
        .with(
            "search/?type=Experiment&frame=embedded&replicates.library.biosample.@id=/biosamples/ENCBS000AAA/&limit=all",
            json!({
                "@graph": [{
                    "@id": "/experiments/ENCSR000ATC/",
                    "assay_title": "ATAC-seq",
                    "status": "released",
                    "files": [
                        bigwig("/files/ATAC_HUMAN/", "GRCh38", "fold change over control", &[1, 2]),
                        bigwig("/files/ATAC_MOUSE/", "mm10", "fold change over control", &[1, 2])
                    ]
                }]
            }),
        )
        .with(
            "files/mm10_no_alt.chrom.sizes/",
            json!({
                "@id": "/files/mm10_no_alt.chrom.sizes/",
                "assembly": "mm10",
                "cloud_metadata": {"url": "s3://encode/mm10.chrom.sizes.tsv"}
            }),
        )
        .with(
            "files/gencode.vM21.primary_assembly.annotation_UCSC_names/",
            json!({
                "@id": "/files/gencode.vM21.primary_assembly.annotation_UCSC_names/",
                "cloud_metadata": {"url": "s3://encode/gencode.vM21.gtf.gz"}
            }),
        );
    let app = App::new(portal);
    let mut request = InputJsonRequest::new(donor_source("K562"));
    request.strategy = SelectionStrategy::ReplicateCount;
    request.chrom_sizes = Some("files/mm10_no_alt.chrom.sizes/".to_string());

    let result = app.build_input_json(&request).unwrap();
    assert_eq!(result.assembly, "mm10");
    assert_eq!(
        result.input["segway.bigwigs"],
        json!(["s3://encode/files/ATAC_MOUSE/"])
    );
    assert_eq!(
        result.input["segway.annotation_gtf"],
        json!("s3://encode/gencode.vM21.gtf.gz")
    );
}

#[test]
fn donor_without_biosamples() {
    let app = App::new(FakePortal::default());
    let mut request = InputJsonRequest::new(donor_source("liver"));
    request.assembly = Some(Assembly::Grch38);
    let err = app.build_input_json(&request).unwrap_err();
    assert_matches!(
        err,
        SegwayError::MissingBiosamples { term_name, .. } if term_name == "liver"
    );
}

#[test]
fn missing_core_marks_fail_preferred_default() {
    let app = App::new(epigenome_portal());
    let mut request = epigenome_request();
    request.strategy = SelectionStrategy::PreferredDefault;
    request.chip_targets = None;
    let err = app.build_input_json(&request).unwrap_err();
    assert_matches!(err, SegwayError::MissingCoreTargets(_));
}
