use assert_matches::assert_matches;
use serde_json::json;

use segway_pipeline_utils::config::{Keypair, PipelineParams, ReferenceFiles};
use segway_pipeline_utils::domain::Assembly;
use segway_pipeline_utils::error::SegwayError;

#[test]
fn load_keypair_from_disk() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("keypairs.json");
    std::fs::write(
        &path,
        r#"{"submit": {"key": "ABCDEFGH", "secret": "s3cr3t", "server": "https://www.encodeproject.org"}}"#,
    )
    .unwrap();
    let keypair = Keypair::load(&path).unwrap();
    assert_eq!(
        keypair,
        Keypair {
            key: "ABCDEFGH".to_string(),
            secret: "s3cr3t".to_string(),
        }
    );
}

#[test]
fn keypair_must_be_json() {
    let err = Keypair::parse("key=foo").unwrap_err();
    assert_matches!(err, SegwayError::InvalidKeypair(_));
}

#[test]
fn all_params_become_properties() {
    let params = PipelineParams {
        num_segway_cpus: Some(96),
        resolution: Some(100),
        minibatch_fraction: Some(0.01),
        max_train_rounds: Some(25),
        num_instances: Some(10),
        prior_strength: Some(1.0),
        segtransition_weight_scale: Some(1.0),
    };
    let props = params.to_properties().unwrap();
    assert_eq!(props.len(), 7);
    assert_eq!(props["resolution"], json!(100));
    assert_eq!(props["segtransition_weight_scale"], json!(1.0));
}

#[test]
fn default_params_are_empty() {
    assert!(PipelineParams::default().to_properties().unwrap().is_empty());
}

#[test]
fn reference_files_per_assembly() {
    let grch38 = ReferenceFiles::for_assembly(Assembly::Grch38);
    assert_eq!(grch38.chrom_sizes, "files/GRCh38_EBV.chrom.sizes/");
    let mm10 = ReferenceFiles::for_assembly(Assembly::Mm10);
    assert!(mm10.annotation_gtf.contains("vM21"));
}
