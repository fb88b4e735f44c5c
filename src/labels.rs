use std::fs;
use std::path::Path;

use crate::error::SegwayError;

/// Number of Segway labels for `num_tracks` input tracks, `floor(10 + 2 * sqrt(n))`
/// (Libbrecht et al. 2019).
pub fn num_labels(num_tracks: u32) -> u32 {
    (10.0 + 2.0 * f64::from(num_tracks).sqrt()).floor() as u32
}

pub fn write_num_labels(path: &Path, num_tracks: u32) -> Result<u32, SegwayError> {
    let labels = num_labels(num_tracks);
    fs::write(path, labels.to_string())
        .map_err(|err| SegwayError::Filesystem(format!("{}: {err}", path.display())))?;
    tracing::info!(num_tracks, labels, "computed label count");
    Ok(labels)
}
