use std::io::Write;

use crate::bed::tsv_writer;
use crate::error::SegwayError;
use crate::genomedata::track_name;

/// Pairs each trackname's file stem with the assay at the same position.
pub fn make_trackname_assay(
    tracknames: &[String],
    assays: &[String],
) -> Result<Vec<(String, String)>, SegwayError> {
    if tracknames.len() != assays.len() {
        return Err(SegwayError::ArgumentMismatch(format!(
            "got {} tracknames but {} assays",
            tracknames.len(),
            assays.len()
        )));
    }
    Ok(tracknames
        .iter()
        .zip(assays)
        .map(|(trackname, assay)| (track_name(trackname).to_string(), assay.clone()))
        .collect())
}

pub fn write_trackname_assay<W: Write>(
    output: W,
    rows: &[(String, String)],
) -> Result<(), SegwayError> {
    let mut writer = tsv_writer(output);
    for (trackname, assay) in rows {
        writer.write_record([trackname, assay])?;
    }
    writer
        .flush()
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    tracing::debug!(rows = rows.len(), "wrote trackname/assay table");
    Ok(())
}
