use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::SegwayError;

/// Opens a text input, gunzipping it when the name ends in `.gz`.
pub fn open_input(path: &Path) -> Result<Box<dyn Read>, SegwayError> {
    let file = File::open(path)
        .map_err(|err| SegwayError::Filesystem(format!("open {}: {err}", path.display())))?;
    let is_gzip = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gzip {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn create_output(path: &Path) -> Result<BufWriter<File>, SegwayError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| {
                SegwayError::Filesystem(format!("create {}: {err}", parent.display()))
            })?;
        }
    }
    let file = File::create(path)
        .map_err(|err| SegwayError::Filesystem(format!("create {}: {err}", path.display())))?;
    Ok(BufWriter::new(file))
}
