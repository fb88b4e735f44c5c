use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::error::SegwayError;

pub const WORKFLOW_NAME: &str = "segway";

/// Flat, workflow-namespaced Cromwell input object.
pub type InputJson = Map<String, Value>;

pub fn workflow_key(name: &str) -> String {
    format!("{WORKFLOW_NAME}.{name}")
}

/// Places the selected bigWigs under `segway.bigwigs` and every extra property
/// `k` under `segway.k`. Values are passed through untouched.
pub fn assemble<I>(bigwigs: &[String], extra_properties: I) -> InputJson
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut input = InputJson::new();
    input.insert(
        workflow_key("bigwigs"),
        Value::Array(bigwigs.iter().cloned().map(Value::String).collect()),
    );
    for (key, value) in extra_properties {
        input.insert(workflow_key(&key), value);
    }
    input
}

pub fn to_json_string(input: &InputJson) -> Result<String, SegwayError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    input
        .serialize(&mut serializer)
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    String::from_utf8(buf).map_err(|err| SegwayError::Filesystem(err.to_string()))
}

/// Writes through a temp file in the destination directory, then renames.
pub fn write_input_json(path: &Path, input: &InputJson) -> Result<(), SegwayError> {
    let json = to_json_string(input)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".segway-input")
        .tempfile_in(parent)
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    temp.write_all(json.as_bytes())
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| SegwayError::Filesystem(format!("{}: {err}", path.display())))?;
    tracing::info!(path = %path.display(), keys = input.len(), "wrote input JSON");
    Ok(())
}

pub fn read_input_json(path: &Path) -> Result<InputJson, SegwayError> {
    let content = fs::read_to_string(path)
        .map_err(|err| SegwayError::Filesystem(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&content).map_err(|err| SegwayError::Filesystem(err.to_string()))
}
