use std::path::{Path, PathBuf};
use std::process::Command;

use camino::Utf8Path;

use crate::error::SegwayError;

pub const GENOMEDATA_LOAD: &str = "genomedata-load";

/// Track name for a signal file: its file name without the last extension.
pub fn track_name(file: &str) -> &str {
    let path = Utf8Path::new(file);
    path.file_stem().or_else(|| path.file_name()).unwrap_or(file)
}

/// Arguments for `genomedata-load`, program name included.
pub fn make_command(
    files: &[String],
    chrom_sizes: &str,
    tracks: &[String],
    outfile: &str,
) -> Result<Vec<String>, SegwayError> {
    if files.is_empty() {
        return Err(SegwayError::ArgumentMismatch(
            "at least one signal file is required".to_string(),
        ));
    }
    if !tracks.is_empty() && tracks.len() != files.len() {
        return Err(SegwayError::ArgumentMismatch(format!(
            "got {} files but {} track names",
            files.len(),
            tracks.len()
        )));
    }
    let mut command = vec![
        GENOMEDATA_LOAD.to_string(),
        "-s".to_string(),
        chrom_sizes.to_string(),
        "--sizes".to_string(),
    ];
    for file in files {
        command.push("-t".to_string());
        command.push(format!("{}={file}", track_name(file)));
    }
    for track in tracks {
        command.push("-tracks".to_string());
        command.push(track.clone());
    }
    command.push(outfile.to_string());
    Ok(command)
}

pub trait GenomedataLoader {
    fn run(&self, command: &[String]) -> Result<(), SegwayError>;
}

#[derive(Debug, Clone)]
pub struct SystemGenomedataLoader {
    program: Option<PathBuf>,
}

impl SystemGenomedataLoader {
    pub fn new() -> Self {
        Self {
            program: find_in_path(GENOMEDATA_LOAD),
        }
    }

    fn require_program(&self) -> Result<&Path, SegwayError> {
        self.program
            .as_deref()
            .ok_or_else(|| SegwayError::MissingTool(GENOMEDATA_LOAD.to_string()))
    }
}

impl Default for SystemGenomedataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GenomedataLoader for SystemGenomedataLoader {
    fn run(&self, command: &[String]) -> Result<(), SegwayError> {
        let program = self.require_program()?;
        let args = command.get(1..).unwrap_or_default();
        tracing::info!(program = %program.display(), ?args, "running genomedata-load");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| SegwayError::ToolFailed {
                tool: GENOMEDATA_LOAD.to_string(),
                message: err.to_string(),
            })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr
        };
        Err(SegwayError::ToolFailed {
            tool: GENOMEDATA_LOAD.to_string(),
            message,
        })
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use assert_matches::assert_matches;

    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn command_with_tracks() {
        let result = make_command(
            &strings(&["f1.bigwig", "f2.bw"]),
            "chrom.sizes",
            &strings(&["track1.H3K4me1", "track2.H3K4me3"]),
            "my.gd",
        )
        .unwrap();
        assert_eq!(
            result,
            strings(&[
                "genomedata-load",
                "-s",
                "chrom.sizes",
                "--sizes",
                "-t",
                "f1=f1.bigwig",
                "-t",
                "f2=f2.bw",
                "-tracks",
                "track1.H3K4me1",
                "-tracks",
                "track2.H3K4me3",
                "my.gd",
            ])
        );
    }

    #[test]
    fn command_without_tracks() {
        let result = make_command(&strings(&["/data/ref.bw"]), "chrom.sizes", &[], "out.gd").unwrap();
        assert_eq!(
            result,
            strings(&["genomedata-load", "-s", "chrom.sizes", "--sizes", "-t", "ref=/data/ref.bw", "out.gd"])
        );
    }

    #[test]
    fn mismatched_tracks() {
        let err = make_command(
            &strings(&["a.bw", "b.bw"]),
            "chrom.sizes",
            &strings(&["H3K4me1"]),
            "out.gd",
        )
        .unwrap_err();
        assert_matches!(err, SegwayError::ArgumentMismatch(_));
    }

    #[test]
    fn missing_tool() {
        let loader = SystemGenomedataLoader { program: None };
        let err = loader.run(&strings(&["genomedata-load"])).unwrap_err();
        assert_matches!(err, SegwayError::MissingTool(_));
    }

    #[test]
    fn loader_trait_receives_command() {
        struct Recording(RefCell<Vec<String>>);
        impl GenomedataLoader for Recording {
            fn run(&self, command: &[String]) -> Result<(), SegwayError> {
                self.0.borrow_mut().extend_from_slice(command);
                Ok(())
            }
        }
        let loader = Recording(RefCell::new(Vec::new()));
        let command = make_command(&strings(&["gs://bucket/x.bw"]), "s", &[], "o").unwrap();
        loader.run(&command).unwrap();
        assert_eq!(loader.0.borrow()[5], "x=gs://bucket/x.bw");
    }
}
