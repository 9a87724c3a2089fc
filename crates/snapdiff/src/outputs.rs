//! CI step outputs

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

const DELIMITER: &str = "SNAPDIFF_EOF";

/// Sink for named step outputs.
///
/// Appends to `$GITHUB_OUTPUT` when running in a workflow, otherwise prints
/// `name=value` lines to stdout.
#[derive(Debug, Clone)]
pub struct ActionOutputs {
    file: Option<PathBuf>,
}

impl ActionOutputs {
    pub fn from_env() -> Self {
        match std::env::var_os("GITHUB_OUTPUT") {
            Some(path) => Self::to_file(path),
            None => Self { file: None },
        }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
        }
    }

    pub fn set(&self, name: &str, value: &str) -> std::io::Result<()> {
        let Some(path) = &self.file else {
            println!("{}={}", name, value);
            return Ok(());
        };

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        write!(file, "{}", format_output(name, value))
    }
}

fn format_output(name: &str, value: &str) -> String {
    let mut delimiter = DELIMITER.to_string();
    while value.contains(&delimiter) {
        delimiter.push('_');
    }
    format!("{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter)
}
