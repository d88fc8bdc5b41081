//! Destinations for the posterior summary streams.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use ssur_core::SsurError;

use crate::config::ModelKind;

/// One summary output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stream {
    /// Posterior inclusion probabilities (p×s).
    Gamma,
    /// Posterior edge probabilities of the outcome graph (s×s).
    Graph,
    /// Posterior mean coefficients ((q+p)×s).
    Beta,
    /// Posterior mean variances and partial regressions (s×s).
    SigmaRho,
    /// Posterior mean outcome propensities, one value per line.
    Pi,
    /// Posterior probability that an outcome propensity exceeds one, one
    /// value per line.
    HotspotTail,
    /// One line of log prior and likelihood terms per checkpoint.
    LogP,
}

impl Stream {
    /// File name suffix appended to the run prefix.
    pub fn file_name(&self) -> &'static str {
        match self {
            Stream::Gamma => "gamma_out.txt",
            Stream::Graph => "G_out.txt",
            Stream::Beta => "beta_out.txt",
            Stream::SigmaRho => "sigmaRho_out.txt",
            Stream::Pi => "pi_out.txt",
            Stream::HotspotTail => "hotspot_tail_p_out.txt",
            Stream::LogP => "logP_out.txt",
        }
    }

    /// Streams a model writes.
    pub fn for_model(model: ModelKind) -> &'static [Stream] {
        match model {
            ModelKind::Sur => &[
                Stream::Gamma,
                Stream::Graph,
                Stream::Beta,
                Stream::SigmaRho,
                Stream::Pi,
                Stream::HotspotTail,
                Stream::LogP,
            ],
            ModelKind::Hess => &[Stream::Gamma, Stream::Pi, Stream::HotspotTail, Stream::LogP],
        }
    }
}

/// Receiver of summary text.
pub trait SummarySink {
    /// Replaces the whole content of `stream`.
    fn rewrite(&mut self, stream: Stream, text: &str) -> Result<(), SsurError>;

    /// Appends one line to `stream`.
    fn append(&mut self, stream: Stream, line: &str) -> Result<(), SsurError>;
}

/// Writes each stream to `{directory}/{prefix}{file_name}`.
#[derive(Debug, Clone)]
pub struct FileSink {
    directory: PathBuf,
    prefix: String,
}

impl FileSink {
    /// Creates the directory and truncates every stream of the run.
    pub fn create(
        directory: &Path,
        prefix: impl Into<String>,
        streams: &[Stream],
    ) -> Result<Self, SsurError> {
        fs::create_dir_all(directory)
            .map_err(|err| SsurError::io("sink-mkdir", err, directory.display()))?;
        let sink = Self {
            directory: directory.to_path_buf(),
            prefix: prefix.into(),
        };
        for stream in streams {
            let path = sink.path(*stream);
            fs::write(&path, "")
                .map_err(|err| SsurError::io("sink-truncate", err, path.display()))?;
        }
        Ok(sink)
    }

    /// Path of one stream.
    pub fn path(&self, stream: Stream) -> PathBuf {
        self.directory
            .join(format!("{}{}", self.prefix, stream.file_name()))
    }

    /// File name prefix shared by every stream.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl SummarySink for FileSink {
    fn rewrite(&mut self, stream: Stream, text: &str) -> Result<(), SsurError> {
        let path = self.path(stream);
        fs::write(&path, text).map_err(|err| SsurError::io("sink-rewrite", err, path.display()))
    }

    fn append(&mut self, stream: Stream, line: &str) -> Result<(), SsurError> {
        let path = self.path(stream);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| SsurError::io("sink-open", err, path.display()))?;
        writeln!(file, "{line}").map_err(|err| SsurError::io("sink-append", err, path.display()))
    }
}

/// In-memory sink, mainly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    streams: BTreeMap<Stream, String>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content of a stream, if it was ever written.
    pub fn get(&self, stream: Stream) -> Option<&str> {
        self.streams.get(&stream).map(String::as_str)
    }

    /// Non-empty lines of a stream.
    pub fn lines(&self, stream: Stream) -> Vec<&str> {
        self.get(stream)
            .map(|text| text.lines().filter(|l| !l.is_empty()).collect())
            .unwrap_or_default()
    }
}

impl SummarySink for MemorySink {
    fn rewrite(&mut self, stream: Stream, text: &str) -> Result<(), SsurError> {
        self.streams.insert(stream, text.to_string());
        Ok(())
    }

    fn append(&mut self, stream: Stream, line: &str) -> Result<(), SsurError> {
        let entry = self.streams.entry(stream).or_default();
        entry.push_str(line);
        entry.push('\n');
        Ok(())
    }
}

/// Space-separated values with six decimals.
pub fn format_row(values: impl IntoIterator<Item = f64>) -> String {
    values
        .into_iter()
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line per matrix row, newline terminated.
pub fn format_matrix(matrix: &DMatrix<f64>) -> String {
    let mut text = String::new();
    for row in matrix.row_iter() {
        text.push_str(&format_row(row.iter().copied()));
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_rows_are_lines() {
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, -0.25, 2.0]);
        assert_eq!(
            format_matrix(&matrix),
            "1.000000 0.500000\n-0.250000 2.000000\n"
        );
    }

    #[test]
    fn memory_sink_appends_lines() {
        let mut sink = MemorySink::new();
        sink.append(Stream::LogP, "1 2").unwrap();
        sink.append(Stream::LogP, "3 4").unwrap();
        sink.rewrite(Stream::Pi, "0.5\n").unwrap();
        assert_eq!(sink.lines(Stream::LogP), vec!["1 2", "3 4"]);
        assert_eq!(sink.get(Stream::Pi), Some("0.5\n"));
        assert!(sink.get(Stream::Graph).is_none());
    }
}
