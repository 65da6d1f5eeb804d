use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Kind of work a job performs.
///
/// The kind selects which job body the worker process runs.
/// Bodies are resolved through an explicit registry before the job starts, never loaded dynamically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    /// Run a native command and stream its output as logs.
    Command,
    /// Analyze a build bundle and report its statistics.
    BundleStats,
    /// Analyze a published package.
    PackageAnalysis,
    /// Browser-driven lab analysis.
    LabAnalysis,
}

impl JobKind {
    /// All known kinds, in declaration order.
    pub const ALL: [JobKind; 4] = [
        JobKind::Command,
        JobKind::BundleStats,
        JobKind::PackageAnalysis,
        JobKind::LabAnalysis,
    ];

    /// Returns the kind as a static string (wire name).
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Command => "command",
            JobKind::BundleStats => "bundleStats",
            JobKind::PackageAnalysis => "packageAnalysis",
            JobKind::LabAnalysis => "labAnalysis",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match norm.as_str() {
            "command" | "cmd" => Ok(JobKind::Command),
            "bundlestats" => Ok(JobKind::BundleStats),
            "packageanalysis" => Ok(JobKind::PackageAnalysis),
            "labanalysis" => Ok(JobKind::LabAnalysis),
            _ => Err(ModelError::UnknownJobKind(s.to_string())),
        }
    }
}
