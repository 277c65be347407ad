//! Check results and the run report.

use std::fmt;

/// How a single check ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed(String),
    /// The check could not run to a verdict (unsupported platform, failed
    /// prerequisite, cancellation).
    Skipped(String),
}

impl CheckOutcome {
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Passed => None,
            Self::Failed(reason) | Self::Skipped(reason) => Some(reason),
        }
    }

    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub outcome: CheckOutcome,
}

impl CheckResult {
    #[must_use]
    pub const fn new(name: &'static str, outcome: CheckOutcome) -> Self {
        Self { name, outcome }
    }

    /// Emit the result through `tracing`.
    pub fn log(&self) {
        match &self.outcome {
            CheckOutcome::Passed => tracing::info!(check = self.name, "Check passed"),
            CheckOutcome::Failed(reason) => {
                tracing::info!(check = self.name, %reason, "Check failed");
            }
            CheckOutcome::Skipped(reason) => {
                tracing::info!(check = self.name, %reason, "Check skipped");
            }
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.outcome)
    }
}

/// Ordered results of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    results: Vec<CheckResult>,
}

impl CheckReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: CheckResult) {
        result.log();
        self.results.push(result);
    }

    #[must_use]
    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CheckOutcome> {
        self.results
            .iter()
            .find(|result| result.name == name)
            .map(|result| &result.outcome)
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(CheckOutcome::is_passed)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(CheckOutcome::is_failed)
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(CheckOutcome::is_skipped)
    }

    /// True when nothing failed. Skips do not count against a run.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&CheckOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{result}")?;
        }
        write!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed(),
            self.failed(),
            self.skipped()
        )
    }
}
