use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{MissingPolicy, ReportConfig};
use crate::error::{Context, Result};
use crate::quote::Quote;

/// Receives the ranked quotes once the engine has computed returns.
pub trait ReportSink {
    /// Returns the number of lines emitted.
    fn publish(&mut self, ranked: &[&Quote]) -> Result<usize>;
}

pub fn render_line(quote: &Quote) -> String {
    format!("Symbol: {}, Return: {}\n", quote.symbol, quote.day_return)
}

/// Render the report text. Quotes must already be in rank order.
pub fn render_report(ranked: &[&Quote], missing: MissingPolicy) -> (String, usize) {
    let mut text = String::new();
    let mut lines = 0;
    for quote in ranked {
        if missing == MissingPolicy::Omit && quote.day_return.is_no_data() {
            continue;
        }
        text.push_str(&render_line(quote));
        lines += 1;
    }
    (text, lines)
}

/// Writes the report to a file, creating parent directories as needed.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
    missing: MissingPolicy,
    append: bool,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>, missing: MissingPolicy, append: bool) -> Self {
        Self {
            path: path.into(),
            missing,
            append,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.path.clone(), config.missing, config.append)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for ReportWriter {
    fn publish(&mut self, ranked: &[&Quote]) -> Result<usize> {
        let (text, lines) = render_report(ranked, self.missing);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create report directory {}", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .open(&self.path)
            .with_context(|| format!("Failed to open report file {}", self.path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("Failed to write report file {}", self.path.display()))?;

        Ok(lines)
    }
}

/// Keeps the rendered report in memory.
#[derive(Debug, Clone, Default)]
pub struct RenderedReport {
    pub missing: MissingPolicy,
    pub text: String,
}

impl RenderedReport {
    pub fn new(missing: MissingPolicy) -> Self {
        Self {
            missing,
            text: String::new(),
        }
    }
}

impl ReportSink for RenderedReport {
    fn publish(&mut self, ranked: &[&Quote]) -> Result<usize> {
        let (text, lines) = render_report(ranked, self.missing);
        self.text.push_str(&text);
        Ok(lines)
    }
}
