//! Trigger events and the study's scoring rule.
//!
//! Events are `[N, 3]` integer arrays with MNE's column layout:
//! `[sample, previous_value, code]`.
//!
//! # Incoming triggers
//! ```text
//! STI001 → code 1   "ready" light (not used)
//! STI002 → code 3   trial start, "attend" condition
//! STI003 → code 5   trial start, "ignore" condition
//! ```
//! Scoring drops code 1, recodes "attend" to 31 and "ignore" to 55.
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use log::info;
use ndarray::{Array2, ArrayView2, Axis};

/// Subject whose stim channels were wired so that "attend" arrives as 9.
pub const MISWIRED_SUBJECT: &str = "f2f_108";

// ── Event files ───────────────────────────────────────────────────────────

/// Parse MNE's text event format.
///
/// Rows have either 3 columns (`sample prev code`) or 4
/// (`sample time prev code`, time is dropped). Blank lines and lines starting
/// with `#` are ignored.
pub fn parse_events(text: &str) -> Result<Array2<i64>> {
    let mut flat = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        let (sample, prev, code) = match cols.as_slice() {
            [s, p, c] => (*s, *p, *c),
            [s, _t, p, c] => (*s, *p, *c),
            _ => bail!("line {}: expected 3 or 4 columns, got {}", lineno + 1, cols.len()),
        };
        for field in [sample, prev, code] {
            let v: i64 = field
                .parse()
                .with_context(|| format!("line {}: bad integer {field:?}", lineno + 1))?;
            flat.push(v);
        }
    }
    let n = flat.len() / 3;
    Ok(Array2::from_shape_vec((n, 3), flat)?)
}

pub fn read_events(path: &Path) -> Result<Array2<i64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_events(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Format events as right-aligned 3-column text.
pub fn format_events(events: ArrayView2<'_, i64>) -> Result<String> {
    ensure!(events.ncols() == 3, "events must have 3 columns, got {}", events.ncols());
    let mut out = String::with_capacity(events.nrows() * 24);
    for row in events.rows() {
        writeln!(out, "{:>8} {:>6} {:>6}", row[0], row[1], row[2])?;
    }
    Ok(out)
}

pub fn write_events(path: &Path, events: &Array2<i64>) -> Result<()> {
    let text = format_events(events.view())?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

// ── Scoring ───────────────────────────────────────────────────────────────

/// Which trigger codes to keep and what to turn them into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRule {
    /// Codes that survive scoring; everything else is dropped.
    pub valid: Vec<i64>,
    /// `(incoming, outgoing)` code pairs.
    pub mapping: Vec<(i64, i64)>,
    /// Outgoing code for valid codes without a mapping entry.
    pub default_code: i64,
}

impl ScoreRule {
    /// The study rule: keep 3 ("attend") and 5 ("ignore"), emit 31 / 55.
    pub fn study() -> Self {
        Self { valid: vec![3, 5], mapping: vec![(5, 55)], default_code: 31 }
    }

    /// Rule for `subject`, accounting for the miswired session.
    pub fn for_subject(subject: &str) -> Self {
        let mut rule = Self::study();
        if subject == MISWIRED_SUBJECT {
            rule.valid = vec![9, 5];
        }
        rule
    }

    fn recode(&self, code: i64) -> Option<i64> {
        if !self.valid.contains(&code) {
            return None;
        }
        let mapped = self.mapping.iter().find(|&&(from, _)| from == code).map(|&(_, to)| to);
        Some(mapped.unwrap_or(self.default_code))
    }
}

/// Keep the valid events, zero their previous-value column and map their
/// codes. Row order is preserved.
pub fn recode(events: ArrayView2<'_, i64>, rule: &ScoreRule) -> Result<Array2<i64>> {
    ensure!(events.ncols() == 3, "events must have 3 columns, got {}", events.ncols());
    let mut flat = Vec::with_capacity(events.len());
    for row in events.axis_iter(Axis(0)) {
        if let Some(code) = rule.recode(row[2]) {
            flat.extend_from_slice(&[row[0], 0, code]);
        }
    }
    let n = flat.len() / 3;
    Ok(Array2::from_shape_vec((n, 3), flat)?)
}

/// Score every run of `subject`: `inputs[i]` is read, recoded and written
/// to `outputs[i]`. Returns the number of events written per run.
pub fn score_subject(subject: &str, inputs: &[PathBuf], outputs: &[PathBuf]) -> Result<Vec<usize>> {
    ensure!(
        inputs.len() == outputs.len(),
        "{} input event files but {} outputs",
        inputs.len(),
        outputs.len()
    );
    let rule = ScoreRule::for_subject(subject);
    let mut counts = Vec::with_capacity(inputs.len());
    for (input, output) in inputs.iter().zip(outputs) {
        let raw = read_events(input)?;
        let scored = recode(raw.view(), &rule)?;
        write_events(output, &scored)?;
        info!(
            "{subject}: {} → {} events ({} → {})",
            raw.nrows(),
            scored.nrows(),
            input.display(),
            output.display()
        );
        counts.push(scored.nrows());
    }
    Ok(counts)
}
