//! Inputs for the external preprocessing pipeline runner.
//!
//! The runner (fetch → SSS → score → SSP → epochs → covariance → forward →
//! inverse → report) is configured by a flat parameter set. This module
//! takes the study's base parameters, fills in the subject-dependent
//! values, picks the stages to run and lists the surrogate-MRI scaling
//! each subject needs. The result is written as one JSON job file.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::Paths;

/// Name of the scoring function the runner should call.
pub const SCORE_FUNCTION: &str = "f2f_score";
/// Template MRI scaled to every subject.
pub const SURROGATE_MRI: &str = "14mo_surr";
/// File whose presence marks a subject's MRI as already scaled.
pub const SCALED_MRI_FILE: &str = "T1.mgz";

// ── Stages ────────────────────────────────────────────────────────────────

/// Which runner stages to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingStages {
    pub fetch_raw: bool,
    /// tSSS / Maxwell filtering.
    pub do_sss: bool,
    pub do_score: bool,
    pub gen_ssp: bool,
    pub apply_ssp: bool,
    /// Epoching & filtering.
    pub write_epochs: bool,
    pub gen_covs: bool,
    pub gen_fwd: bool,
    pub gen_inv: bool,
    pub gen_report: bool,
    pub print_status: bool,
}

impl Default for ProcessingStages {
    /// Current study setting: SSS only, with status output.
    fn default() -> Self {
        Self {
            fetch_raw: false,
            do_sss: true,
            do_score: false,
            gen_ssp: false,
            apply_ssp: false,
            write_epochs: false,
            gen_covs: false,
            gen_fwd: false,
            gen_inv: false,
            gen_report: false,
            print_status: true,
        }
    }
}

impl ProcessingStages {
    /// Every stage enabled.
    pub fn all() -> Self {
        Self {
            fetch_raw: true,
            do_sss: true,
            do_score: true,
            gen_ssp: true,
            apply_ssp: true,
            write_epochs: true,
            gen_covs: true,
            gen_fwd: true,
            gen_inv: true,
            gen_report: true,
            print_status: true,
        }
    }
}

// ── MRI scaling ───────────────────────────────────────────────────────────

/// One surrogate → subject MRI scaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleStep {
    pub subject: String,
    pub subject_from: String,
    pub target_file: String,
    /// The scaled MRI already exists.
    pub done: bool,
}

/// Scaling steps for `subjects`; a step is marked done when
/// `{subjects_dir}/{subject}/mri/{target_file}` exists.
pub fn scale_plan(
    subjects: &[String],
    subjects_dir: &Path,
    subject_from: &str,
    target_file: &str,
) -> Vec<ScaleStep> {
    subjects
        .iter()
        .map(|s| ScaleStep {
            subject: s.clone(),
            subject_from: subject_from.to_string(),
            target_file: target_file.to_string(),
            done: subjects_dir.join(s).join("mri").join(target_file).exists(),
        })
        .collect()
}

// ── Parameters ────────────────────────────────────────────────────────────

/// First value stored under `key` anywhere in `v` (depth-first, document
/// order). Base parameter files group keys into sections.
pub fn find_key<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    match v {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|child| find_key(child, key))),
        Value::Array(items) => items.iter().find_map(|child| find_key(child, key)),
        _ => None,
    }
}

/// Base parameters (YAML) as a JSON value.
pub fn load_base_params(path: &Path) -> Result<Value> {
    let base: Value = crate::config::load_yaml(path)?;
    if !base.is_object() {
        bail!("{} does not hold a parameter mapping", path.display());
    }
    Ok(base)
}

/// Fill the subject-dependent runner parameters into `base`.
///
/// Sets `score`, `subjects_dir`, `subjects`, `structurals`,
/// `subject_indices`, `work_dir` and one `report.whitening` entry per
/// condition in `in_names`, using the covariance built at `lp_cut`.
pub fn assemble_params(mut base: Value, paths: &Paths, subjects: &[String]) -> Result<Value> {
    let lp_cut = find_key(&base, "lp_cut")
        .cloned()
        .context("base parameters have no lp_cut")?;
    let lp_cut = match lp_cut {
        Value::String(s) => s,
        other => other.to_string(),
    };
    let in_names: Vec<String> = find_key(&base, "in_names")
        .context("base parameters have no in_names")?
        .as_array()
        .context("in_names is not a list")?
        .iter()
        .map(|v| v.as_str().map(str::to_string).context("in_names entries must be strings"))
        .collect::<Result<_>>()?;

    if subjects.is_empty() {
        warn!("no subjects configured");
    }

    let params = base
        .as_object_mut()
        .context("base parameters are not a mapping")?;
    params.insert("score".into(), json!(SCORE_FUNCTION));
    params.insert("subjects_dir".into(), json!(paths.subjects_dir));
    params.insert("subjects".into(), json!(subjects));
    params.insert("structurals".into(), json!(subjects));
    params.insert("subject_indices".into(), json!((0..subjects.len()).collect::<Vec<_>>()));
    params.insert("work_dir".into(), json!(paths.data_root));

    let cov = format!("%s-{lp_cut}-sss-cov.fif");
    let whitening: Vec<Value> = in_names
        .iter()
        .map(|c| json!({ "name": c, "analysis": "Conditions", "cov": cov }))
        .collect();
    let report = params
        .entry("report")
        .or_insert_with(|| Value::Object(Map::new()));
    match report.as_object_mut() {
        Some(r) => {
            r.insert("whitening".into(), Value::Array(whitening));
        }
        None => bail!("report parameter is not a mapping"),
    }

    Ok(base)
}

// ── Job ───────────────────────────────────────────────────────────────────

/// Everything the runner needs for one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineJob {
    pub params: Value,
    pub stages: ProcessingStages,
    pub scale_mri: Vec<ScaleStep>,
}

impl PipelineJob {
    /// Assemble the job from a base parameter file.
    pub fn prepare(
        base_params: &Path,
        paths: &Paths,
        subjects: &[String],
        stages: ProcessingStages,
    ) -> Result<Self> {
        let base = load_base_params(base_params)?;
        let params = assemble_params(base, paths, subjects)
            .with_context(|| format!("assembling {}", base_params.display()))?;
        let scale_mri = scale_plan(subjects, &paths.subjects_dir, SURROGATE_MRI, SCALED_MRI_FILE);
        Ok(Self { params, stages, scale_mri })
    }

    /// Subjects still waiting for a scaled MRI.
    pub fn pending_scaling(&self) -> impl Iterator<Item = &ScaleStep> {
        self.scale_mri.iter().filter(|s| !s.done)
    }

    pub fn write(&self, path: &Path) -> Result<PathBuf> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote pipeline job {}", path.display());
        Ok(path.to_path_buf())
    }
}
