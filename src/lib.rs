//! # f2f-preproc — preprocessing tools for the face-to-face MEG study
//!
//! Glue between the study's YAML configuration and the anatomical and MEG
//! preprocessing it needs before connectivity analysis.
//!
//! ## Custom parcellation overview
//!
//! ```text
//! {subjects_dir}/{surrogate}/label/{lh,rh}.aparc.annot
//!   │
//!   ├─ annot::read_labels_from_annot()     coarse area names only
//!   │
//! {subjects_dir}/{surrogate}/label/{lh,rh}.aparc_sub.annot
//!   │
//!   ├─ annot::read_labels_from_annot()     fine labels (skip-list filtered)
//!   ├─ parcellation::build_parcellation()  ROIs from rois.yaml + remainders
//!   └─ annot::write_labels_to_annot()      one scheme, both hemispheres
//!        │
//!        └─→ {subjects_dir}/{surrogate}/label/{lh,rh}.{scheme}.annot
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use f2f_preproc::{make_custom_parcellations, ParcellationConfig};
//! use f2f_preproc::config::ParamDir;
//!
//! let params = ParamDir::new("params");
//! let written = make_custom_parcellations(&params, &ParcellationConfig::default()).unwrap();
//! for scheme in &written {
//!     println!("{}: {} ROIs, {} remainders", scheme.name, scheme.n_rois, scheme.n_remainders);
//! }
//! ```
//!
//! ## Other tools
//!
//! * [`events`] recodes trigger events with the study's scoring rule.
//! * [`pipeline`] assembles the job file for the external preprocessing
//!   pipeline runner and the per-subject MRI scaling plan.

pub mod annot;
pub mod color;
pub mod config;
pub mod events;
pub mod label;
pub mod parcellation;
pub mod pipeline;

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// annot
pub use annot::{read_labels_from_annot, write_labels_to_annot, Annotation, CtabEntry};

// color
pub use color::{muted_dark, ColorTable, Rgba};

// config
pub use config::{load_yaml, ParamDir, ParcellationConfig, Paths, RoiConfig, SkipLabels, DEFAULT_SEED};

// events
pub use events::{read_events, recode, score_subject, write_events, ScoreRule};

// label
pub use label::{Hemisphere, Label, LabelError, LabelFilter, LabelSet, VertexCounts};

// parcellation
pub use parcellation::{build_parcellation, resolve_token, BuildOptions, ParcellationError, RegionSpec};

// pipeline
pub use pipeline::{PipelineJob, ProcessingStages, ScaleStep};

/// Outcome of one written parcellation scheme.
#[derive(Debug, Clone)]
pub struct SchemeSummary {
    pub name: String,
    pub n_rois: usize,
    pub n_remainders: usize,
    pub files: Vec<PathBuf>,
}

/// Build and write **every scheme** in `rois.yaml` on the surrogate subject.
///
/// 1. Read the coarse atlas ([`ParcellationConfig::coarse_parc`]) and keep
///    its area names.
/// 2. Read the fine atlas ([`ParcellationConfig::fine_parc`]).
/// 3. For each scheme in file order (except the one named like the coarse
///    atlas, and those left out of a non-empty
///    [`ParcellationConfig::schemes`]): build it with [`build_parcellation`] and write it with
///    [`write_labels_to_annot`].
///
/// Skip lists come from `skip_labels.yaml`, colors from the study table
/// plus `colors.yaml`. One `ChaCha20Rng` seeded with
/// [`ParcellationConfig::seed`] colors the remainders of all schemes.
///
/// # Errors
///
/// Any configuration, lookup or I/O failure aborts the run. Schemes are
/// written in order, so schemes before the failing one are already on
/// disk; nothing of the failing scheme is.
pub fn make_custom_parcellations(
    params: &ParamDir,
    cfg: &ParcellationConfig,
) -> Result<Vec<SchemeSummary>> {
    let paths = params.paths()?;
    let surrogate = params.surrogate()?;
    let skips = params.skip_labels()?;
    let rois = params.rois()?;
    let colors = params.colors()?;
    for wanted in &cfg.schemes {
        if !rois.schemes().any(|(name, _)| name == wanted) {
            bail!("scheme {wanted:?} is not in rois.yaml");
        }
    }

    let coarse = read_labels_from_annot(
        &surrogate,
        &cfg.coarse_parc,
        &paths.subjects_dir,
        &skips.filter_for(&cfg.coarse_parc)?,
    )?;
    let coarse_names: BTreeSet<String> = coarse.region_names();
    drop(coarse);

    let fine = read_labels_from_annot(
        &surrogate,
        &cfg.fine_parc,
        &paths.subjects_dir,
        &skips.filter_for(&cfg.fine_parc)?,
    )?;
    info!(
        "{surrogate}: {} {} areas, {} {} labels",
        coarse_names.len(),
        cfg.coarse_parc,
        fine.len(),
        cfg.fine_parc
    );

    let mut rng = ChaCha20Rng::seed_from_u64(cfg.seed);
    let opts = BuildOptions { roi_alpha: cfg.roi_alpha };
    let mut written = Vec::new();

    for (name, spec) in rois.schemes() {
        if name == cfg.coarse_parc {
            warn!("skipping scheme {name:?}: it names the coarse atlas");
            continue;
        }
        if !cfg.schemes.is_empty() && !cfg.schemes.iter().any(|s| s == name) {
            debug!("scheme {name:?} not selected");
            continue;
        }
        let labels = build_parcellation(&coarse_names, &fine, spec, &colors, &mut rng, &opts)
            .with_context(|| format!("building scheme {name:?}"))?;
        let n_rois: usize = spec.0.iter().map(|(_, regions)| regions.len()).sum();
        let files = write_labels_to_annot(
            &labels,
            &surrogate,
            name,
            &paths.subjects_dir,
            fine.vertex_counts(),
            cfg.overwrite,
        )
        .with_context(|| format!("writing scheme {name:?}"))?;
        info!("{name}: {} labels", labels.len());
        written.push(SchemeSummary {
            name: name.to_string(),
            n_rois,
            n_remainders: labels.len() - n_rois,
            files,
        });
    }

    Ok(written)
}
