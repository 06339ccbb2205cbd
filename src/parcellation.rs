//! Custom parcellation builder.
//!
//! Merges fine atlas labels (e.g. `aparc_sub`) into the study's regions of
//! interest and groups every label no ROI claimed into one "remainder"
//! region per coarse atlas area (e.g. `aparc`), so the written parcellation
//! still covers the whole cortex.
//!
//! # Algorithm
//! 1. Per hemisphere, per requested region: resolve the label tokens, merge
//!    the labels, name the result `"{region}-{hemi}"` and give it the
//!    region's configured color.
//! 2. Fail if any fine label was claimed by two regions of one hemisphere.
//! 3. Per hemisphere (`lh`, `rh`), per coarse area (sorted): merge the
//!    unclaimed fine labels of that area into `"{area}-{hemi}"` with a
//!    muted dark color drawn from the caller's rng. A draw whose 8-bit
//!    color is black or already taken (by any ROI, or an earlier remainder
//!    of either hemisphere) is redrawn.
//! 4. Return ROIs followed by remainders.
use std::collections::{BTreeSet, HashMap, HashSet};

use log::debug;
use rand::Rng;
use serde::Deserialize;

use crate::annot::annot_value;
use crate::color::{muted_dark, ColorTable, Rgba};
use crate::config::OrderedMap;
use crate::label::{Hemisphere, Label, LabelError, LabelSet};

// ── Region specification ──────────────────────────────────────────────────

/// Requested regions of one scheme: hemisphere → region → label tokens.
///
/// A token is either a fine label name, with or without its hemisphere
/// suffix (`"precentral_1"` or `"precentral_1-lh"`), or a prefix ending in
/// `*` that selects every fine label of the hemisphere starting with it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RegionSpec(pub OrderedMap<Hemisphere, OrderedMap<String, Vec<String>>>);

impl RegionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append region `name` on `hemi` built from `tokens`.
    ///
    /// ```
    /// use f2f_preproc::{Hemisphere, RegionSpec};
    /// let spec = RegionSpec::new()
    ///     .with_region(Hemisphere::Lh, "premotor", ["precentral_1", "precentral_2"]);
    /// assert_eq!(spec.regions(Hemisphere::Lh).unwrap().len(), 1);
    /// ```
    pub fn with_region<I, S>(mut self, hemi: Hemisphere, name: &str, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        *self.0.entry_or_default(hemi).entry_or_default(name.to_string()) = tokens;
        self
    }

    pub fn regions(&self, hemi: Hemisphere) -> Option<&OrderedMap<String, Vec<String>>> {
        self.0.get(&hemi)
    }

    pub fn hemispheres(&self) -> impl Iterator<Item = Hemisphere> + '_ {
        self.0.iter().map(|(h, _)| *h)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParcellationError {
    #[error("unknown label {0:?}")]
    UnknownLabel(String),
    #[error("no color configured for region {0:?}")]
    UnknownColor(String),
    #[error("region {region:?} on {hemi} resolves to no labels")]
    EmptyRegion { region: String, hemi: Hemisphere },
    #[error("label {label:?} is claimed by both {first:?} and {second:?} on {hemi}")]
    DoubleClaim {
        hemi: Hemisphere,
        label: String,
        first: String,
        second: String,
    },
    #[error("no free remainder color left for {0:?}")]
    ColorsExhausted(String),
    #[error(transparent)]
    Label(#[from] LabelError),
}

/// Redraws allowed per remainder before giving up on a free color.
pub const MAX_COLOR_DRAWS: usize = 1000;

fn color_key(c: &Rgba) -> i32 {
    let [r, g, b, _] = c.to_bytes();
    annot_value(r as i32, g as i32, b as i32)
}

/// Draw muted dark colors until one is non-black and not in `taken`.
fn free_muted_dark<R: Rng + ?Sized>(
    rng: &mut R,
    taken: &mut HashSet<i32>,
    name: &str,
) -> Result<Rgba, ParcellationError> {
    for _ in 0..MAX_COLOR_DRAWS {
        let c = muted_dark(rng);
        let key = color_key(&c);
        if key != 0 && taken.insert(key) {
            return Ok(c);
        }
    }
    Err(ParcellationError::ColorsExhausted(name.to_string()))
}

// ── Builder ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BuildOptions {
    /// Alpha of ROI colors; `None` keeps them opaque.
    pub roi_alpha: Option<f64>,
}

/// Fine label names selected by `token` on `hemi`, in label-set order.
///
/// Literal tokens are not checked against `fine`; lookup happens when the
/// labels are merged.
pub fn resolve_token(token: &str, hemi: Hemisphere, fine: &LabelSet) -> Vec<String> {
    match token.strip_suffix('*') {
        Some(prefix) => fine
            .names_matching(prefix, hemi)
            .map(str::to_string)
            .collect(),
        None if token.ends_with(hemi.suffix()) => vec![token.to_string()],
        None => vec![format!("{token}{}", hemi.suffix())],
    }
}

fn merge_named(
    names: &[String],
    fine: &LabelSet,
    new_name: String,
) -> Result<Label, ParcellationError> {
    let parts = names
        .iter()
        .map(|n| fine.get(n).ok_or_else(|| ParcellationError::UnknownLabel(n.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    let mut merged = Label::merge(parts)?;
    merged.name = new_name;
    Ok(merged)
}

/// Build one parcellation scheme.
///
/// `coarse_names` are the coarse atlas area names (no hemisphere suffix).
/// Remainder colors are drawn from `rng` in output order, so a fixed seed
/// reproduces them exactly; ROI colors come from `colors` only. Every
/// remainder gets an 8-bit color no other output label uses.
pub fn build_parcellation<R: Rng + ?Sized>(
    coarse_names: &BTreeSet<String>,
    fine: &LabelSet,
    spec: &RegionSpec,
    colors: &ColorTable,
    rng: &mut R,
    opts: &BuildOptions,
) -> Result<Vec<Label>, ParcellationError> {
    let mut rois = Vec::new();
    // hemi → (fine label → claiming region)
    let mut claimed: HashMap<Hemisphere, HashMap<String, String>> = HashMap::new();

    for (&hemi, regions) in spec.0.iter() {
        let used = claimed.entry(hemi).or_default();
        for (region, tokens) in regions.iter() {
            let names: Vec<String> = tokens
                .iter()
                .flat_map(|t| resolve_token(t, hemi, fine))
                .collect();
            if names.is_empty() {
                return Err(ParcellationError::EmptyRegion { region: region.clone(), hemi });
            }

            for name in &names {
                if let Some(first) = used.insert(name.clone(), region.clone()) {
                    return Err(ParcellationError::DoubleClaim {
                        hemi,
                        label: name.clone(),
                        first,
                        second: region.clone(),
                    });
                }
            }

            let color = colors
                .get(region)
                .ok_or_else(|| ParcellationError::UnknownColor(region.clone()))?;
            let mut roi = merge_named(&names, fine, format!("{region}{}", hemi.suffix()))?;
            roi.color = color.with_alpha(opts.roi_alpha.unwrap_or(1.0));
            debug!("{}: {} labels, {} vertices", roi.name, names.len(), roi.vertices.len());
            rois.push(roi);
        }
    }

    let mut taken: HashSet<i32> = rois.iter().map(|l| color_key(&l.color)).collect();
    let mut remainders = Vec::new();
    for hemi in Hemisphere::BOTH {
        let used = claimed.get(&hemi);
        for area in coarse_names {
            let names: Vec<String> = fine
                .names_matching(area, hemi)
                .filter(|n| used.map_or(true, |u| !u.contains_key(*n)))
                .map(str::to_string)
                .collect();
            if names.is_empty() {
                continue;
            }
            let mut rest = merge_named(&names, fine, format!("{area}{}", hemi.suffix()))?;
            rest.color = free_muted_dark(rng, &mut taken, &rest.name)?;
            remainders.push(rest);
        }
    }

    rois.extend(remainders);
    Ok(rois)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn fine_set(names: &[&str]) -> LabelSet {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let hemi = Hemisphere::of_label_name(n).unwrap();
                Label::new(*n, hemi, [i as u32 * 10, i as u32 * 10 + 1], Rgba::new(0.5, 0.5, 0.5, 1.0))
            })
            .collect()
    }

    #[test]
    fn wildcard_expands_within_hemisphere() {
        let fine = fine_set(&["superiorfrontal_1-lh", "superiorfrontal_2-lh", "superiorfrontal_1-rh"]);
        let got = resolve_token("superiorfrontal*", Hemisphere::Lh, &fine);
        assert_eq!(got, vec!["superiorfrontal_1-lh", "superiorfrontal_2-lh"]);
        let got = resolve_token("superiorfrontal_*", Hemisphere::Rh, &fine);
        assert_eq!(got, vec!["superiorfrontal_1-rh"]);
    }

    #[test]
    fn literal_tokens_get_suffix_once() {
        let fine = LabelSet::new();
        assert_eq!(resolve_token("precentral_1", Hemisphere::Lh, &fine), vec!["precentral_1-lh"]);
        assert_eq!(resolve_token("precentral_1-lh", Hemisphere::Lh, &fine), vec!["precentral_1-lh"]);
    }

    #[test]
    fn alpha_override_applies_to_rois_only() {
        let fine = fine_set(&["a_1-lh", "b_1-lh"]);
        let coarse: BTreeSet<String> = ["a", "b"].into_iter().map(String::from).collect();
        let spec = RegionSpec::new().with_region(Hemisphere::Lh, "roi", ["a_1"]);
        let mut colors = ColorTable::new();
        colors.insert("roi", Rgba::new(1.0, 0.0, 0.0, 1.0));
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let opts = BuildOptions { roi_alpha: Some(0.25) };
        let out = build_parcellation(&coarse, &fine, &spec, &colors, &mut rng, &opts).unwrap();
        assert_eq!(out[0].name, "roi-lh");
        approx::assert_abs_diff_eq!(out[0].color.a, 0.25);
        assert_eq!(out[1].name, "b-lh");
        approx::assert_abs_diff_eq!(out[1].color.a, 1.0);
    }

    #[test]
    fn empty_wildcard_region_fails() {
        let fine = fine_set(&["a_1-lh"]);
        let spec = RegionSpec::new().with_region(Hemisphere::Lh, "roi", ["zzz*"]);
        let mut colors = ColorTable::new();
        colors.insert("roi", Rgba::new(1.0, 0.0, 0.0, 1.0));
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let err = build_parcellation(&BTreeSet::new(), &fine, &spec, &colors, &mut rng, &BuildOptions::default())
            .unwrap_err();
        assert_eq!(err, ParcellationError::EmptyRegion { region: "roi".into(), hemi: Hemisphere::Lh });
    }

    #[test]
    fn same_label_in_both_hemispheres_is_fine() {
        let fine = fine_set(&["a_1-lh", "a_1-rh"]);
        let spec = RegionSpec::new()
            .with_region(Hemisphere::Lh, "roi", ["a_1"])
            .with_region(Hemisphere::Rh, "roi", ["a_1"]);
        let mut colors = ColorTable::new();
        colors.insert("roi", Rgba::new(1.0, 0.0, 0.0, 1.0));
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let out = build_parcellation(&BTreeSet::new(), &fine, &spec, &colors, &mut rng, &BuildOptions::default())
            .unwrap();
        let names: Vec<_> = out.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["roi-lh", "roi-rh"]);
    }

    #[test]
    fn taken_remainder_color_runs_out() {
        // A constant rng yields the same muted color on every draw.
        let fine = fine_set(&["a_1-lh", "b_1-lh"]);
        let coarse: BTreeSet<String> = ["a", "b"].into_iter().map(String::from).collect();
        let mut rng = rand::rngs::mock::StepRng::new(0, 0);
        let err = build_parcellation(&coarse, &fine, &RegionSpec::new(), &ColorTable::new(), &mut rng, &BuildOptions::default())
            .unwrap_err();
        assert_eq!(err, ParcellationError::ColorsExhausted("b-lh".into()));
    }

    #[test]
    fn remainder_avoids_roi_colors() {
        let fine = fine_set(&["a_1-lh", "b_1-lh"]);
        let coarse: BTreeSet<String> = ["b"].into_iter().map(String::from).collect();
        let spec = RegionSpec::new().with_region(Hemisphere::Lh, "roi", ["a_1"]);
        let mut colors = ColorTable::new();
        let mut first_rng = rand::rngs::mock::StepRng::new(0, 0);
        colors.insert("roi", muted_dark(&mut first_rng));
        let mut rng = rand::rngs::mock::StepRng::new(0, 0);
        let err = build_parcellation(&coarse, &fine, &spec, &colors, &mut rng, &BuildOptions::default())
            .unwrap_err();
        assert_eq!(err, ParcellationError::ColorsExhausted("b-lh".into()));
    }
}
