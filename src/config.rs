//! Study configuration.
//!
//! Everything except [`ParcellationConfig`] is read from YAML files in the
//! study's `params/` directory:
//!
//! | file               | contents                                          |
//! |--------------------|---------------------------------------------------|
//! | `paths.yaml`       | `data_root`, `subjects_dir`, `results_dir`        |
//! | `subjects.yaml`    | list of subject ids                               |
//! | `surrogate.yaml`   | template subject id                               |
//! | `skip_labels.yaml` | parcellation → regexes of labels to ignore        |
//! | `rois.yaml`        | scheme → hemisphere → region → label tokens       |
//! | `colors.yaml`      | optional region → `#RRGGBB` overrides             |
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::color::ColorTable;
use crate::label::LabelFilter;
use crate::parcellation::RegionSpec;

/// Seed of the remainder-color generator (the one millionth prime).
pub const DEFAULT_SEED: u64 = 15_485_863;

// ── YAML helper ───────────────────────────────────────────────────────────

/// Read and deserialize one YAML file.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

// ── Ordered maps ──────────────────────────────────────────────────────────

/// A YAML mapping deserialized in document order.
///
/// Region order in `rois.yaml` decides label order in the written
/// annotation, so plain hash or tree maps are not an option. Duplicate keys
/// are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<K, V>(pub Vec<(K, V)>);

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<K: PartialEq, V> OrderedMap<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Value for `key`, inserting `V::default()` at the end when absent.
    pub fn entry_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let idx = match self.0.iter().position(|(k, _)| *k == key) {
            Some(i) => i,
            None => {
                self.0.push((key, V::default()));
                self.0.len() - 1
            }
        };
        &mut self.0[idx].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de, K, V> Deserialize<'de> for OrderedMap<K, V>
where
    K: Deserialize<'de> + PartialEq + fmt::Debug,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<K, V>(PhantomData<(K, V)>);

        impl<'de, K, V> Visitor<'de> for OrderedVisitor<K, V>
        where
            K: Deserialize<'de> + PartialEq + fmt::Debug,
            V: Deserialize<'de>,
        {
            type Value = OrderedMap<K, V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(OrderedMap::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out: Vec<(K, V)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((k, v)) = map.next_entry::<K, V>()? {
                    if out.iter().any(|(seen, _)| *seen == k) {
                        return Err(serde::de::Error::custom(format!("duplicate key {k:?}")));
                    }
                    out.push((k, v));
                }
                Ok(OrderedMap(out))
            }
        }

        deserializer.deserialize_any(OrderedVisitor(PhantomData))
    }
}

// ── File-backed config ────────────────────────────────────────────────────

/// Study directories (`paths.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Paths {
    /// Root of the raw MEG data; the pipeline runner's work dir.
    pub data_root: PathBuf,
    /// FreeSurfer subjects directory.
    pub subjects_dir: PathBuf,
    pub results_dir: PathBuf,
}

/// Per-parcellation label skip lists (`skip_labels.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SkipLabels(pub BTreeMap<String, Vec<String>>);

impl SkipLabels {
    /// Filter for labels of `parc`. A parcellation without an entry keeps
    /// every label.
    pub fn filter_for(&self, parc: &str) -> Result<LabelFilter> {
        match self.0.get(parc) {
            Some(patterns) => LabelFilter::new(patterns)
                .with_context(|| format!("skip patterns for {parc:?}")),
            None => Ok(LabelFilter::accept_all()),
        }
    }
}

/// Requested parcellation schemes (`rois.yaml`), in file order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RoiConfig(pub OrderedMap<String, RegionSpec>);

impl RoiConfig {
    pub fn schemes(&self) -> impl Iterator<Item = (&str, &RegionSpec)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The set of YAML files in a `params/` directory.
#[derive(Debug, Clone)]
pub struct ParamDir {
    pub root: PathBuf,
}

impl ParamDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn paths(&self) -> Result<Paths> {
        load_yaml(&self.file("paths.yaml"))
    }

    pub fn subjects(&self) -> Result<Vec<String>> {
        load_yaml(&self.file("subjects.yaml"))
    }

    /// The template subject carrying the parcellations.
    pub fn surrogate(&self) -> Result<String> {
        load_yaml(&self.file("surrogate.yaml"))
    }

    pub fn skip_labels(&self) -> Result<SkipLabels> {
        load_yaml(&self.file("skip_labels.yaml"))
    }

    pub fn rois(&self) -> Result<RoiConfig> {
        load_yaml(&self.file("rois.yaml"))
    }

    /// Study colors, overridden by `colors.yaml` when present.
    pub fn colors(&self) -> Result<ColorTable> {
        let mut table = ColorTable::study_default();
        let path = self.file("colors.yaml");
        if path.exists() {
            let hex: BTreeMap<String, String> = load_yaml(&path)?;
            let extra = ColorTable::from_hex_map(&hex)
                .with_context(|| format!("parsing {}", path.display()))?;
            table.merge(extra);
        }
        Ok(table)
    }
}

// ── Builder settings ──────────────────────────────────────────────────────

/// Settings of a parcellation run.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use f2f_preproc::ParcellationConfig;
///
/// let cfg = ParcellationConfig {
///     seed: 1,
///     roi_alpha: Some(0.8),
///     ..ParcellationConfig::default()
/// };
/// assert_eq!(cfg.fine_parc, "aparc_sub");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParcellationConfig {
    /// Atlas whose region names group the remainder labels.
    ///
    /// A scheme of this name in `rois.yaml` is not built.
    ///
    /// Default: `"aparc"`.
    pub coarse_parc: String,

    /// Atlas whose labels are merged into ROIs and remainders.
    ///
    /// Default: `"aparc_sub"`.
    pub fine_parc: String,

    /// Seed of the remainder color generator.
    ///
    /// Default: [`DEFAULT_SEED`].
    pub seed: u64,

    /// Alpha of ROI colors. `None` keeps them opaque.
    ///
    /// Default: `None`.
    pub roi_alpha: Option<f64>,

    /// Replace annotation files left by a previous run.
    ///
    /// Default: `true`.
    pub overwrite: bool,

    /// Names of the `rois.yaml` schemes to build. Empty builds all.
    ///
    /// Default: empty.
    pub schemes: Vec<String>,
}

impl Default for ParcellationConfig {
    fn default() -> Self {
        Self {
            coarse_parc: "aparc".into(),
            fine_parc: "aparc_sub".into(),
            seed: DEFAULT_SEED,
            roi_alpha: None,
            overwrite: true,
            schemes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Hemisphere;

    #[test]
    fn ordered_map_keeps_document_order() {
        let m: OrderedMap<String, i32> = serde_yaml::from_str("zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        let keys: Vec<_> = m.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(m.get(&"alpha".to_string()), Some(&2));
    }

    #[test]
    fn ordered_map_rejects_duplicates() {
        let r: Result<OrderedMap<String, i32>, _> = serde_yaml::from_str("a: 1\na: 2\n");
        assert!(r.is_err());
    }

    #[test]
    fn rois_yaml_parses() {
        let yaml = "\
aparc:
  lh: {}
hickok_corbetta:
  lh:
    premotor: [precentral_1, precentral_2]
    FEF: [caudalmiddlefrontal_*]
  rh:
    VFC: [parsopercularis_1]
";
        let rois: RoiConfig = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<_> = rois.schemes().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["aparc", "hickok_corbetta"]);
        let (_, spec) = rois.schemes().nth(1).unwrap();
        let lh = spec.regions(Hemisphere::Lh).unwrap();
        let regions: Vec<_> = lh.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(regions, vec!["premotor", "FEF"]);
        assert_eq!(lh.get(&"FEF".to_string()).unwrap(), &vec!["caudalmiddlefrontal_*".to_string()]);
    }

    #[test]
    fn unknown_hemisphere_is_a_parse_error() {
        let r: Result<RoiConfig, _> = serde_yaml::from_str("s:\n  both:\n    x: [a]\n");
        assert!(r.is_err());
    }

    #[test]
    fn skip_labels_build_filters() {
        let skips: SkipLabels =
            serde_yaml::from_str("aparc:\n  - ^unknown\n  - ^corpuscallosum\n").unwrap();
        let f = skips.filter_for("aparc").unwrap();
        assert!(!f.accepts("unknown-lh"));
        assert!(f.accepts("precentral-lh"));
        assert!(skips.filter_for("aparc_sub").unwrap().accepts("unknown-lh"));
    }

    #[test]
    fn paths_yaml_parses() {
        let p: Paths = serde_yaml::from_str(
            "data_root: /data\nsubjects_dir: /data/anat\nresults_dir: /data/results\n",
        )
        .unwrap();
        assert_eq!(p.subjects_dir, PathBuf::from("/data/anat"));
    }

    #[test]
    fn defaults() {
        let cfg = ParcellationConfig::default();
        assert_eq!(cfg.coarse_parc, "aparc");
        assert_eq!(cfg.seed, 15485863);
        assert!(cfg.overwrite);
    }
}
