//! Labels ↔ annotation files, the equivalents of MNE's
//! `read_labels_from_annot` / `write_labels_to_annot`.
//!
//! Files live at `{subjects_dir}/{subject}/label/{hemi}.{parc}.annot`.
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info};

use super::format::{annot_value, read_annot_file, write_annot_file, Annotation, CtabEntry};
use crate::color::Rgba;
use crate::label::{Hemisphere, Label, LabelFilter, LabelSet, VertexCounts};

/// Path of one hemisphere's annotation for `subject`.
pub fn annot_path(subjects_dir: &Path, subject: &str, hemi: Hemisphere, parc: &str) -> PathBuf {
    subjects_dir
        .join(subject)
        .join("label")
        .join(format!("{hemi}.{parc}.annot"))
}

// ── Annotation → labels ───────────────────────────────────────────────────

/// One label per color-table entry that covers at least one vertex.
pub fn labels_from_annotation(annot: &Annotation, hemi: Hemisphere) -> Vec<Label> {
    let mut by_value: HashMap<i32, Vec<u32>> = HashMap::new();
    for (vno, &value) in annot.values.iter().enumerate() {
        by_value.entry(value).or_default().push(vno as u32);
    }

    annot
        .ctab
        .iter()
        .filter_map(|entry| {
            let vertices = by_value.get(&entry.annot_value())?;
            let [r, g, b, t] = entry.rgbt.map(|c| c.clamp(0, 255) as u8);
            let color = Rgba::from_bytes([r, g, b, 255 - t]);
            Some(Label::new(
                format!("{}{}", entry.name, hemi.suffix()),
                hemi,
                vertices.iter().copied(),
                color,
            ))
        })
        .collect()
}

/// Read both hemispheres of parcellation `parc` for `subject`.
///
/// Labels rejected by `filter` are dropped. The vertex count of each
/// hemisphere is recorded on the returned set.
pub fn read_labels_from_annot(
    subject: &str,
    parc: &str,
    subjects_dir: &Path,
    filter: &LabelFilter,
) -> Result<LabelSet> {
    let mut set = LabelSet::new();
    for hemi in Hemisphere::BOTH {
        let path = annot_path(subjects_dir, subject, hemi, parc);
        let annot = read_annot_file(&path)?;
        set.set_vertex_count(hemi, annot.n_vertices());
        let mut kept = 0usize;
        for label in labels_from_annotation(&annot, hemi) {
            if filter.accepts(&label.name) {
                set.insert(label);
                kept += 1;
            }
        }
        debug!("{}: {kept} labels on {} vertices", path.display(), annot.n_vertices());
    }
    if set.is_empty() {
        bail!("parcellation {parc:?} of {subject} has no labels left after filtering");
    }
    Ok(set)
}

// ── Labels → annotation ───────────────────────────────────────────────────

/// Encode the labels of one hemisphere.
///
/// Rejects labels on another hemisphere, names without the hemisphere
/// suffix, duplicate names, colors that quantise to the same 8-bit value
/// (or to black, which marks unlabeled vertices), out-of-range vertices and
/// vertices claimed by two labels.
pub fn annotation_from_labels(
    labels: &[&Label],
    hemi: Hemisphere,
    n_vertices: usize,
    table_name: &str,
) -> Result<Annotation> {
    let mut values = vec![0_i32; n_vertices];
    let mut owner: Vec<Option<usize>> = vec![None; n_vertices];
    let mut ctab = Vec::with_capacity(labels.len());
    let mut names = BTreeSet::new();
    let mut colors: HashMap<i32, &str> = HashMap::new();

    for (i, label) in labels.iter().enumerate() {
        if label.hemi != hemi {
            bail!("label {} is on {}, expected {hemi}", label.name, label.hemi);
        }
        let Some(region) = label.name.strip_suffix(hemi.suffix()) else {
            bail!("label name {:?} does not end with {:?}", label.name, hemi.suffix());
        };
        if !names.insert(region) {
            bail!("duplicate label name {:?}", label.name);
        }

        let [r, g, b, a] = label.color.to_bytes();
        let value = annot_value(r as i32, g as i32, b as i32);
        if value == 0 {
            bail!("label {} has color #000000, which is reserved for unlabeled vertices", label.name);
        }
        if let Some(prev) = colors.insert(value, label.name.as_str()) {
            bail!("labels {prev} and {} share the color #{r:02X}{g:02X}{b:02X}", label.name);
        }

        for &v in &label.vertices {
            let v = v as usize;
            if v >= n_vertices {
                bail!("label {} has vertex {v} but {hemi} has {n_vertices} vertices", label.name);
            }
            if let Some(j) = owner[v] {
                bail!("vertex {v} belongs to both {} and {}", labels[j].name, label.name);
            }
            owner[v] = Some(i);
            values[v] = value;
        }

        ctab.push(CtabEntry {
            index: i as i32,
            name: region.to_string(),
            rgbt: [r as i32, g as i32, b as i32, 255 - a as i32],
        });
    }

    Ok(Annotation { values, orig_tab: table_name.to_string(), ctab })
}

/// Write `labels` as parcellation `parc` of `subject`, one file per
/// hemisphere. Returns the written paths.
///
/// Both hemispheres are encoded and validated before anything is written.
/// A hemisphere without labels is still written (all vertices unlabeled)
/// when its vertex count is known.
pub fn write_labels_to_annot(
    labels: &[Label],
    subject: &str,
    parc: &str,
    subjects_dir: &Path,
    vertex_counts: &VertexCounts,
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    let mut pending = Vec::with_capacity(2);
    for hemi in Hemisphere::BOTH {
        let hemi_labels: Vec<&Label> = labels.iter().filter(|l| l.hemi == hemi).collect();
        let Some(&n_vertices) = vertex_counts.get(&hemi) else {
            if hemi_labels.is_empty() {
                continue;
            }
            bail!("vertex count of {hemi} is unknown; cannot write {} labels", hemi_labels.len());
        };
        let path = annot_path(subjects_dir, subject, hemi, parc);
        if !overwrite && path.exists() {
            bail!("{} exists and overwrite is off", path.display());
        }
        let annot = annotation_from_labels(&hemi_labels, hemi, n_vertices, parc)
            .with_context(|| format!("encoding {hemi} labels of {parc:?}"))?;
        pending.push((path, annot));
    }

    let mut written = Vec::with_capacity(pending.len());
    for (path, annot) in pending {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create {}", dir.display()))?;
        }
        write_annot_file(&path, &annot)?;
        info!("wrote {} ({} labels)", path.display(), annot.ctab.len());
        written.push(path);
    }
    Ok(written)
}
