/// Shared fixtures: a tiny synthetic atlas on a 60-vertex surface per
/// hemisphere, written as real annotation files under a temp study dir.
use std::path::PathBuf;

use f2f_preproc::config::ParamDir;
use f2f_preproc::{write_labels_to_annot, Hemisphere, Label, LabelSet, Rgba, VertexCounts};
use tempfile::TempDir;

pub const SURROGATE: &str = "fsaverage";
pub const N_VERTICES: usize = 60;

/// Coarse areas and their vertex ranges.
pub const COARSE: &[(&str, u32, u32)] = &[
    ("unknown", 0, 10),
    ("superiorfrontal", 10, 30),
    ("precentral", 30, 45),
    ("postcentral", 45, 60),
];

/// Fine subdivisions and their vertex ranges.
pub const FINE: &[(&str, u32, u32)] = &[
    ("unknown", 0, 10),
    ("superiorfrontal_1", 10, 20),
    ("superiorfrontal_2", 20, 30),
    ("precentral_1", 30, 35),
    ("precentral_2", 35, 40),
    ("precentral_3", 40, 45),
    ("postcentral_1", 45, 60),
];

#[allow(unused)]
pub fn vertex_counts() -> VertexCounts {
    Hemisphere::BOTH.into_iter().map(|h| (h, N_VERTICES)).collect()
}

/// Distinct 8-bit colors, one per index.
fn atlas_color(i: usize) -> Rgba {
    Rgba::from_bytes([(20 + i * 25) as u8, 60, 140, 255])
}

fn atlas(regions: &[(&str, u32, u32)]) -> Vec<Label> {
    let mut out = Vec::new();
    for hemi in Hemisphere::BOTH {
        for (i, &(name, lo, hi)) in regions.iter().enumerate() {
            out.push(Label::new(format!("{name}{}", hemi.suffix()), hemi, lo..hi, atlas_color(i)));
        }
    }
    out
}

/// The fine atlas in memory, without "unknown".
#[allow(unused)]
pub fn fine_labels() -> LabelSet {
    let mut set: LabelSet = atlas(FINE)
        .into_iter()
        .filter(|l| !l.name.starts_with("unknown"))
        .collect();
    for hemi in Hemisphere::BOTH {
        set.set_vertex_count(hemi, N_VERTICES);
    }
    set
}

#[allow(unused)]
pub struct Study {
    pub dir: TempDir,
    pub params: ParamDir,
    pub subjects_dir: PathBuf,
}

/// A study directory with both atlases written for the surrogate and the
/// given `rois.yaml`.
#[allow(unused)]
pub fn study(rois_yaml: &str) -> Study {
    let dir = tempfile::tempdir().unwrap();
    let subjects_dir = dir.path().join("subjects");
    let params_dir = dir.path().join("params");
    std::fs::create_dir_all(&params_dir).unwrap();

    write_labels_to_annot(&atlas(COARSE), SURROGATE, "aparc", &subjects_dir, &vertex_counts(), true)
        .unwrap();
    write_labels_to_annot(&atlas(FINE), SURROGATE, "aparc_sub", &subjects_dir, &vertex_counts(), true)
        .unwrap();

    let paths = format!(
        "data_root: {}\nsubjects_dir: {}\nresults_dir: {}\n",
        dir.path().display(),
        subjects_dir.display(),
        dir.path().join("results").display(),
    );
    std::fs::write(params_dir.join("paths.yaml"), paths).unwrap();
    std::fs::write(params_dir.join("surrogate.yaml"), format!("{SURROGATE}\n")).unwrap();
    std::fs::write(params_dir.join("subjects.yaml"), "- f2f_101\n- f2f_108\n").unwrap();
    std::fs::write(
        params_dir.join("skip_labels.yaml"),
        "aparc:\n  - ^unknown\naparc_sub:\n  - ^unknown\n",
    )
    .unwrap();
    std::fs::write(params_dir.join("rois.yaml"), rois_yaml).unwrap();

    Study { params: ParamDir::new(params_dir), subjects_dir, dir }
}
