mod common;
use common::{study, SURROGATE};

use f2f_preproc::annot::annot_path;
use f2f_preproc::{
    make_custom_parcellations, read_labels_from_annot, ColorTable, Hemisphere, LabelFilter,
    ParcellationConfig,
};

const ROIS: &str = "\
aparc:
  lh:
    precentral: [precentral_*]
hickok_corbetta:
  lh:
    premotor: [precentral_1, precentral_2]
    FEF: [superiorfrontal_*]
  rh:
    sensorimotor: [postcentral_1]
f2f_custom:
  rh:
    inferiorfrontal: [superiorfrontal_2]
";

#[test]
fn writes_every_scheme_but_the_coarse_one() {
    let s = study(ROIS);
    let out = make_custom_parcellations(&s.params, &ParcellationConfig::default()).unwrap();

    let names: Vec<_> = out.iter().map(|x| x.name.as_str()).collect();
    assert_eq!(names, vec!["hickok_corbetta", "f2f_custom"]);
    assert_eq!(out[0].n_rois, 3);
    // lh: precentral(_3), postcentral(_1); rh: precentral, superiorfrontal
    assert_eq!(out[0].n_remainders, 4);
    assert_eq!(out[0].files.len(), 2);

    for hemi in Hemisphere::BOTH {
        assert!(annot_path(&s.subjects_dir, SURROGATE, hemi, "f2f_custom").exists());
    }
}

#[test]
fn written_scheme_reads_back_with_roi_colors() {
    let s = study(ROIS);
    make_custom_parcellations(&s.params, &ParcellationConfig::default()).unwrap();

    let set = read_labels_from_annot(SURROGATE, "hickok_corbetta", &s.subjects_dir, &LabelFilter::accept_all())
        .unwrap();
    let colors = ColorTable::study_default();
    let premotor = set.get("premotor-lh").unwrap();
    assert_eq!(premotor.color.to_bytes(), colors.get("premotor").unwrap().to_bytes());
    assert_eq!(premotor.vertices, (30..40).collect::<std::collections::BTreeSet<u32>>());
    assert!(set.contains("precentral-lh"));
    assert!(!set.contains("superiorfrontal-lh"));
    assert!(set.contains("superiorfrontal-rh"));
    assert!(!set.contains("postcentral-rh"));
}

#[test]
fn same_seed_same_bytes() {
    let s = study(ROIS);
    let path = annot_path(&s.subjects_dir, SURROGATE, Hemisphere::Rh, "hickok_corbetta");

    make_custom_parcellations(&s.params, &ParcellationConfig::default()).unwrap();
    let first = std::fs::read(&path).unwrap();
    make_custom_parcellations(&s.params, &ParcellationConfig::default()).unwrap();
    let second = std::fs::read(&path).unwrap();
    assert_eq!(first, second);

    let other = ParcellationConfig { seed: 2, ..ParcellationConfig::default() };
    make_custom_parcellations(&s.params, &other).unwrap();
    let third = std::fs::read(&path).unwrap();
    assert_ne!(first, third);
}

#[test]
fn no_overwrite_refuses_second_run() {
    let s = study(ROIS);
    let cfg = ParcellationConfig { overwrite: false, ..ParcellationConfig::default() };
    make_custom_parcellations(&s.params, &cfg).unwrap();
    assert!(make_custom_parcellations(&s.params, &cfg).is_err());
}

#[test]
fn failing_scheme_is_not_written() {
    let rois = "\
first:
  lh:
    premotor: [precentral_1]
second:
  lh:
    premotor: [precentral_1]
    sensorimotor: [precentral_1]
";
    let s = study(rois);
    let err = make_custom_parcellations(&s.params, &ParcellationConfig::default()).unwrap_err();
    assert!(format!("{err:#}").contains("second"), "{err:#}");
    assert!(annot_path(&s.subjects_dir, SURROGATE, Hemisphere::Lh, "first").exists());
    assert!(!annot_path(&s.subjects_dir, SURROGATE, Hemisphere::Lh, "second").exists());
}

#[test]
fn color_overrides_are_applied() {
    let s = study("custom:\n  lh:\n    my_region: [precentral_1]\n");
    std::fs::write(s.params.file("colors.yaml"), "my_region: \"#123456\"\n").unwrap();
    make_custom_parcellations(&s.params, &ParcellationConfig::default()).unwrap();
    let set = read_labels_from_annot(SURROGATE, "custom", &s.subjects_dir, &LabelFilter::accept_all())
        .unwrap();
    assert_eq!(set.get("my_region-lh").unwrap().color.to_bytes(), [0x12, 0x34, 0x56, 255]);
}

#[test]
fn scheme_selection_builds_only_named_schemes() {
    let s = study(ROIS);
    let cfg = ParcellationConfig { schemes: vec!["f2f_custom".into()], ..ParcellationConfig::default() };
    let out = make_custom_parcellations(&s.params, &cfg).unwrap();
    let names: Vec<_> = out.iter().map(|x| x.name.as_str()).collect();
    assert_eq!(names, vec!["f2f_custom"]);
    assert!(annot_path(&s.subjects_dir, SURROGATE, Hemisphere::Lh, "f2f_custom").exists());
    assert!(!annot_path(&s.subjects_dir, SURROGATE, Hemisphere::Lh, "hickok_corbetta").exists());
}

#[test]
fn unknown_selected_scheme_is_an_error() {
    let s = study(ROIS);
    let cfg = ParcellationConfig { schemes: vec!["nope".into()], ..ParcellationConfig::default() };
    let err = make_custom_parcellations(&s.params, &cfg).unwrap_err();
    assert!(err.to_string().contains("nope"), "{err}");
    assert!(!annot_path(&s.subjects_dir, SURROGATE, Hemisphere::Lh, "f2f_custom").exists());
}
