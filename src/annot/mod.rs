//! FreeSurfer annotation files.
//!
//! # Quick start
//! ```no_run
//! use f2f_preproc::annot::read_labels_from_annot;
//! use f2f_preproc::label::LabelFilter;
//! use std::path::Path;
//!
//! let labels = read_labels_from_annot(
//!     "fsaverage", "aparc", Path::new("subjects"), &LabelFilter::accept_all(),
//! ).unwrap();
//! println!("{} labels", labels.len());
//! ```
pub mod format;
pub mod labels;

pub use format::{
    annot_value, read_annot, read_annot_file, write_annot, write_annot_file,
    Annotation, CtabEntry, CTAB_VERSION,
};
pub use labels::{
    annot_path, annotation_from_labels, labels_from_annotation,
    read_labels_from_annot, write_labels_to_annot,
};
