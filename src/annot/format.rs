//! FreeSurfer `.annot` codec.
//!
//! An annotation assigns one integer value to every vertex of a hemisphere
//! surface and ships a color table that maps values back to region names.
//! On-disk layout (always big-endian):
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  n_vertices : i32                                            │
//! │  n_vertices × ( vertex : i32 │ value : i32 )                 │
//! │  tag : i32   (1 = a color table follows)                     │
//! │  n   : i32   (< 0 → versioned table, -n = version)           │
//! ├──────────── versioned (version 2) ───────────────────────────┤
//! │  max_entries : i32 │ len : i32 │ orig_tab : len bytes        │
//! │  n_entries : i32                                             │
//! │  n_entries × ( index │ len │ name │ r │ g │ b │ t )          │
//! ├──────────── legacy (n > 0 entries) ──────────────────────────┤
//! │  len : i32 │ orig_tab : len bytes                            │
//! │  n × ( len │ name │ r │ g │ b │ t )   index = position       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `value = r + g·2⁸ + b·2¹⁶`; `t` is transparency (`255 - alpha`).
//! Strings are NUL-terminated and their length includes the terminator.
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Color table version written by FreeSurfer ≥ 4.
pub const CTAB_VERSION: i32 = 2;
/// Tag announcing an embedded color table.
pub const TAG_OLD_COLORTABLE: i32 = 1;

/// Upper bound on any on-disk string length; larger values mean corruption.
const MAX_STRING_LEN: i32 = 1 << 16;
/// Upper bound on surface vertices (fsaverage has 163 842).
const MAX_VERTICES: i32 = 1 << 24;
/// Upper bound on color table entries.
const MAX_CTAB_ENTRIES: i32 = 1 << 16;

// ── Types ─────────────────────────────────────────────────────────────────

/// One color-table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtabEntry {
    pub index: i32,
    pub name: String,
    /// `[r, g, b, transparency]`, each `0..=255`.
    pub rgbt: [i32; 4],
}

impl CtabEntry {
    /// The per-vertex value that selects this entry.
    #[inline]
    pub fn annot_value(&self) -> i32 {
        annot_value(self.rgbt[0], self.rgbt[1], self.rgbt[2])
    }
}

/// Encode an 8-bit RGB triple as an annotation value.
#[inline]
pub fn annot_value(r: i32, g: i32, b: i32) -> i32 {
    r + (g << 8) + (b << 16)
}

/// A decoded annotation for one hemisphere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Value per vertex, indexed by vertex number. `0` marks unlabeled vertices.
    pub values: Vec<i32>,
    /// Name of the color table the annotation was built from.
    pub orig_tab: String,
    pub ctab: Vec<CtabEntry>,
}

impl Annotation {
    pub fn n_vertices(&self) -> usize {
        self.values.len()
    }

    /// Vertices carrying `entry`'s value, ascending.
    pub fn vertices_of(&self, entry: &CtabEntry) -> Vec<u32> {
        let v = entry.annot_value();
        self.values
            .iter()
            .enumerate()
            .filter(|&(_, &x)| x == v)
            .map(|(i, _)| i as u32)
            .collect()
    }
}

// ── Reading ───────────────────────────────────────────────────────────────

pub fn read_annot_file(path: &Path) -> Result<Annotation> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_annot(&mut BufReader::new(file))
        .with_context(|| format!("read annotation {}", path.display()))
}

pub fn read_annot<R: Read>(reader: &mut R) -> Result<Annotation> {
    let n = read_i32(reader).context("vertex count")?;
    if !(0..=MAX_VERTICES).contains(&n) {
        bail!("implausible vertex count {n}");
    }
    let n = n as usize;
    let mut values = vec![0_i32; n];
    for _ in 0..n {
        let vno = read_i32(reader)?;
        let value = read_i32(reader)?;
        if vno < 0 || vno as usize >= n {
            bail!("vertex index {vno} out of range for {n} vertices");
        }
        values[vno as usize] = value;
    }

    let tag = read_i32(reader).context("annotation has no color table")?;
    if tag != TAG_OLD_COLORTABLE {
        bail!("unexpected color table tag {tag}");
    }

    let n_or_version = read_i32(reader)?;
    let (orig_tab, ctab) = if n_or_version > 0 {
        if n_or_version > MAX_CTAB_ENTRIES {
            bail!("implausible color table size {n_or_version}");
        }
        read_legacy_ctab(reader, n_or_version as usize)?
    } else {
        let version = -n_or_version;
        if version != CTAB_VERSION {
            bail!("unsupported color table version {version}");
        }
        read_versioned_ctab(reader)?
    };

    Ok(Annotation { values, orig_tab, ctab })
}

fn read_legacy_ctab<R: Read>(reader: &mut R, n: usize) -> Result<(String, Vec<CtabEntry>)> {
    let orig_tab = read_string(reader)?;
    let mut ctab = Vec::with_capacity(n);
    for index in 0..n {
        let name = read_string(reader)?;
        let rgbt = read_rgbt(reader)?;
        ctab.push(CtabEntry { index: index as i32, name, rgbt });
    }
    Ok((orig_tab, ctab))
}

fn read_versioned_ctab<R: Read>(reader: &mut R) -> Result<(String, Vec<CtabEntry>)> {
    let _max_entries = read_i32(reader)?;
    let orig_tab = read_string(reader)?;
    let n_entries = read_i32(reader)?;
    if !(0..=MAX_CTAB_ENTRIES).contains(&n_entries) {
        bail!("implausible color table size {n_entries}");
    }
    let mut ctab = Vec::with_capacity(n_entries as usize);
    for _ in 0..n_entries {
        let index = read_i32(reader)?;
        let name = read_string(reader)?;
        let rgbt = read_rgbt(reader)?;
        ctab.push(CtabEntry { index, name, rgbt });
    }
    Ok((orig_tab, ctab))
}

// ── Writing ───────────────────────────────────────────────────────────────

pub fn write_annot_file(path: &Path, annot: &Annotation) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_annot(&mut w, annot)?;
    w.flush()?;
    Ok(())
}

/// Write `annot` with a version-2 color table.
pub fn write_annot<W: Write>(writer: &mut W, annot: &Annotation) -> Result<()> {
    write_i32(writer, annot.values.len() as i32)?;
    for (vno, &value) in annot.values.iter().enumerate() {
        write_i32(writer, vno as i32)?;
        write_i32(writer, value)?;
    }

    write_i32(writer, TAG_OLD_COLORTABLE)?;
    write_i32(writer, -CTAB_VERSION)?;
    let max_entries = annot.ctab.iter().map(|e| e.index + 1).max().unwrap_or(0);
    write_i32(writer, max_entries)?;
    write_string(writer, &annot.orig_tab)?;
    write_i32(writer, annot.ctab.len() as i32)?;
    for entry in &annot.ctab {
        write_i32(writer, entry.index)?;
        write_string(writer, &entry.name)?;
        for c in entry.rgbt {
            write_i32(writer, c)?;
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────

#[inline]
fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_rgbt<R: Read>(reader: &mut R) -> Result<[i32; 4]> {
    let mut rgbt = [0_i32; 4];
    for c in &mut rgbt {
        *c = read_i32(reader)?;
    }
    Ok(rgbt)
}

/// Length-prefixed, NUL-terminated Latin-1 string.
fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_i32(reader)?;
    if !(0..=MAX_STRING_LEN).contains(&len) {
        bail!("implausible string length {len}");
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(buf[..end].iter().map(|&b| b as char).collect())
}

#[inline]
fn write_i32<W: Write>(writer: &mut W, v: i32) -> Result<()> {
    writer.write_all(&v.to_be_bytes())?;
    Ok(())
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    write_i32(writer, bytes.len() as i32 + 1)?;
    writer.write_all(bytes)?;
    writer.write_all(&[0])?;
    Ok(())
}
