//! Label display colors.
//!
//! Colors are stored as RGBA in `[0, 1]` (the convention MNE uses for
//! `Label.color`) and only quantised to 8 bits when written to an annotation.
use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use rand::Rng;

// ── Rgba ──────────────────────────────────────────────────────────────────

/// An RGBA color with every channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from a `#RRGGBB` (or `RRGGBB`) hex string.
    ///
    /// ```
    /// use f2f_preproc::color::Rgba;
    /// let c = Rgba::from_hex("#FF0000").unwrap();
    /// assert_eq!(c.to_bytes(), [255, 0, 0, 255]);
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            bail!("expected a #RRGGBB color, got {hex:?}");
        }
        let channel = |i: usize| -> Result<f64> {
            let v = u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex color {hex:?}"))?;
            Ok(v as f64 / 255.0)
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, 1.0))
    }

    /// Same color with a different alpha.
    #[inline]
    pub fn with_alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }

    /// Quantise to 8-bit `[r, g, b, a]` (round half away from zero, clamped).
    pub fn to_bytes(&self) -> [u8; 4] {
        let q = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Inverse of [`Rgba::to_bytes`].
    pub fn from_bytes([r, g, b, a]: [u8; 4]) -> Self {
        let f = |v: u8| v as f64 / 255.0;
        Self::new(f(r), f(g), f(b), f(a))
    }
}

/// Draw a dark, desaturated opaque color.
///
/// Three uniform draws are flipped into `(0, 1]`, pulled halfway toward
/// their mean and divided by 10, so every channel lands in `(0, 0.1]`.
/// Consumes exactly three `f64` draws from `rng`.
pub fn muted_dark<R: Rng + ?Sized>(rng: &mut R) -> Rgba {
    let mut rgb = [0.0_f64; 3];
    for v in &mut rgb {
        *v = 1.0 - rng.gen::<f64>();
    }
    let mean = rgb.iter().sum::<f64>() / 3.0;
    for v in &mut rgb {
        *v = (*v + mean) / 2.0 / 10.0;
    }
    Rgba::new(rgb[0], rgb[1], rgb[2], 1.0)
}

// ── Color table ───────────────────────────────────────────────────────────

/// Region name → color lookup used for requested ROIs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorTable {
    colors: BTreeMap<String, Rgba>,
}

const fn hex_digit(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => panic!("invalid hex digit"),
    }
}

/// `#RRGGBB` → 8-bit RGB, evaluated at compile time for constants.
const fn rgb(hex: &str) -> [u8; 3] {
    let b = hex.as_bytes();
    assert!(b.len() == 7 && b[0] == b'#', "expected #RRGGBB");
    [
        hex_digit(b[1]) * 16 + hex_digit(b[2]),
        hex_digit(b[3]) * 16 + hex_digit(b[4]),
        hex_digit(b[5]) * 16 + hex_digit(b[6]),
    ]
}

/// Colors of every ROI used by the study's parcellation schemes.
const STUDY_COLORS: &[(&str, [u8; 3])] = &[
    // hickok_corbetta
    ("FEF", rgb("#882E72")),
    ("IPS", rgb("#1965B0")),
    ("TPJ", rgb("#7BAFDE")),
    ("VFC", rgb("#4EB265")),
    ("articulatory", rgb("#4EB265")), // LH analog of VFC
    ("combinatorial", rgb("#CAE0AB")),
    ("lexical", rgb("#F7F056")),
    ("phonetics", rgb("#F4A736")),
    ("phonology", rgb("#E8601C")),
    ("premotor", rgb("#DC050C")),
    ("sensorimotor", rgb("#72190E")),
    // f2f_custom
    ("superiortemporal", rgb("#4477AA")),
    ("inferiorfrontal", rgb("#CCBB44")),
    ("inferiorparietal", rgb("#AA3377")),
    // friederici
    ("primary_auditory", rgb("#EE7733")),
    ("phonological_wordform", rgb("#33BBEE")),
    ("morphosyntax_and_lexicon", rgb("#EE3377")),
    ("prosody", rgb("#009988")),
];

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table of study ROI colors.
    pub fn study_default() -> Self {
        let mut table = Self::new();
        for &(name, [r, g, b]) in STUDY_COLORS {
            table.insert(name, Rgba::from_bytes([r, g, b, 255]));
        }
        table
    }

    /// Parse a `name → "#RRGGBB"` map.
    pub fn from_hex_map<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut table = Self::new();
        for (name, hex) in entries {
            let c = Rgba::from_hex(hex).with_context(|| format!("color for region {name:?}"))?;
            table.insert(name.clone(), c);
        }
        Ok(table)
    }

    pub fn insert(&mut self, name: impl Into<String>, color: Rgba) {
        self.colors.insert(name.into(), color);
    }

    /// Entries of `other` take precedence.
    pub fn merge(&mut self, other: ColorTable) {
        self.colors.extend(other.colors);
    }

    pub fn get(&self, name: &str) -> Option<Rgba> {
        self.colors.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
