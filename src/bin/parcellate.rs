use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use f2f_preproc::{config::ParamDir, make_custom_parcellations, ParcellationConfig, DEFAULT_SEED};

#[derive(Parser)]
#[command(name = "parcellate", about = "Write the study's custom parcellations onto the surrogate subject")]
struct Args {
    /// Directory holding paths.yaml, surrogate.yaml, skip_labels.yaml, rois.yaml
    #[arg(long, default_value = "params")]
    params: PathBuf,

    /// Coarse atlas whose areas group the remainder labels
    #[arg(long, default_value = "aparc")]
    coarse: String,

    /// Fine atlas the ROIs are built from
    #[arg(long, default_value = "aparc_sub")]
    fine: String,

    /// Seed of the remainder color generator
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Alpha of ROI colors (default: opaque)
    #[arg(long)]
    roi_alpha: Option<f64>,

    /// Fail instead of replacing existing annotation files
    #[arg(long)]
    no_overwrite: bool,

    /// Build only this scheme (repeatable; default: every scheme in rois.yaml)
    #[arg(long)]
    scheme: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = ParcellationConfig {
        coarse_parc: args.coarse,
        fine_parc: args.fine,
        seed: args.seed,
        roi_alpha: args.roi_alpha,
        overwrite: !args.no_overwrite,
        schemes: args.scheme,
    };

    let schemes = make_custom_parcellations(&ParamDir::new(&args.params), &cfg)?;
    for s in &schemes {
        println!("{}: {} ROIs + {} remainders", s.name, s.n_rois, s.n_remainders);
        for f in &s.files {
            println!("  Written → {}", f.display());
        }
    }
    println!("Produced {} parcellations", schemes.len());

    Ok(())
}
