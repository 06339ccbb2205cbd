use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use f2f_preproc::{config::ParamDir, PipelineJob, ProcessingStages};

#[derive(Parser)]
#[command(name = "prepare_pipeline", about = "Assemble the preprocessing pipeline job for all study subjects")]
struct Args {
    /// Directory holding paths.yaml and subjects.yaml
    #[arg(long, default_value = "params")]
    params: PathBuf,

    /// Base pipeline parameters (YAML)
    #[arg(long, default_value = "mnefun_params.yaml")]
    base: PathBuf,

    /// Job file output path (JSON)
    #[arg(long)]
    output: PathBuf,

    /// Enable every stage instead of the study default (SSS only)
    #[arg(long)]
    all_stages: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let params = ParamDir::new(&args.params);
    let paths = params.paths()?;
    let subjects = params.subjects()?;
    println!("Loaded {} subjects from {}", subjects.len(), args.params.display());

    let stages = if args.all_stages { ProcessingStages::all() } else { ProcessingStages::default() };
    let job = PipelineJob::prepare(&args.base, &paths, &subjects, stages)?;
    for step in job.pending_scaling() {
        println!("  scale {} → {} ({})", step.subject_from, step.subject, step.target_file);
    }

    job.write(&args.output)?;
    println!("Written → {}", args.output.display());
    Ok(())
}
