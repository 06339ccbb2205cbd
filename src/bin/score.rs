use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use f2f_preproc::events::score_subject;

#[derive(Parser)]
#[command(name = "score", about = "Recode one subject's raw trigger events into analysis codes (attend 31, ignore 55)")]
struct Args {
    /// Subject id (selects the trigger rule)
    #[arg(long)]
    subject: String,

    /// Raw event files (MNE text format), one per run
    #[arg(long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Scored event files, same order as --input
    #[arg(long, required = true, num_args = 1..)]
    output: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let counts = score_subject(&args.subject, &args.input, &args.output)?;
    let total: usize = counts.iter().sum();
    println!("{}: {} runs, {total} events", args.subject, counts.len());
    Ok(())
}
