//! tagsample: generate a tag-addressing data sample from scraped data, and
//! evaluate query results against it.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tagsample::config::{init_logging, LogConfig, SampleConfig};
use tagsample::eval::{Evaluation, Round, RoundArgs};
use tagsample::sample::ReportOptions;
use tracing::info;

#[derive(Parser)]
#[command(name = "tagsample", version, about = "Generate a data sample and evaluate query results against it")]
struct Cli {
    /// Base directory holding every artifact
    #[arg(short = 'd', long)]
    base: PathBuf,

    /// YAML file overriding the default pipeline settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More output; repeat for debug and trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// LRU cache entries in front of the producer stores
    #[arg(long)]
    cache: Option<usize>,

    /// Aligned table output for examine
    #[arg(long)]
    pretty: bool,

    /// Also score the address scheme of every report step
    #[arg(long)]
    eaddr: bool,

    /// Skip report steps below this
    #[arg(long, default_value_t = 8)]
    steplo: usize,

    /// Do not unwrap index files smaller than this many bytes
    #[arg(long, default_value_t = 0)]
    skip_lower_than: u64,

    /// One of: inv_pd, inv_dt, generate, writeall, unwrap, examine
    round: Round,

    /// Report files under res/ for examine, or "help"
    args: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose));

    let mut config = match &cli.config {
        Some(path) => SampleConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SampleConfig::default(),
    };
    if let Some(cache) = cli.cache {
        config.cache_size = cache;
    }

    let ev = Evaluation::new(&cli.base, config)?;
    if cli.args.first().is_some_and(|a| a.eq_ignore_ascii_case("help")) {
        let rinfo = cli.round.info();
        eprintln!("{}", rinfo.desc);
        let deps: Vec<&str> = rinfo.deps.iter().map(Round::name).collect();
        eprintln!("These rounds must already have been executed: {}", deps.join(", "));
        let outs: Vec<String> = ev.outputs(cli.round).iter().map(|p| p.display().to_string()).collect();
        eprintln!("These files will be written to: {}", outs.join(", "));
        return Ok(());
    }

    let args = RoundArgs {
        reports: cli.args,
        report: ReportOptions { eaddr: cli.eaddr, pretty: cli.pretty, steplo: cli.steplo },
        skip_lower_than: cli.skip_lower_than,
    };
    info!("tagsample v{}: round {} on {}", tagsample::VERSION, cli.round, ev.base().display());
    let stdout = std::io::stdout();
    ev.run(cli.round, &args, &mut stdout.lock()).with_context(|| format!("round {}", cli.round))?;
    Ok(())
}
