use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::ArgMatches;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn path_arg(args: &ArgMatches, name: &str) -> anyhow::Result<PathBuf> {
    args.get_one::<String>(name)
        .map(PathBuf::from)
        .with_context(|| format!("--{name} is required"))
}

fn config(args: &ArgMatches) -> anyhow::Result<strata_engine::EngineConfig> {
    let path = args.get_one::<String>("config").map(PathBuf::from);
    strata_cli::load_config(path.as_deref())
}

fn run() -> anyhow::Result<ExitCode> {
    let matches = strata_cli::command().get_matches();
    let registry = strata_resources::registry().context("failed to build registry")?;

    match matches.subcommand() {
        Some(("kinds", _)) => {
            for summary in strata_cli::kinds(&registry) {
                println!("{:<24} v{}", summary.kind, summary.current_version.get());
            }
        }
        Some(("plan", args)) => {
            let kind = args
                .get_one::<String>("kind")
                .context("--kind is required")?;
            let from = *args.get_one::<u64>("from").context("--from is required")?;
            let plan = strata_cli::plan(&registry, kind, from)?;
            println!("{}", strata_cli::render(&plan, true)?);
        }
        Some(("upgrade", args)) => {
            let records = strata_cli::read_records(&path_arg(args, "input")?)?;
            let reports = strata_cli::upgrade(&registry, config(args)?, &records)?;
            println!("{}", strata_cli::render(&reports, args.get_flag("pretty"))?);

            let failed = reports.iter().filter(|r| r.is_failed()).count();
            if failed > 0 {
                tracing::error!("{failed} of {} record(s) failed to migrate", reports.len());
                return Ok(ExitCode::FAILURE);
            }
        }
        Some(("merge", args)) => {
            let targets = strata_cli::read_records(&path_arg(args, "target")?)?;
            let [target] = targets.as_slice() else {
                anyhow::bail!("--target must hold exactly one envelope, found {}", targets.len());
            };
            let contributors = strata_cli::read_records(&path_arg(args, "contributors")?)?;
            let rules: Vec<String> = args
                .get_many::<String>("rule")
                .map(|rules| rules.cloned().collect())
                .unwrap_or_default();
            let report = strata_cli::merge(&registry, config(args)?, target, &contributors, &rules)?;
            println!("{}", strata_cli::render(&report, args.get_flag("pretty"))?);
            if report.is_failed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        _ => {}
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
