//! Strata CLI
//!
//! Host-side driver around [`Dispatcher`] and the default resource registry.
//! The `strata` binary parses arguments with [`command`] and prints what the
//! functions here return.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = strata_resources::registry()?;
//! let records = strata_cli::read_records("state.json".as_ref())?;
//! let reports = strata_cli::upgrade(&registry, EngineConfig::default(), &records)?;
//! println!("{}", strata_cli::render(&reports, true)?);
//! ```

#![warn(unreachable_pub)]

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use clap::{value_parser, Arg, ArgAction, Command};
use serde::Serialize;
use serde_json::Value as JsonValue;
use strata_engine::{
    AppliedStep, Diagnostics, Dispatcher, EngineConfig, MigrationOutcome, MigrationPlan,
    OutcomeStatus, Registry,
};
use strata_record::{Record, RecordEnvelope, ResourceKind, SchemaVersion};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Argument definitions of the `strata` binary
#[must_use]
pub fn command() -> Command {
    Command::new("strata")
        .version(VERSION)
        .about("Upgrade persisted infrastructure records to current schema versions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("kinds").about("List registered kinds and their current versions"))
        .subcommand(
            Command::new("plan")
                .about("Print the migration plan for a kind and stored version")
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .required(true)
                        .help("Resource kind"),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .required(true)
                        .value_parser(value_parser!(u64))
                        .help("Stored schema version"),
                ),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Migrate one envelope or an array of envelopes")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .help("JSON file holding the record envelope(s)"),
                )
                .arg(config_arg())
                .arg(pretty_arg()),
        )
        .subcommand(
            Command::new("merge")
                .about("Migrate a target record and fold contributor records into it")
                .arg(
                    Arg::new("target")
                        .long("target")
                        .required(true)
                        .help("JSON file holding the target envelope"),
                )
                .arg(
                    Arg::new("contributors")
                        .long("contributors")
                        .required(true)
                        .help("JSON file holding the contributor envelope(s)"),
                )
                .arg(
                    Arg::new("rule")
                        .long("rule")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Merge rule name (repeatable)"),
                )
                .arg(config_arg())
                .arg(pretty_arg()),
        )
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .help("Engine configuration (TOML)")
}

fn pretty_arg() -> Arg {
    Arg::new("pretty")
        .long("pretty")
        .action(ArgAction::SetTrue)
        .help("Pretty-print JSON output")
}

/// One registered kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    /// Kind name
    pub kind: ResourceKind,
    /// Current schema version
    pub current_version: SchemaVersion,
}

/// Every registered kind, sorted by name
#[must_use]
pub fn kinds(registry: &Registry) -> Vec<KindSummary> {
    registry
        .kinds()
        .filter_map(|kind| {
            registry.current_version(kind.as_str()).map(|current_version| KindSummary {
                kind: kind.clone(),
                current_version,
            })
        })
        .collect()
}

/// Resolve a migration plan
///
/// # Errors
/// Returns error for an unknown kind, a future version, or a gap in the chain
pub fn plan(registry: &Registry, kind: &str, from: u64) -> anyhow::Result<MigrationPlan> {
    registry
        .plan(kind, SchemaVersion::new(from))
        .with_context(|| format!("no migration plan for {kind} v{from}"))
}

/// Load engine configuration, or the defaults when no file is given
///
/// # Errors
/// Returns error if the file cannot be read or is not a valid configuration
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Read one envelope or a JSON array of envelopes
///
/// # Errors
/// Returns error if the file cannot be read or an element is not an envelope
pub fn read_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let json: JsonValue = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let items = match json {
        JsonValue::Array(items) => items,
        single => vec![single],
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<RecordEnvelope>(item)
                .map(Record::from)
                .with_context(|| format!("{}: element {i} is not a record envelope", path.display()))
        })
        .collect()
}

/// JSON shape printed for each migration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeReport {
    /// Outcome status code
    pub status: OutcomeStatus,
    /// Records the host must persist (empty on failure)
    pub records: Vec<RecordEnvelope>,
    /// Indices of absorbed contributors (merge only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub absorbed: Vec<usize>,
    /// Steps that ran
    pub steps: Vec<AppliedStep>,
    /// Warnings and errors
    pub diagnostics: Diagnostics,
}

impl OutcomeReport {
    /// Build the printable report of an outcome
    ///
    /// # Errors
    /// Returns error if an output record cannot be encoded as an envelope
    pub fn from_outcome(outcome: &MigrationOutcome) -> anyhow::Result<Self> {
        let records = outcome
            .records()
            .into_iter()
            .map(Record::to_envelope)
            .collect::<Result<Vec<_>, _>>()
            .context("output record cannot be encoded")?;
        let absorbed = match outcome {
            MigrationOutcome::Merged { absorbed, .. } => absorbed.clone(),
            _ => Vec::new(),
        };
        Ok(Self {
            status: outcome.status(),
            records,
            absorbed,
            steps: outcome.report().steps.clone(),
            diagnostics: outcome.diagnostics().clone(),
        })
    }

    /// Check if the migration failed
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// Migrate every record, keeping input order
///
/// # Errors
/// Returns error if an output record cannot be encoded
pub fn upgrade(
    registry: &Registry,
    config: EngineConfig,
    records: &[Record],
) -> anyhow::Result<Vec<OutcomeReport>> {
    let dispatcher = Dispatcher::new(registry, config);
    dispatcher
        .dispatch_all(records)
        .iter()
        .map(OutcomeReport::from_outcome)
        .collect()
}

/// Run one merge group with the named rules
///
/// # Errors
/// Returns error for an unknown rule name or an unencodable output record
pub fn merge(
    registry: &Registry,
    config: EngineConfig,
    target: &Record,
    contributors: &[Record],
    rule_names: &[String],
) -> anyhow::Result<OutcomeReport> {
    if rule_names.is_empty() {
        bail!("at least one merge rule is required");
    }
    let rules = rule_names
        .iter()
        .map(|name| {
            strata_resources::merge_rule(name).ok_or_else(|| anyhow!("unknown merge rule '{name}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let outcome = Dispatcher::new(registry, config).dispatch_merge(target, contributors, &rules);
    OutcomeReport::from_outcome(&outcome)
}

/// Serialize as compact or pretty JSON
///
/// # Errors
/// Returns error if serialization fails
pub fn render<T: Serialize + ?Sized>(value: &T, pretty: bool) -> anyhow::Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn write_json(value: &JsonValue) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{value}").unwrap();
        file
    }

    fn registry() -> Registry {
        strata_resources::registry().unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn parses_repeated_rules() {
        let matches = command()
            .try_get_matches_from([
                "strata",
                "merge",
                "--target",
                "t.json",
                "--contributors",
                "c.json",
                "--rule",
                "split_tunnel_exclude",
                "--rule",
                "split_tunnel_include",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "merge");
        let rules: Vec<&String> = args.get_many::<String>("rule").unwrap().collect();
        assert_eq!(rules, ["split_tunnel_exclude", "split_tunnel_include"]);
    }

    #[test]
    fn lists_kinds() {
        let kinds = kinds(&registry());
        let dns = kinds.iter().find(|k| k.kind.as_str() == "dns_record").unwrap();
        assert_eq!(dns.current_version, SchemaVersion::new(2));
        assert_eq!(kinds.len(), 8);
    }

    #[test]
    fn plan_for_unknown_kind_fails() {
        let err = plan(&registry(), "nope", 0).unwrap_err();
        assert!(err.to_string().contains("nope"), "{err}");
        assert_eq!(plan(&registry(), "dns_record", 0).unwrap().steps.len(), 2);
    }

    #[test]
    fn reads_single_envelope_and_array() {
        let one = json!({"kind": "dns_record", "schema_version": 2, "attributes": {"name": "www"}});
        let file = write_json(&one);
        assert_eq!(read_records(file.path()).unwrap().len(), 1);

        let many = write_json(&json!([one.clone(), one]));
        assert_eq!(read_records(many.path()).unwrap().len(), 2);

        let bad = write_json(&json!([{"kind": "dns_record"}]));
        let err = read_records(bad.path()).unwrap_err();
        assert!(format!("{err:#}").contains("element 0"), "{err:#}");
    }

    #[test]
    fn loads_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "warnings_as_errors = true").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert!(config.warnings_as_errors);
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn upgrade_reports_each_input() {
        let file = write_json(&json!([
            {"kind": "tiered_cache", "schema_version": 0, "attributes": {"zone_id": "z", "cache_type": "smart"}},
            {"kind": "nope", "schema_version": 0, "attributes": {}}
        ]));
        let records = read_records(file.path()).unwrap();
        let reports = upgrade(&registry(), EngineConfig::default(), &records).unwrap();

        assert_eq!(reports[0].status, OutcomeStatus::SplitPending);
        assert_eq!(reports[0].records.len(), 2);
        assert_eq!(reports[0].records[1].kind.as_str(), "argo_tiered_caching");
        assert!(reports[1].is_failed());
        assert!(reports[1].records.is_empty());

        let rendered: JsonValue = serde_json::from_str(&render(&reports, false).unwrap()).unwrap();
        assert_eq!(rendered[1]["status"], "failed");
        assert_eq!(rendered[1]["diagnostics"][0]["code"], "unknown_kind");
    }

    #[test]
    fn merge_with_unknown_rule_fails() {
        let target = strata_test_utils::record!("device_default_profile", 1, {"account_id": "acc"});
        let err = merge(&registry(), EngineConfig::default(), &target, &[], &["nope".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn merge_absorbs_contributors() {
        let target = strata_test_utils::record!("device_default_profile", 1, {"account_id": "acc"});
        let contributors = vec![strata_test_utils::record!("split_tunnel", 0, {
            "account_id": "acc",
            "mode": "include",
            "tunnels": [{"host": "intranet.example.com"}]
        })];
        let report = merge(
            &registry(),
            EngineConfig::default(),
            &target,
            &contributors,
            &["split_tunnel_include".to_string()],
        )
        .unwrap();
        assert_eq!(report.status, OutcomeStatus::Merged);
        assert_eq!(report.absorbed, vec![0]);
        assert!(report.records[0].attributes.contains_key("include"));
    }
}
