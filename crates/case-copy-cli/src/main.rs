//! CaseCopy CLI: `casecopy` command.
//!
//! Imports case records into an on-disk store, copies them to a new owner
//! with optional de-identification, and inspects the results.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};

use case_copy::time::micros_to_rfc3339;
use case_copy::{
    Case, CaseCopier, CaseId, CensorMap, CopyConfig, CopyRequest, CopyResult, CyclePolicy,
    DeidTransforms, FileCaseStore, TransformRegistry,
};

// ── Argument helpers ──────────────────────────────────────────────────────────

/// Parse `FIELD=TRANSFORM` pairs into a censor map.
fn parse_censor(pairs: &[String]) -> Result<CensorMap> {
    let mut map = CensorMap::new();
    for pair in pairs {
        let (field, transform) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("censor rule '{pair}' must look like FIELD=TRANSFORM"))?;
        let (field, transform) = (field.trim(), transform.trim());
        if field.is_empty() || transform.is_empty() {
            bail!("censor rule '{pair}' must look like FIELD=TRANSFORM");
        }
        if map.insert(field.to_string(), transform.to_string()).is_some() {
            bail!("field '{field}' is censored more than once");
        }
    }
    Ok(map)
}

fn parse_cycle_policy(s: &str) -> Result<CyclePolicy> {
    match s {
        "drop" | "drop_back_reference" => Ok(CyclePolicy::DropBackReference),
        "report" | "report_error" => Ok(CyclePolicy::ReportError),
        other => Err(anyhow!(
            "unknown cycle policy '{other}' (expected drop or report)"
        )),
    }
}

/// Read a JSON file holding one case or an array of cases.
fn read_cases(path: &Path) -> Result<Vec<Case>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let cases = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|case| vec![case])
    };
    cases.with_context(|| format!("{} does not contain case records", path.display()))
}

fn open_store(dir: &Path) -> Result<FileCaseStore> {
    FileCaseStore::new(dir)
        .with_context(|| format!("failed to open case store at {}", dir.display()))
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// CaseCopy CLI: duplicate case records to a new owner, keeping their
/// parent links and masking the fields you name.
#[derive(Parser, Debug)]
#[command(
    name = "casecopy",
    about = "CaseCopy CLI",
    version,
    long_about = "casecopy: CaseCopy CLI\n\nCopy hierarchical case records to a new owner, preserving parent\nlinks and applying field-level de-identification."
)]
struct Cli {
    /// Case store directory
    #[arg(long, global = true, default_value = "./case-store")]
    store: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import cases from a JSON file (one case or an array)
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// List cases in a domain
    List {
        /// Project space to list
        #[arg(long)]
        domain: String,

        /// Only cases owned by this owner
        #[arg(long)]
        owner: Option<String>,
    },

    /// Show one case as JSON
    Show {
        #[arg(long)]
        domain: String,

        /// Case ID
        case_id: String,
    },

    /// Copy cases (and the parents they reference) to a new owner
    Copy {
        #[arg(long)]
        domain: String,

        /// Owner of the copies
        #[arg(long)]
        owner: String,

        /// Censor a field: FIELD=TRANSFORM (repeatable)
        #[arg(long = "censor", value_name = "FIELD=TRANSFORM")]
        censor: Vec<String>,

        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Submitter recorded on the submission (overrides config)
        #[arg(long)]
        submitter: Option<String>,

        /// Cycle policy: drop or report (overrides config)
        #[arg(long)]
        cycles: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Source case IDs
        #[arg(required = true)]
        case_ids: Vec<String>,
    },

    /// List committed copy submissions for a domain
    History {
        #[arg(long)]
        domain: String,
    },

    /// List available de-identification transforms
    Transforms,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let verbose = cli.verbose;
    let store_dir = cli.store.clone();

    let result = match cli.command {
        Commands::Import { file } => cmd_import(&store_dir, &file, verbose),
        Commands::List { domain, owner } => {
            cmd_list(&store_dir, &domain, owner.as_deref(), verbose)
        }
        Commands::Show { domain, case_id } => cmd_show(&store_dir, &domain, &case_id),
        Commands::Copy {
            domain,
            owner,
            censor,
            config,
            submitter,
            cycles,
            json,
            case_ids,
        } => cmd_copy(
            &store_dir,
            &domain,
            &owner,
            &case_ids,
            &censor,
            CopyOptions {
                config: config.as_deref(),
                submitter: submitter.as_deref(),
                cycles: cycles.as_deref(),
                json,
            },
            verbose,
        ),
        Commands::History { domain } => cmd_history(&store_dir, &domain, verbose),
        Commands::Transforms => cmd_transforms(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `casecopy import FILE`
fn cmd_import(store_dir: &Path, file: &Path, verbose: bool) -> Result<()> {
    let store = open_store(store_dir)?;
    let cases = read_cases(file)?;

    for case in &cases {
        store
            .save(case)
            .with_context(|| format!("failed to save case {}", case.case_id))?;
        if verbose {
            println!("  {}/{} ({})", case.domain, case.case_id, case.case_type);
        }
    }

    println!("Imported {} case(s) into {}", cases.len(), store_dir.display());
    Ok(())
}

/// `casecopy list --domain D [--owner O]`
fn cmd_list(store_dir: &Path, domain: &str, owner: Option<&str>, verbose: bool) -> Result<()> {
    let store = open_store(store_dir)?;
    let cases: Vec<Case> = store
        .load_all(domain)?
        .into_iter()
        .filter(|c| owner.map(|o| c.owner_id == o).unwrap_or(true))
        .collect();

    if cases.is_empty() {
        println!("No cases found in domain '{domain}'");
        return Ok(());
    }

    println!("{:<38} {:<14} {:<14} NAME", "ID", "TYPE", "OWNER");
    println!("{}", "-".repeat(86));
    for case in &cases {
        println!(
            "{:<38} {:<14} {:<14} {}",
            case.case_id, case.case_type, case.owner_id, case.name
        );
        if verbose {
            for (identifier, index) in &case.indices {
                println!(
                    "    {identifier} -> {} ({}, {})",
                    index.referenced_case_id,
                    index.referenced_case_type,
                    index.relationship.as_tag()
                );
            }
        }
    }
    println!("\n{} case(s)", cases.len());
    Ok(())
}

/// `casecopy show --domain D CASE_ID`
fn cmd_show(store_dir: &Path, domain: &str, case_id: &str) -> Result<()> {
    let store = open_store(store_dir)?;
    let case = store.load(domain, &CaseId::new(case_id))?;
    println!("{}", serde_json::to_string_pretty(&case)?);
    Ok(())
}

struct CopyOptions<'a> {
    config: Option<&'a Path>,
    submitter: Option<&'a str>,
    cycles: Option<&'a str>,
    json: bool,
}

/// `casecopy copy --domain D --owner O [--censor F=T]... CASE_ID...`
fn cmd_copy(
    store_dir: &Path,
    domain: &str,
    owner: &str,
    case_ids: &[String],
    censor: &[String],
    options: CopyOptions<'_>,
    verbose: bool,
) -> Result<()> {
    let mut config = match options.config {
        Some(path) => CopyConfig::load(path)?,
        None => CopyConfig::default(),
    };
    if let Some(submitter) = options.submitter {
        config = config.with_submitter(submitter);
    }
    if let Some(policy) = options.cycles {
        config = config.with_cycle_policy(parse_cycle_policy(policy)?);
    }

    let request = CopyRequest::new(domain, owner)
        .with_cases(case_ids.iter().map(String::as_str));
    let request = CopyRequest {
        censor_map: parse_censor(censor)?,
        ..request
    };
    log::debug!("copy request: {request:?}");

    let store = open_store(store_dir)?;
    let transforms = DeidTransforms::builtin();
    let result = CaseCopier::new(&store, &store, &transforms)
        .with_config(config)
        .duplicate(&request)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result, verbose);
    }

    if result.is_failure() {
        bail!("no cases were copied");
    }
    Ok(())
}

fn print_result(result: &CopyResult, verbose: bool) {
    println!("Copied {} case(s)", result.success_count());
    if let Some(id) = &result.submission_id {
        println!("Submission: {id}");
    }
    for (original, new_id) in &result.id_pairs {
        println!("  {original} -> {new_id}");
    }

    if !result.errors.is_empty() {
        println!("\nErrors:");
        for error in &result.errors {
            println!("  {error}");
        }
    }

    if !result.diagnostics.missing.is_empty() {
        println!("\nNot found:");
        for id in &result.diagnostics.missing {
            println!("  {id}");
        }
    }

    let dropped = &result.diagnostics.dropped_indices;
    if verbose && !dropped.is_empty() {
        println!("\nDropped references:");
        for d in dropped {
            println!(
                "  {}.{} -> {} ({:?})",
                d.case_id, d.identifier, d.referenced_case_id, d.reason
            );
        }
    } else if !dropped.is_empty() {
        println!("\n{} reference(s) dropped (use -v for details)", dropped.len());
    }
}

/// `casecopy history --domain D`
fn cmd_history(store_dir: &Path, domain: &str, verbose: bool) -> Result<()> {
    let store = open_store(store_dir)?;
    let manifests = store.submissions(domain)?;

    if manifests.is_empty() {
        println!("No submissions found in domain '{domain}'");
        return Ok(());
    }

    println!("{:<30} {:<16} {:<24} SAVED", "SUBMISSION", "BY", "AT");
    println!("{}", "-".repeat(78));
    for manifest in &manifests {
        println!(
            "{:<30} {:<16} {:<24} {}",
            manifest.submission_id,
            manifest.submitted_by,
            micros_to_rfc3339(manifest.submitted_at),
            manifest.saved.len()
        );
        if verbose {
            for (original, new_id) in &manifest.saved {
                println!("    {original} -> {new_id}");
            }
        }
    }
    Ok(())
}

/// `casecopy transforms`
fn cmd_transforms() -> Result<()> {
    for name in DeidTransforms::builtin().names() {
        println!("{name}");
    }
    Ok(())
}
