//! Application layer: resolves configuration and runs one command.
//!
//! This is the only place that combines command-line flags with the loaded
//! [`AppConfig`]; everything below it receives explicit options.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use yansi::Paint;

use crate::actions::organize::{plan_organize, CategoryRouter};
use crate::actions::tags::{plan_move_by_tags, read_tags, tag_tree, write_tags};
use crate::actions::{
    plan_dedupe, undo_log, BatchError, BatchReport, ConflictPolicy, HardlinkFallback,
    MutationConfig, MutationEngine, PlannedMutation, UndoOptions,
};
use crate::cache::HashCache;
use crate::cli::{
    CacheArgs, CacheCommand, Cli, Commands, DedupeArgs, MoveByTagsArgs, MutationArgs, OrganizeArgs,
    ScanArgs, TagArgs, UndoArgs,
};
use crate::config::AppConfig;
use crate::duplicates::group_by_fingerprint;
use crate::error::ExitCode;
use crate::output::jsonl::{read_json_lines, JsonLinesWriter};
use crate::output::CsvOutput;
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::path_utils::absolute_path;
use crate::scanner::{FileRecord, Scanner};

/// Run the parsed command line.
///
/// # Errors
///
/// Returns an error for anything that stops the command as a whole: bad
/// configuration, an unreadable input file, an unwritable output or log.
/// Per-file problems are reported in the summary and reflected in the
/// returned [`ExitCode`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    if cli.no_color {
        yansi::disable();
    }
    let config = AppConfig::load(cli.config.as_deref())?;
    log::debug!("log level: {}", crate::logging::current_level_name());
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet));

    match &cli.command {
        Commands::Scan(args) => run_scan(&config, args, progress),
        Commands::Dedupe(args) => run_dedupe(&config, args, progress),
        Commands::Organize(args) => run_organize(&config, args, progress),
        Commands::Tag(args) => run_tag(&config, args),
        Commands::MoveByTags(args) => run_move_by_tags(&config, args, progress),
        Commands::Undo(args) => run_undo(&config, args),
        Commands::Cache(args) => run_cache(&config, args),
        Commands::Config => {
            print!("{}", config.to_toml().context("cannot render configuration")?);
            Ok(ExitCode::Success)
        }
    }
}

/// Stdout, or a buffered file created with its parent directories.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
            let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
    }
}

fn run_scan(config: &AppConfig, args: &ScanArgs, progress: Arc<dyn ProgressCallback>) -> Result<ExitCode> {
    let mut scan_config = config.scan.clone();
    if args.min_size.is_some() {
        scan_config.min_size = args.min_size;
    }
    if args.max_size.is_some() {
        scan_config.max_size = args.max_size;
    }
    if args.max_files.is_some() {
        scan_config.max_files = args.max_files;
    }
    scan_config.skip_extensions.extend(args.skip_extensions.iter().cloned());
    scan_config.skip_globs.extend(args.ignore_patterns.iter().cloned());
    scan_config.namespaces.extend(args.namespaces.iter().copied());
    scan_config.follow_symlinks |= args.follow_symlinks;
    scan_config.hash_large_files |= args.hash_large_files;

    let mut scanner = Scanner::new(scan_config.to_scan_options()).with_progress(progress);
    if !args.no_cache {
        let cache_path = args.cache.clone().or_else(|| config.resolved_cache_path());
        if let Some(cache) = cache_path.as_deref().and_then(HashCache::open_or_warn) {
            scanner = scanner.with_cache(Arc::new(cache));
        }
    }

    let mut scan = scanner.scan(&args.path)?;
    let mut writer = JsonLinesWriter::new(open_output(args.output.as_deref())?);
    for record in scan.by_ref() {
        writer.write(&record)?;
    }
    writer.finish()?.flush().context("cannot flush scan report")?;

    let stats = scan.into_stats();
    log::info!("{}", stats.summary());
    for skipped in &stats.skipped {
        log::debug!("Skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    Ok(if stats.skipped.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    })
}

fn mutation_config(args: &MutationArgs, conflict: ConflictPolicy) -> MutationConfig {
    let conflict = if args.rename_conflicts {
        ConflictPolicy::Rename
    } else {
        conflict
    };
    MutationConfig::default()
        .with_dry_run(args.dry_run)
        .with_conflict(conflict)
}

fn log_path(config: &AppConfig, args: &MutationArgs) -> Result<PathBuf> {
    match args.log.clone().or_else(|| config.resolved_undo_log()) {
        Some(path) => Ok(path),
        None => bail!("no operation log path: pass --log or set undo_log"),
    }
}

/// Run `plan` and map the outcome to an exit code.
fn execute(
    config: &AppConfig,
    args: &MutationArgs,
    engine_config: MutationConfig,
    plan: &[PlannedMutation],
    progress: Arc<dyn ProgressCallback>,
) -> Result<ExitCode> {
    let engine = if engine_config.dry_run {
        MutationEngine::preview(engine_config)
    } else {
        let path = log_path(config, args)?;
        log::info!("Recording changes in {}", path.display());
        MutationEngine::open(engine_config, &path)?
    }
    .with_progress(progress);

    match engine.execute(plan) {
        Ok(report) => Ok(finish_report(&report)),
        Err(BatchError::LogWrite { source, report }) => {
            print_report(&report);
            eprintln!("{} {}", "Batch aborted:".red().bold(), source);
            Ok(ExitCode::BatchAborted)
        }
    }
}

fn print_report(report: &BatchReport) {
    let summary = report.summary();
    if report.all_succeeded() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.yellow());
    }
    for mutation in &report.planned {
        println!("  {mutation}");
    }
}

fn finish_report(report: &BatchReport) -> ExitCode {
    print_report(report);
    ExitCode::for_outcome(report.skipped_count(), report.failure_count())
}

fn run_dedupe(config: &AppConfig, args: &DedupeArgs, progress: Arc<dyn ProgressCallback>) -> Result<ExitCode> {
    let mut dedupe = config.dedupe.clone();
    if let Some(namespace) = args.namespace {
        dedupe.namespace = namespace;
    }
    if let Some(policy) = args.policy {
        dedupe.policy = policy;
    }
    if let Some(link_mode) = args.link_mode {
        dedupe.link_mode = link_mode;
    }
    if args.quarantine.is_some() {
        dedupe.quarantine.clone_from(&args.quarantine);
    }
    dedupe.preserve_tree |= args.preserve_tree;
    dedupe.ignore_globs.extend(args.ignore_patterns.iter().cloned());
    if args.copy_fallback {
        dedupe.hardlink_fallback = HardlinkFallback::Copy;
    }

    let records: Vec<FileRecord> = read_json_lines(&args.report)
        .with_context(|| format!("cannot read scan report {}", args.report.display()))?;
    let (groups, stats) = group_by_fingerprint(&records, dedupe.namespace);
    log::info!(
        "{} group(s) in namespace '{}' over {} file(s), {} reclaimable",
        stats.duplicate_groups,
        dedupe.namespace,
        stats.total_files,
        bytesize::ByteSize::b(stats.wasted_space)
    );

    if let Some(csv_path) = &args.csv {
        CsvOutput::new(&groups, dedupe.policy)
            .write_to_path(csv_path)
            .with_context(|| format!("cannot write {}", csv_path.display()))?;
    }
    if groups.is_empty() {
        println!("No duplicates found");
        return Ok(ExitCode::NoDuplicates);
    }

    let plan = plan_dedupe(&groups, &dedupe.to_dedupe_options())?;
    let engine_config = mutation_config(&args.mutation, dedupe.conflict)
        .with_hardlink_fallback(dedupe.hardlink_fallback);
    execute(config, &args.mutation, engine_config, &plan.mutations, progress)
}

fn run_organize(config: &AppConfig, args: &OrganizeArgs, progress: Arc<dyn ProgressCallback>) -> Result<ExitCode> {
    let source = absolute_path(&args.source)
        .with_context(|| format!("cannot resolve {}", args.source.display()))?;
    let dest = absolute_path(&args.dest).with_context(|| format!("cannot resolve {}", args.dest.display()))?;

    let mut options = config.organize.to_organize_options();
    options.preserve_tree |= args.preserve_tree;
    options.skip_globs.extend(args.ignore_patterns.iter().cloned());

    let router = CategoryRouter::from_overrides(&config.organize.overrides(), &source);
    let plan = plan_organize(&source, &dest, &router, &options)?;
    let engine_config = mutation_config(&args.mutation, config.organize.conflict);
    let code = execute(config, &args.mutation, engine_config, &plan.mutations, progress)?;

    if !plan.skipped.is_empty() && code == ExitCode::Success {
        return Ok(ExitCode::PartialSuccess);
    }
    Ok(code)
}

fn run_tag(config: &AppConfig, args: &TagArgs) -> Result<ExitCode> {
    if config.tag_rules.is_empty() {
        log::warn!("No tag_rules configured; nothing will be tagged");
    }
    let records = tag_tree(&args.root, &config.tag_rules, &config.organize.to_tag_options())?;

    match &args.output {
        Some(path) => write_tags(path, &records)?,
        None => {
            let mut writer = JsonLinesWriter::new(open_output(None)?);
            for record in &records {
                writer.write(record)?;
            }
            writer.finish()?.flush()?;
        }
    }
    Ok(ExitCode::Success)
}

fn run_move_by_tags(
    config: &AppConfig,
    args: &MoveByTagsArgs,
    progress: Arc<dyn ProgressCallback>,
) -> Result<ExitCode> {
    let records = read_tags(&args.tags_file)
        .with_context(|| format!("cannot read tag file {}", args.tags_file.display()))?;
    let dest = absolute_path(&args.dest).with_context(|| format!("cannot resolve {}", args.dest.display()))?;
    let plan = plan_move_by_tags(&records, &dest, &args.tags, &args.ignore_patterns);
    if plan.is_empty() {
        println!("No files carry every requested tag");
        return Ok(ExitCode::Success);
    }
    let engine_config = mutation_config(&args.mutation, config.organize.conflict);
    execute(config, &args.mutation, engine_config, &plan, progress)
}

fn run_undo(config: &AppConfig, args: &UndoArgs) -> Result<ExitCode> {
    let Some(path) = args.log.clone().or_else(|| config.resolved_undo_log()) else {
        bail!("no operation log path: pass LOG or set undo_log");
    };
    let options = UndoOptions {
        dry_run: args.dry_run,
        backup_dir: args.backup_dir.clone(),
    };
    let report = undo_log(&path, &options)?;

    for action in &report.planned {
        println!("  {action}");
    }
    if report.skipped.is_empty() {
        println!("{}", report.summary().green());
        Ok(ExitCode::Success)
    } else {
        println!("{}", report.summary().yellow());
        Ok(ExitCode::PartialSuccess)
    }
}

fn run_cache(config: &AppConfig, args: &CacheArgs) -> Result<ExitCode> {
    let Some(path) = args.cache.clone().or_else(|| config.resolved_cache_path()) else {
        bail!("no cache path: pass --cache or set cache_path");
    };
    let cache = HashCache::new(&path)?;
    match args.command {
        CacheCommand::Stats => println!("{}: {} entries", path.display(), cache.len()?),
        CacheCommand::Clear => println!("Removed {} entries from {}", cache.clear()?, path.display()),
    }
    cache.close()?;
    Ok(ExitCode::Success)
}
