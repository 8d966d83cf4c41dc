//! Reconcile command implementation.

use super::io::{backup_file, read_table, write_json, CliResult};
use ctlsync_reconcile::{reconcile_tables, ColumnSpec, ReconcileStats};
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for one reconcile run.
#[derive(Debug)]
pub struct ReconcileArgs<'a> {
    /// Master table file.
    pub master: &'a Path,
    /// Target table file.
    pub target: &'a Path,
    /// Column names.
    pub columns: ColumnSpec,
    /// Report only.
    pub dry_run: bool,
    /// Where to back up the target before overwriting it.
    pub backup_dir: Option<&'a Path>,
    /// Where to write the result. Defaults to the target file.
    pub output: Option<&'a Path>,
}

/// What a reconcile run did.
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Change statistics.
    pub stats: ReconcileStats,
    /// File written, if any.
    pub written: Option<PathBuf>,
    /// Backup created, if any.
    pub backup: Option<PathBuf>,
}

/// Runs the reconcile command.
pub fn run(args: &ReconcileArgs<'_>) -> CliResult<ReconcileOutcome> {
    let master = read_table(args.master)?;
    let target = read_table(args.target)?;
    info!(
        master_rows = master.rows.len(),
        target_rows = target.rows.len(),
        "loaded tables"
    );

    let result = reconcile_tables(&master, &target, &args.columns)?;
    let stats = result.stats;
    let verb = if args.dry_run { "Would update" } else { "Updated" };

    for change in &stats.changes {
        println!(
            "  {} '{}': +{} mapping(s) ({})",
            verb,
            change.capability,
            change.added.len(),
            change.added.join(", ")
        );
    }

    println!();
    println!("Reconciliation summary:");
    println!("  Master capabilities: {}", stats.master_keys);
    println!("  Rows updated:        {}", stats.rows_updated);
    println!("  Mappings added:      {}", stats.tags_added);
    if !stats.unmatched.is_empty() {
        println!("  Not in master:       {}", stats.unmatched.len());
        for key in &stats.unmatched {
            println!("    - {}", key);
        }
    }

    let output = args.output.unwrap_or(args.target);
    let in_place = output == args.target;

    if stats.is_noop() {
        println!("\nTarget is already up to date.");
    } else if args.dry_run {
        println!("\n(dry run - no changes were written)");
    }

    // A separate output file is always produced, even when nothing changed.
    if args.dry_run || (stats.is_noop() && in_place) {
        return Ok(ReconcileOutcome {
            stats,
            written: None,
            backup: None,
        });
    }

    let backup = if in_place {
        let dir = args
            .backup_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_backup_dir(args.target));
        let path = backup_file(args.target, &dir)?;
        println!("\n✓ Backup created: {}", path.display());
        Some(path)
    } else {
        None
    };

    write_json(output, &result.table)?;
    println!("✓ Wrote {}", output.display());

    Ok(ReconcileOutcome {
        stats,
        written: Some(output.to_path_buf()),
        backup,
    })
}

fn default_backup_dir(target: &Path) -> PathBuf {
    target
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("backups")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctlsync_reconcile::Table;
    use std::fs;
    use tempfile::tempdir;

    const CAP: &str = "Solution Capability";
    const MAP: &str = "Suggested Mappings";

    fn setup(dir: &Path) -> (PathBuf, PathBuf) {
        let master = Table::new([CAP, MAP])
            .with_row([(CAP, "Access Control:"), (MAP, "AC-1\nAC-2")]);
        let target = Table::new([CAP, MAP, "Notes"])
            .with_row([(CAP, "Access Control"), (MAP, "AC-1"), ("Notes", "keep")])
            .with_row([(CAP, "Unknown"), (MAP, "")]);
        let master_path = dir.join("master.json");
        let target_path = dir.join("target.json");
        write_json(&master_path, &master).unwrap();
        write_json(&target_path, &target).unwrap();
        (master_path, target_path)
    }

    fn args<'a>(master: &'a Path, target: &'a Path) -> ReconcileArgs<'a> {
        ReconcileArgs {
            master,
            target,
            columns: ColumnSpec::default(),
            dry_run: false,
            backup_dir: None,
            output: None,
        }
    }

    #[test]
    fn writes_in_place_with_backup() {
        let dir = tempdir().unwrap();
        let (master, target) = setup(dir.path());
        let before = fs::read_to_string(&target).unwrap();

        let outcome = run(&args(&master, &target)).unwrap();

        assert_eq!(outcome.stats.rows_updated, 1);
        assert_eq!(outcome.stats.unmatched, vec!["Unknown".to_string()]);
        let backup = outcome.backup.unwrap();
        assert!(backup.starts_with(dir.path().join("backups")));
        assert_eq!(fs::read_to_string(backup).unwrap(), before);

        let updated = read_table(&target).unwrap();
        assert_eq!(updated.rows[0].get(MAP).unwrap(), "AC-1\nAC-2");
        assert_eq!(updated.rows[0].get("Notes").unwrap(), "keep");

        // second pass has nothing to do
        let again = run(&args(&master, &target)).unwrap();
        assert!(again.stats.is_noop());
        assert!(again.written.is_none());
    }

    #[test]
    fn dry_run_leaves_files_alone() {
        let dir = tempdir().unwrap();
        let (master, target) = setup(dir.path());
        let before = fs::read_to_string(&target).unwrap();

        let mut dry = args(&master, &target);
        dry.dry_run = true;
        let outcome = run(&dry).unwrap();

        assert_eq!(outcome.stats.tags_added, 1);
        assert!(outcome.written.is_none());
        assert_eq!(fs::read_to_string(&target).unwrap(), before);
        assert!(!dir.path().join("backups").exists());
    }

    #[test]
    fn separate_output_skips_backup() {
        let dir = tempdir().unwrap();
        let (master, target) = setup(dir.path());
        let output = dir.path().join("out.json");

        let mut to_output = args(&master, &target);
        to_output.output = Some(&output);
        let outcome = run(&to_output).unwrap();

        assert!(outcome.backup.is_none());
        assert_eq!(outcome.written.as_deref(), Some(output.as_path()));
        assert_eq!(read_table(&target).unwrap().rows[0].get(MAP).unwrap(), "AC-1");
    }

    #[test]
    fn unchanged_table_still_written_to_output() {
        let dir = tempdir().unwrap();
        let (master, target) = setup(dir.path());
        run(&args(&master, &target)).unwrap();
        let output = dir.path().join("out.json");

        let mut to_output = args(&master, &target);
        to_output.output = Some(&output);
        let outcome = run(&to_output).unwrap();

        assert!(outcome.stats.is_noop());
        assert_eq!(outcome.written.as_deref(), Some(output.as_path()));
        assert_eq!(read_table(&output).unwrap(), read_table(&target).unwrap());

        to_output.dry_run = true;
        fs::remove_file(&output).unwrap();
        assert!(run(&to_output).unwrap().written.is_none());
        assert!(!output.exists());
    }

    #[test]
    fn unknown_column_fails_before_writing() {
        let dir = tempdir().unwrap();
        let (master, target) = setup(dir.path());

        let mut wrong = args(&master, &target);
        wrong.columns = ColumnSpec::new(CAP, "Mappings");
        let err = run(&wrong).unwrap_err();

        assert!(err.to_string().contains("Mappings"));
        assert!(!dir.path().join("backups").exists());
    }
}
