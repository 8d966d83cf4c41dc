//! Evidence commands against the remote record store.

use super::io::{write_json, CliResult};
use ctlsync_remote::{
    plan_create, resolve_record, search_records, Association, BulkOptions, BulkSync,
    ClientConfig, HttpClient, HttpRecordStore, ItemStatus, PlannedAction, Record, RecordInput,
    RecordRef, RecordStore, ReqwestClient, RetryingClient, SubjectType, SyncError, SyncReport,
};
use std::path::Path;
use tracing::{info, warn};

/// Builds an HTTP-backed store. Fails before any remote call on bad settings.
pub fn connect(api_url: &str, api_key: &str) -> CliResult<HttpRecordStore<ReqwestClient>> {
    let config = ClientConfig::new(api_url, api_key);
    let client = RetryingClient::new(config, ReqwestClient::new()?)?;
    Ok(HttpRecordStore::new(client))
}

/// Checks connectivity and credentials.
pub fn probe<S: RecordStore + ?Sized>(store: &S) -> CliResult<()> {
    match store.probe() {
        Ok(()) => {
            println!("✓ Connection successful");
            Ok(())
        }
        Err(SyncError::AuthenticationFailed) => {
            Err("authentication failed: check CTLSYNC_API_KEY".into())
        }
        Err(SyncError::Forbidden) => {
            Err("access forbidden: the API key lacks permission for evidence".into())
        }
        Err(e) => Err(format!("connection failed: {}", e).into()),
    }
}

/// Lists every record.
pub fn list<S: RecordStore + ?Sized>(store: &S, format: &str) -> CliResult<usize> {
    let records = store.list_all()?;
    print_records(&records, format)?;
    Ok(records.len())
}

/// Shows one record.
pub fn get<S: RecordStore + ?Sized>(store: &S, reference: &RecordRef) -> CliResult<Record> {
    let record = resolve_record(store, reference)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(record)
}

/// Options for a create run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateArgs {
    /// Duplicate handling.
    pub options: BulkOptions,
    /// Report only.
    pub dry_run: bool,
}

/// Creates records in input order and prints per-item progress.
///
/// Returns an error if any item failed, after the whole batch has run.
pub fn create<S: RecordStore + ?Sized>(
    store: &S,
    items: &[RecordInput],
    args: CreateArgs,
) -> CliResult<SyncReport> {
    if items.is_empty() {
        println!("No records to create.");
        return Ok(SyncReport::default());
    }

    if args.dry_run {
        let existing = if args.options.check_duplicates {
            store.list_cached().unwrap_or_else(|e| {
                warn!(error = %e, "could not fetch existing records");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        let plan = plan_create(items, &existing, args.options);
        println!("(dry run - nothing will be created)");
        for (i, item) in plan.iter().enumerate() {
            match &item.action {
                PlannedAction::Create => {
                    println!("  [{}/{}] would create '{}'", i + 1, plan.len(), item.name)
                }
                PlannedAction::Skip { existing_id } => println!(
                    "  [{}/{}] would skip '{}' (exists as {})",
                    i + 1,
                    plan.len(),
                    item.name,
                    existing_id
                ),
            }
        }
        return Ok(SyncReport::default());
    }

    let report = BulkSync::new(store)
        .with_options(args.options)
        .create_all(items, None, |p| {
            if p.status != ItemStatus::Processing {
                println!("  [{}/{}] {:<8} {}", p.current, p.total, p.status, p.label);
            }
        });

    println!();
    println!("Created: {}", report.created);
    println!("Skipped: {}", report.skipped);
    println!("Failed:  {}", report.failed);
    for item in &report.skipped_items {
        println!("  ~ {} (exists as {})", item.name, item.existing_id);
    }
    for item in &report.failed_items {
        println!("  ✗ {}: {}", item.name, item.error);
    }

    if report.has_failures() {
        return Err(format!("{} of {} record(s) failed", report.failed, report.total).into());
    }
    Ok(report)
}

/// Updates one record.
pub fn update<S: RecordStore + ?Sized>(
    store: &S,
    reference: &RecordRef,
    fields: &RecordInput,
) -> CliResult<Record> {
    let payload = fields.to_payload();
    if payload.is_empty() {
        return Err("nothing to update: pass at least one field".into());
    }
    let record = resolve_record(store, reference)?;
    let updated = store.update(&record.id, &payload)?;
    info!(id = %updated.id, "record updated");
    println!("✓ Updated {} ({})", updated.name, updated.id);
    Ok(updated)
}

/// Deletes one record.
pub fn delete<S: RecordStore + ?Sized>(store: &S, reference: &RecordRef) -> CliResult<Record> {
    let record = resolve_record(store, reference)?;
    store.delete(&record.id)?;
    println!("✓ Deleted {} ({})", record.name, record.id);
    Ok(record)
}

/// Links a record to a control implementation or solution capability.
pub fn associate<S: RecordStore + ?Sized>(
    store: &S,
    reference: &RecordRef,
    subject_id: &str,
    subject_type: SubjectType,
) -> CliResult<Association> {
    let record = resolve_record(store, reference)?;
    let link = Association::new(record.id.clone(), subject_id, subject_type);
    store.associate(&link)?;
    println!(
        "✓ Linked {} to {} {}",
        record.name, link.subject_type, link.subject_id
    );
    Ok(link)
}

/// Finds records by name or reference id.
pub fn search<S: RecordStore + ?Sized>(store: &S, term: &str, format: &str) -> CliResult<usize> {
    let records = store.list_all()?;
    let found: Vec<Record> = search_records(&records, term).into_iter().cloned().collect();
    print_records(&found, format)?;
    Ok(found.len())
}

/// Writes every record to a JSON file.
pub fn export<S: RecordStore + ?Sized>(store: &S, path: &Path) -> CliResult<usize> {
    let records = store.list_all()?;
    write_json(path, &records)?;
    println!("✓ Exported {} record(s) to {}", records.len(), path.display());
    Ok(records.len())
}

/// Lists projects.
pub fn projects<C: HttpClient>(store: &HttpRecordStore<C>, format: &str) -> CliResult<()> {
    let projects = store.projects()?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }
    for project in &projects {
        println!(
            "{:<38} {:<12} {}",
            project.id,
            project.kind.as_deref().unwrap_or("-"),
            project.name.as_deref().unwrap_or("")
        );
    }
    println!("{} project(s)", projects.len());
    Ok(())
}

/// Lists the control implementations of a project.
pub fn controls<C: HttpClient>(
    store: &HttpRecordStore<C>,
    project_id: &str,
    format: &str,
) -> CliResult<()> {
    let controls = store.control_implementations(project_id)?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&controls)?);
        return Ok(());
    }
    for control in &controls {
        println!("{:<38} {}", control.id, control.name.as_deref().unwrap_or(""));
    }
    println!("{} control implementation(s)", controls.len());
    Ok(())
}

fn print_records(records: &[Record], format: &str) -> CliResult<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(records)?),
        "text" => {
            for record in records {
                println!(
                    "{:<38} {:<16} {}",
                    record.id,
                    record.reference_id.as_deref().unwrap_or("-"),
                    record.name
                );
            }
            println!("{} record(s)", records.len());
        }
        other => return Err(format!("unknown format '{}', use text or json", other).into()),
    }
    Ok(())
}
