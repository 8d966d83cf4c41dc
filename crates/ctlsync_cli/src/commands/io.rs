//! File helpers: JSON tables, item lists, exports and backups.

use ctlsync_reconcile::Table;
use ctlsync_remote::RecordInput;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Reads a table from a JSON file of the form `{"columns": [...], "rows": [...]}`.
pub fn read_table(path: &Path) -> CliResult<Table> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let table = serde_json::from_str(&text)
        .map_err(|e| format!("invalid table file {}: {}", path.display(), e))?;
    Ok(table)
}

/// Writes a value as pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> CliResult<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    fs::write(path, text).map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
    Ok(())
}

/// Reads candidate records from a JSON file.
///
/// Accepts a bare array of objects or an object holding the array under
/// `evidences` or `items`.
pub fn read_items(path: &Path) -> CliResult<Vec<RecordInput>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))?;

    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map
            .remove("evidences")
            .or_else(|| map.remove("items"))
            .ok_or_else(|| format!("{} has no 'evidences' or 'items' list", path.display()))?,
        _ => return Err(format!("{} must hold a list of objects", path.display()).into()),
    };
    let items: Vec<RecordInput> = serde_json::from_value(list)?;
    Ok(items.into_iter().filter(|item| !item.is_blank()).collect())
}

/// Copies `file` into `dir` as `<stem>_<unix-seconds>.<ext>`.
pub fn backup_file(file: &Path, dir: &Path) -> CliResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("backup");
    let ext = file.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut target = dir.join(format!("{}_{}.{}", stem, stamp, ext));
    let mut n = 1;
    while target.exists() {
        target = dir.join(format!("{}_{}_{}.{}", stem, stamp, n, ext));
        n += 1;
    }
    fs::copy(file, &target)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn table_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.json");
        let table = Table::new(["Solution Capability", "Suggested Mappings"])
            .with_row([("Solution Capability", "MFA"), ("Suggested Mappings", "IA-2")]);

        write_json(&path, &table).unwrap();
        assert_eq!(read_table(&path).unwrap(), table);
    }

    #[test]
    fn missing_table_file_names_path() {
        let err = read_table(Path::new("/nonexistent/table.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/table.json"));
    }

    #[test]
    fn items_accept_array_or_wrapper() {
        let dir = tempdir().unwrap();

        let bare = dir.path().join("bare.json");
        fs::write(&bare, r#"[{"Name": "A"}, {}, {"name": "B", "notes": "x"}]"#).unwrap();
        let items = read_items(&bare).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].to_payload().remarks.as_deref(), Some("x"));

        let wrapped = dir.path().join("wrapped.json");
        fs::write(&wrapped, r#"{"evidences": [{"name": "C"}]}"#).unwrap();
        assert_eq!(read_items(&wrapped).unwrap()[0].name().as_deref(), Some("C"));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#""text""#).unwrap();
        assert!(read_items(&bad).is_err());
    }

    #[test]
    fn backup_copies_without_clobbering() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("target.json");
        fs::write(&file, "{}").unwrap();
        let backups = dir.path().join("backups");

        let first = backup_file(&file, &backups).unwrap();
        let second = backup_file(&file, &backups).unwrap();
        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "{}");
        assert!(first
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("target_"));
    }
}
