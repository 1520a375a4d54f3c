use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const JOURNAL_DIR: &str = ".patchbay";
const JOURNAL_FILE: &str = "change_log.jsonl";
const MAX_ENTRIES: usize = 500;

#[derive(Debug, Serialize)]
pub struct JournalEntry<'a> {
    pub timestamp: &'a str,
    pub operation: &'a str,
    pub path: &'a str,
    pub outcome: &'a str,
    pub detail: &'a str,
}

/// Append one line to the workspace change journal, keeping the newest
/// `MAX_ENTRIES` records.
pub fn record(root: &Path, operation: &str, path: &str, outcome: &str, detail: &str) -> Result<()> {
    let journal_path = ensure_journal_file(root)?;
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into());
    let entry = JournalEntry {
        timestamp: &timestamp,
        operation,
        path,
        outcome,
        detail,
    };
    let json = serde_json::to_string(&entry)?;
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&journal_path)
        .with_context(|| format!("opening {journal_path:?}"))?;
    writeln!(file, "{json}")?;
    truncate_journal(&journal_path)?;
    Ok(())
}

fn ensure_journal_file(root: &Path) -> Result<PathBuf> {
    let dir = root.join(JOURNAL_DIR);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("creating {dir:?}"))?;
    }
    Ok(dir.join(JOURNAL_FILE))
}

fn truncate_journal(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {path:?}"))?;
    let reader = BufReader::new(file);
    let lines: Vec<_> = reader.lines().collect::<Result<_, _>>()?;
    if lines.len() <= MAX_ENTRIES {
        return Ok(());
    }
    let keep = &lines[lines.len() - MAX_ENTRIES..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_appends_jsonl_under_workspace_root() {
        let temp = tempdir().expect("temp dir");
        record(temp.path(), "update", "src/lib.rs", "applied", "File updated: src/lib.rs")
            .expect("records");
        record(temp.path(), "delete", "old.txt", "applied", "File deleted: old.txt")
            .expect("records");

        let journal = fs::read_to_string(temp.path().join(JOURNAL_DIR).join(JOURNAL_FILE))
            .expect("journal exists");
        let lines: Vec<&str> = journal.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""operation":"update""#));
        assert!(lines[1].contains(r#""path":"old.txt""#));
    }
}
