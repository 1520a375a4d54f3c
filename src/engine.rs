use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::applier::{self, PlacedChunk};
use crate::directive::{self, ParseLimits};
use crate::envelope;
use crate::error::{OperationResult, PatchError};
use crate::matcher;
use crate::workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

#[derive(Debug)]
pub struct PatchRequest {
    pub path: String,
    pub operation: Operation,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub root: PathBuf,
    pub limits: ParseLimits,
}

impl EngineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        EngineConfig {
            root: root.into(),
            limits: ParseLimits::default(),
        }
    }
}

pub struct PatchEngine {
    config: EngineConfig,
}

#[derive(Debug)]
pub enum PlannedAction {
    Create {
        target: PathBuf,
        content: String,
    },
    Update {
        target: PathBuf,
        before: String,
        after: String,
        fuzz: u32,
    },
    Delete {
        target: PathBuf,
        existed: bool,
    },
}

/// A fully resolved operation that has not yet touched the filesystem.
#[derive(Debug)]
pub struct Plan {
    pub label: String,
    pub action: PlannedAction,
}

impl PatchEngine {
    pub fn new(config: EngineConfig) -> Self {
        PatchEngine { config }
    }

    /// Apply one patch request end to end. Every failure kind is folded into
    /// the structured result; nothing propagates past this boundary.
    pub fn apply(&self, request: &PatchRequest) -> OperationResult {
        self.plan(request).and_then(|plan| self.commit(plan)).into()
    }

    /// Resolve, normalize, parse and match without writing anything. This is
    /// the whole engine minus the final write, which makes dry runs cheap and
    /// guarantees a failed request leaves the file untouched.
    pub fn plan(&self, request: &PatchRequest) -> Result<Plan, PatchError> {
        let target = workspace::resolve(&self.config.root, &request.path)?;
        directive::check_size(&request.body, &self.config.limits)?;
        let label = request.path.clone();

        let action = match request.operation {
            Operation::Create => self.plan_create(&target, &label, &request.body)?,
            Operation::Update => self.plan_update(&target, &label, &request.body)?,
            Operation::Delete => PlannedAction::Delete {
                existed: target.exists(),
                target,
            },
        };

        Ok(Plan { label, action })
    }

    /// Execute a plan. Writes are whole-file and atomic: temp file in the
    /// target directory, sync, rename.
    pub fn commit(&self, plan: Plan) -> Result<String, PatchError> {
        match plan.action {
            PlannedAction::Create { target, content } => {
                if let Some(parent) = target.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                write_via_temp(&target, content.as_bytes())?;
                Ok(format!("File created: {}", plan.label))
            }
            PlannedAction::Update {
                target,
                after,
                fuzz,
                ..
            } => {
                write_via_temp(&target, after.as_bytes())?;
                if fuzz > 0 {
                    Ok(format!(
                        "File updated: {} (fuzzy context match, fuzz {fuzz})",
                        plan.label
                    ))
                } else {
                    Ok(format!("File updated: {}", plan.label))
                }
            }
            PlannedAction::Delete { target, existed } => {
                if existed {
                    fs::remove_file(&target)?;
                }
                // Deleting an absent file still reports success; delete is
                // idempotent by contract.
                Ok(format!("File deleted: {}", plan.label))
            }
        }
    }

    fn plan_create(
        &self,
        target: &Path,
        label: &str,
        body: &str,
    ) -> Result<PlannedAction, PatchError> {
        if target.exists() {
            return Err(PatchError::AlreadyExists(label.to_string()));
        }
        let envelope = envelope::normalize(body, None);
        let lines = directive::parse_create(&envelope.lines)?;
        Ok(PlannedAction::Create {
            target: target.to_path_buf(),
            content: lines.join(envelope.newline.as_str()),
        })
    }

    fn plan_update(
        &self,
        target: &Path,
        label: &str,
        body: &str,
    ) -> Result<PlannedAction, PatchError> {
        if !target.exists() {
            return Err(PatchError::NotFound(label.to_string()));
        }
        let bytes = fs::read(target)?;
        let before = String::from_utf8(bytes).map_err(|_| PatchError::Encoding(label.to_string()))?;

        let envelope = envelope::normalize(body, Some(&before));
        let hunks = directive::parse_update(&envelope.lines)?;

        let lines: Vec<String> = before
            .replace("\r\n", "\n")
            .split('\n')
            .map(str::to_string)
            .collect();

        let mut placed: Vec<PlacedChunk> = Vec::new();
        let mut cursor = 0usize;
        let mut fuzz = 0u32;

        for (index, hunk) in hunks.iter().enumerate() {
            if let Some(anchor) = &hunk.anchor {
                let (advanced, anchor_fuzz) = matcher::seek_anchor(&lines, cursor, anchor);
                cursor = advanced;
                fuzz += anchor_fuzz;
            }
            let found = matcher::find(&lines, cursor, hunk, index)?;
            fuzz += found.fuzz;
            placed.extend(applier::place_hunk(hunk, found.index, &lines));
            cursor = found.index + hunk.signature().len();
        }

        let after_lines = applier::splice(&lines, &placed);
        let after = after_lines.join(envelope.newline.as_str());

        Ok(PlannedAction::Update {
            target: target.to_path_buf(),
            before,
            after,
            fuzz,
        })
    }
}

fn write_via_temp(path: &Path, data: &[u8]) -> Result<(), PatchError> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir)?;
    }
    let base_dir = parent.unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".patchbay-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn engine(root: &Path) -> PatchEngine {
        PatchEngine::new(EngineConfig::new(root))
    }

    fn request(operation: Operation, path: &str, body: &str) -> PatchRequest {
        PatchRequest {
            path: path.to_string(),
            operation,
            body: body.to_string(),
        }
    }

    fn read(root: &Path, rel: &str) -> String {
        fs::read_to_string(root.join(rel)).expect("readable file")
    }

    #[test]
    fn create_round_trips_body_content() {
        let temp = tempdir().expect("temp dir");
        let engine = engine(temp.path());
        let body = "+line one\n+line two\n*** End of File\n";
        let outcome = engine.apply(&request(Operation::Create, "note.txt", body));
        assert_eq!(outcome.to_json(), r#"{"result":"File created: note.txt"}"#);
        assert_eq!(read(temp.path(), "note.txt"), "line one\nline two");
    }

    #[test]
    fn create_makes_intermediate_directories() {
        let temp = tempdir().expect("temp dir");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(
            Operation::Create,
            "a/b/c.txt",
            "+nested\n*** End of File\n",
        ));
        assert!(!outcome.is_error());
        assert_eq!(read(temp.path(), "a/b/c.txt"), "nested");
    }

    #[test]
    fn create_refuses_to_clobber_existing_file() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("real.rs"), "real work").expect("seed file");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(
            Operation::Create,
            "real.rs",
            "+overwrite\n*** End of File\n",
        ));
        assert!(outcome.is_error());
        assert_eq!(read(temp.path(), "real.rs"), "real work");
    }

    #[test]
    fn update_replaces_context_matched_lines() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("f.txt"), "Hello\nWorld\nFoo").expect("seed file");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(
            Operation::Update,
            "f.txt",
            "@@\n-World\n+Universe\n",
        ));
        assert_eq!(outcome.to_json(), r#"{"result":"File updated: f.txt"}"#);
        assert_eq!(read(temp.path(), "f.txt"), "Hello\nUniverse\nFoo");
    }

    #[test]
    fn update_requires_existing_file() {
        let temp = tempdir().expect("temp dir");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(Operation::Update, "ghost.txt", "@@\n-a\n+b\n"));
        assert_eq!(
            outcome.to_json(),
            r#"{"error":"file not found: ghost.txt"}"#
        );
    }

    #[test]
    fn update_is_idempotent_against_reapplication() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("imports.py"), "import os\nimport sys\n").expect("seed file");
        let engine = engine(temp.path());
        let body = "@@\n import os\n-import sys\n+import sys\n+import errno\n";

        let first = engine.apply(&request(Operation::Update, "imports.py", body));
        assert!(!first.is_error());
        let once = read(temp.path(), "imports.py");

        let second = engine.apply(&request(Operation::Update, "imports.py", body));
        assert!(!second.is_error());
        let twice = read(temp.path(), "imports.py");

        assert_eq!(once, twice);
        assert_eq!(twice.matches("import errno").count(), 1);
        assert!(twice.starts_with("import os\nimport sys\nimport errno"));
    }

    #[test]
    fn update_tolerates_trailing_whitespace_drift() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("w.txt"), "alpha  \nbeta\n").expect("seed file");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(Operation::Update, "w.txt", "@@\n-alpha\n+omega\n"));
        match outcome {
            OperationResult::Result(message) => assert!(message.contains("fuzz")),
            OperationResult::Error(message) => panic!("unexpected error: {message}"),
        }
        assert_eq!(read(temp.path(), "w.txt"), "omega\nbeta\n");
    }

    #[test]
    fn failed_context_match_leaves_file_untouched() {
        let temp = tempdir().expect("temp dir");
        let original = "keep this\nexactly as is\n";
        fs::write(temp.path().join("f.txt"), original).expect("seed file");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(
            Operation::Update,
            "f.txt",
            "@@\n-no such line\n+replacement\n",
        ));
        assert!(outcome.is_error());
        assert_eq!(read(temp.path(), "f.txt"), original);
    }

    #[test]
    fn update_preserves_crlf_newlines() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("dos.txt"), "one\r\ntwo\r\nthree").expect("seed file");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(Operation::Update, "dos.txt", "@@\n-two\n+TWO\n"));
        assert!(!outcome.is_error());
        assert_eq!(read(temp.path(), "dos.txt"), "one\r\nTWO\r\nthree");
    }

    #[test]
    fn anchored_hunk_edits_the_second_occurrence() {
        let temp = tempdir().expect("temp dir");
        let original = "fn a() {\n    work();\n}\nfn b() {\n    work();\n}\n";
        fs::write(temp.path().join("twin.rs"), original).expect("seed file");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(
            Operation::Update,
            "twin.rs",
            "@@ fn b() {\n-    work();\n+    rest();\n",
        ));
        assert!(!outcome.is_error());
        assert_eq!(
            read(temp.path(), "twin.rs"),
            "fn a() {\n    work();\n}\nfn b() {\n    rest();\n}\n"
        );
    }

    #[test]
    fn traversal_path_fails_without_io() {
        let temp = tempdir().expect("temp dir");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(
            Operation::Create,
            "../escape.txt",
            "+x\n*** End of File\n",
        ));
        assert!(outcome.is_error());
        assert!(!temp.path().parent().expect("parent").join("escape.txt").exists());
    }

    #[test]
    fn delete_removes_file_and_is_idempotent() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("gone.txt"), "bye").expect("seed file");
        let engine = engine(temp.path());

        let first = engine.apply(&request(Operation::Delete, "gone.txt", ""));
        assert_eq!(first.to_json(), r#"{"result":"File deleted: gone.txt"}"#);
        assert!(!temp.path().join("gone.txt").exists());

        let second = engine.apply(&request(Operation::Delete, "gone.txt", ""));
        assert_eq!(second.to_json(), r#"{"result":"File deleted: gone.txt"}"#);
    }

    #[test]
    fn non_utf8_target_reports_encoding_error() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("bin.dat"), [0xC0u8, 0xAF, 0x00]).expect("seed file");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(Operation::Update, "bin.dat", "@@\n-a\n+b\n"));
        assert_eq!(
            outcome.to_json(),
            r#"{"error":"bin.dat is not valid UTF-8 text"}"#
        );
    }

    #[test]
    fn oversized_patch_is_rejected_before_matching() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("f.txt"), "a\n").expect("seed file");
        let mut config = EngineConfig::new(temp.path());
        config.limits = ParseLimits {
            max_bytes: 4,
            max_lines: 100,
        };
        let engine = PatchEngine::new(config);
        let outcome = engine.apply(&request(Operation::Update, "f.txt", "@@\n-a\n+bbbb\n"));
        match outcome {
            OperationResult::Error(message) => assert!(message.contains("patch too large")),
            OperationResult::Result(message) => panic!("unexpected success: {message}"),
        }
    }

    #[test]
    fn multi_hunk_update_applies_in_order() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("m.txt"), "a\nb\nc\nd\n").expect("seed file");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(
            Operation::Update,
            "m.txt",
            "@@\n-a\n+A\n@@\n-c\n+C\n",
        ));
        assert!(!outcome.is_error());
        assert_eq!(read(temp.path(), "m.txt"), "A\nb\nC\nd\n");
    }

    #[test]
    fn quoted_envelope_applies_after_unquoting() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("q.txt"), "old\n").expect("seed file");
        let engine = engine(temp.path());
        let outcome = engine.apply(&request(
            Operation::Update,
            "q.txt",
            "> @@\n> -old\n> +new\n",
        ));
        assert!(!outcome.is_error());
        assert_eq!(read(temp.path(), "q.txt"), "new\n");
    }
}
