use std::mem;

use crate::error::PatchError;

pub const END_FILE: &str = "*** End of File";
pub const END_PATCH: &str = "*** End Patch";

#[derive(Debug, Clone)]
pub struct ParseLimits {
    pub max_bytes: usize,
    pub max_lines: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        ParseLimits {
            max_bytes: 1024 * 1024,
            max_lines: 20_000,
        }
    }
}

/// Cheap guard against pathological input, checked before any parsing or
/// matching work happens.
pub fn check_size(raw: &str, limits: &ParseLimits) -> Result<(), PatchError> {
    if raw.len() > limits.max_bytes {
        return Err(PatchError::PatchTooLarge {
            actual: raw.len(),
            limit: limits.max_bytes,
            unit: "bytes",
        });
    }
    let line_count = raw.lines().count();
    if line_count > limits.max_lines {
        return Err(PatchError::PatchTooLarge {
            actual: line_count,
            limit: limits.max_lines,
            unit: "lines",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOp {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug)]
pub struct Hunk {
    pub anchor: Option<String>,
    pub ops: Vec<LineOp>,
    pub at_eof: bool,
}

/// One contiguous replacement inside a hunk: `offset` indexes into the hunk's
/// context signature, `removed` lines are dropped and `inserted` lines take
/// their place.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub offset: usize,
    pub removed: Vec<String>,
    pub inserted: Vec<String>,
}

impl Hunk {
    /// The lines this hunk expects to find in the file: context and removed
    /// lines, in order.
    pub fn signature(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                LineOp::Context(text) | LineOp::Remove(text) => Some(text.clone()),
                LineOp::Add(_) => None,
            })
            .collect()
    }

    /// Collapse the op list into replacement chunks. A chunk is a maximal run
    /// of Remove/Add ops; it closes when a context line follows.
    pub fn chunks(&self) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut removed: Vec<String> = Vec::new();
        let mut inserted: Vec<String> = Vec::new();
        let mut sig_index = 0usize;
        let mut run_start = 0usize;

        for op in &self.ops {
            match op {
                LineOp::Context(_) => {
                    if !removed.is_empty() || !inserted.is_empty() {
                        chunks.push(Chunk {
                            offset: run_start,
                            removed: mem::take(&mut removed),
                            inserted: mem::take(&mut inserted),
                        });
                    }
                    sig_index += 1;
                    run_start = sig_index;
                }
                LineOp::Remove(text) => {
                    removed.push(text.clone());
                    sig_index += 1;
                }
                LineOp::Add(text) => inserted.push(text.clone()),
            }
        }
        if !removed.is_empty() || !inserted.is_empty() {
            chunks.push(Chunk {
                offset: run_start,
                removed,
                inserted,
            });
        }
        chunks
    }
}

/// Parse a create body: every line is a literal `+` content line, closed by
/// an explicit end-of-file terminator. The terminator requirement guards
/// against a silently truncated envelope.
pub fn parse_create(lines: &[String]) -> Result<Vec<String>, PatchError> {
    let mut content = Vec::new();
    for line in lines {
        if line == END_FILE || line == END_PATCH {
            return Ok(content);
        }
        match line.strip_prefix('+') {
            Some(rest) => content.push(rest.to_string()),
            None => {
                return Err(PatchError::malformed(format!(
                    "invalid add line in create body: '{line}'"
                )));
            }
        }
    }
    Err(PatchError::malformed(format!(
        "create body is missing its '{END_FILE}' terminator"
    )))
}

/// Parse an update body into ordered hunks. At least one `@@` marker is
/// required; an update without hunks almost always means the caller wanted
/// a create.
pub fn parse_update(lines: &[String]) -> Result<Vec<Hunk>, PatchError> {
    if !lines.iter().any(|line| is_hunk_header(line)) {
        return Err(PatchError::malformed(
            "update patch contains no '@@' hunk markers (did you mean create?)",
        ));
    }

    let mut hunks: Vec<Hunk> = Vec::new();
    let mut index = 0usize;

    while index < lines.len() {
        let line = &lines[index];
        if line == END_PATCH {
            break;
        }
        if line.is_empty() && hunks.is_empty() {
            index += 1;
            continue;
        }
        if !is_hunk_header(line) {
            return Err(PatchError::malformed(format!(
                "unexpected line before first '@@' marker: '{line}'"
            )));
        }

        let anchor = line
            .strip_prefix("@@")
            .map(str::trim)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string);
        index += 1;

        let mut ops = Vec::new();
        let mut at_eof = false;
        while index < lines.len() {
            let body = &lines[index];
            if is_hunk_header(body) || body == END_PATCH {
                break;
            }
            if body == END_FILE {
                at_eof = true;
                index += 1;
                break;
            }
            index += 1;
            if body.is_empty() {
                ops.push(LineOp::Context(String::new()));
            } else if let Some(rest) = body.strip_prefix('+') {
                ops.push(LineOp::Add(rest.to_string()));
            } else if let Some(rest) = body.strip_prefix('-') {
                ops.push(LineOp::Remove(rest.to_string()));
            } else if let Some(rest) = body.strip_prefix(' ') {
                ops.push(LineOp::Context(rest.to_string()));
            } else {
                return Err(PatchError::malformed(format!(
                    "hunk line has no sentinel (' ', '+', '-'): '{body}'"
                )));
            }
        }

        hunks.push(Hunk {
            anchor,
            ops,
            at_eof,
        });
    }

    Ok(hunks)
}

fn is_hunk_header(line: &str) -> bool {
    line == "@@" || line.starts_with("@@ ")
}
