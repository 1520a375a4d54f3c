use crate::directive::Hunk;
use crate::error::PatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub index: usize,
    pub fuzz: u32,
}

/// Advance the cursor past the hunk's anchor line, if one is present.
///
/// Exact equality is tried first, then a whitespace-trimmed pass (fuzz 1).
/// An anchor that never matches leaves the cursor where it was; anchors only
/// disambiguate, they are not context.
pub fn seek_anchor(lines: &[String], cursor: usize, anchor: &str) -> (usize, u32) {
    for (offset, line) in lines[cursor.min(lines.len())..].iter().enumerate() {
        if line == anchor {
            return (cursor + offset + 1, 0);
        }
    }
    for (offset, line) in lines[cursor.min(lines.len())..].iter().enumerate() {
        if line.trim() == anchor.trim() {
            return (cursor + offset + 1, 1);
        }
    }
    (cursor, 0)
}

/// Locate the hunk's context signature at or after `cursor`.
///
/// Tiered search: exact, then trailing-whitespace trimmed, then fully
/// trimmed, then (for hunks flagged as end-of-file) a trimmed comparison
/// pinned to the end of the file. The first candidate at the first
/// succeeding tier wins, which keeps results deterministic.
pub fn find(
    lines: &[String],
    cursor: usize,
    hunk: &Hunk,
    hunk_index: usize,
) -> Result<Match, PatchError> {
    let signature = hunk.signature();
    if signature.is_empty() {
        return Ok(Match {
            index: cursor,
            fuzz: 0,
        });
    }

    let tiers: [(fn(&str) -> &str, u32); 3] =
        [(verbatim, 0), (str::trim_end, 1), (str::trim, 100)];
    for (transform, fuzz) in tiers {
        if let Some(index) = scan(lines, &signature, cursor, transform) {
            return Ok(Match { index, fuzz });
        }
    }

    if hunk.at_eof {
        let end_start = lines.len().saturating_sub(signature.len());
        if slice_matches(lines, &signature, end_start, str::trim) {
            return Ok(Match {
                index: end_start,
                fuzz: 10_000,
            });
        }
    }

    Err(PatchError::ContextNotFound {
        hunk: hunk_index + 1,
        context: signature.join("\n"),
        nearest: nearest_lines(lines, &signature),
    })
}

fn verbatim(line: &str) -> &str {
    line
}

fn scan(
    lines: &[String],
    signature: &[String],
    cursor: usize,
    transform: fn(&str) -> &str,
) -> Option<usize> {
    if signature.len() > lines.len() {
        return None;
    }
    (cursor..=lines.len() - signature.len())
        .find(|&index| slice_matches(lines, signature, index, transform))
}

fn slice_matches(
    lines: &[String],
    signature: &[String],
    start: usize,
    transform: fn(&str) -> &str,
) -> bool {
    if start + signature.len() > lines.len() {
        return false;
    }
    signature
        .iter()
        .enumerate()
        .all(|(offset, expected)| transform(&lines[start + offset]) == transform(expected))
}

/// Render the file region closest to the first searched line, so the patch
/// author can see what the file actually contains.
fn nearest_lines(lines: &[String], signature: &[String]) -> String {
    if lines.is_empty() {
        return "(file is empty)".to_string();
    }
    let probe = signature[0].trim();
    let best = lines
        .iter()
        .enumerate()
        .min_by_key(|(_, line)| levenshtein(line.trim(), probe))
        .map(|(index, _)| index)
        .unwrap_or(0);

    let start = best.saturating_sub(1);
    let end = (best + 2).min(lines.len());
    (start..end)
        .map(|index| format!("  {} | {}", index + 1, lines[index]))
        .collect::<Vec<_>>()
        .join("\n")
}

fn levenshtein(a: &str, b: &str) -> usize {
    let mut costs = (0..=b.chars().count()).collect::<Vec<_>>();
    for (i, ca) in a.chars().enumerate() {
        let mut last = i;
        costs[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let new = if ca == cb {
                last
            } else {
                1 + std::cmp::min(std::cmp::min(costs[j], costs[j + 1]), last)
            };
            last = costs[j + 1];
            costs[j + 1] = new;
        }
    }
    *costs.last().unwrap_or(&0)
}
