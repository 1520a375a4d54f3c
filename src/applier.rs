use crate::directive::Hunk;

/// A chunk rebased onto absolute file coordinates, ready to splice.
#[derive(Debug, Clone)]
pub struct PlacedChunk {
    pub index: usize,
    pub removed_len: usize,
    pub inserted: Vec<String>,
}

/// Rebase a matched hunk's chunks onto the file and trim self-duplicating
/// insertions.
///
/// The stutter guard: when a chunk's replacement reaches the end of the
/// hunk's matched span, the tail of its inserted lines is compared against
/// the unmodified lines immediately following that span. An identical
/// overlap is dropped from the insertion, so re-applying the same patch
/// cannot duplicate a block.
pub fn place_hunk(hunk: &Hunk, match_index: usize, lines: &[String]) -> Vec<PlacedChunk> {
    let signature_len = hunk.signature().len();
    let span_end = match_index + signature_len;

    hunk.chunks()
        .into_iter()
        .map(|chunk| {
            let reaches_span_end = chunk.offset + chunk.removed.len() == signature_len;
            let inserted = if reaches_span_end {
                let following = &lines[span_end.min(lines.len())..];
                trim_overlap(chunk.inserted, following)
            } else {
                chunk.inserted
            };
            PlacedChunk {
                index: match_index + chunk.offset,
                removed_len: chunk.removed.len(),
                inserted,
            }
        })
        .collect()
}

/// Splice placed chunks into the file, strictly left to right. Chunks must
/// already be ordered; the cursor never moves backwards.
pub fn splice(lines: &[String], chunks: &[PlacedChunk]) -> Vec<String> {
    let mut dest = Vec::new();
    let mut cursor = 0usize;
    for chunk in chunks {
        let start = chunk.index.max(cursor).min(lines.len());
        dest.extend_from_slice(&lines[cursor..start]);
        dest.extend(chunk.inserted.iter().cloned());
        cursor = (start + chunk.removed_len).min(lines.len());
    }
    dest.extend_from_slice(&lines[cursor..]);
    dest
}

fn trim_overlap(inserted: Vec<String>, following: &[String]) -> Vec<String> {
    let max = inserted.len().min(following.len());
    for overlap in (1..=max).rev() {
        if inserted[inserted.len() - overlap..] == following[..overlap] {
            let mut trimmed = inserted;
            trimmed.truncate(trimmed.len() - overlap);
            return trimmed;
        }
    }
    inserted
}
