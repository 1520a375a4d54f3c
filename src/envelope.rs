#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewlineStyle {
    Lf,
    Crlf,
}

impl NewlineStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            NewlineStyle::Lf => "\n",
            NewlineStyle::Crlf => "\r\n",
        }
    }

    /// First `\r\n` in the text wins; everything else is treated as LF.
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            NewlineStyle::Crlf
        } else {
            NewlineStyle::Lf
        }
    }
}

#[derive(Debug)]
pub struct Envelope {
    pub lines: Vec<String>,
    pub newline: NewlineStyle,
}

const METADATA_PREFIXES: [&str; 5] = ["--- ", "+++ ", "diff --git", "index ", "Index: "];

/// Strip incidental wrapping from a raw patch body.
///
/// Patch text frequently arrives pasted through a chat interface, which
/// block-quotes it and sometimes wraps it in unified-diff headers the
/// directive grammar does not use. `existing` is the current content of the
/// target file, used only to detect its newline convention.
pub fn normalize(raw: &str, existing: Option<&str>) -> Envelope {
    let mut lines: Vec<String> = raw
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();
    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    if is_block_quoted(&lines) {
        for line in &mut lines {
            *line = unquote(line);
        }
    }

    lines.retain(|line| !METADATA_PREFIXES.iter().any(|prefix| line.starts_with(prefix)));

    let newline = existing.map(NewlineStyle::detect).unwrap_or(NewlineStyle::Lf);
    Envelope { lines, newline }
}

fn is_block_quoted(lines: &[String]) -> bool {
    let mut saw_content = false;
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('>') {
            return false;
        }
        saw_content = true;
    }
    saw_content
}

fn unquote(line: &str) -> String {
    match line.strip_prefix('>') {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).to_string(),
        None => line.to_string(),
    }
}
