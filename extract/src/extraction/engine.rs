//! Strategy cascade that locates the intended artifact in a raw response.

use serde::{Deserialize, Serialize};

use super::confidence;
use super::kind::{detect_kind, CodeKind};
use super::patterns::{
    AL_BLOCK_END, AL_BLOCK_START, AL_OBJECT_HEADER, CODE_DELIMITERS, DIFF_DELIMITERS,
    FENCED_BLOCK,
};

/// A diff run must contain more than this many diff-shaped lines.
const MIN_DIFF_LINES: usize = 3;

/// Which strategy produced an [`ExtractionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Paired custom delimiters.
    Delimiter,
    /// Markdown code fence.
    Fence,
    /// Anchored keyword or diff-line pattern.
    Pattern,
    /// Entire response used as-is.
    Fallback,
}

/// Outcome of [`extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// The extracted artifact text.
    pub code: String,
    /// Kind the strategy attributed to the artifact.
    pub language: CodeKind,
    /// Whether the artifact came from explicit delimiters or a fence.
    pub extracted_from_delimiters: bool,
    /// Heuristic certainty in `[0, 1]`; see [`confidence`].
    pub confidence: f64,
    /// Strategy that produced this result.
    pub method: ExtractionMethod,
    /// The untouched provider response, kept for diagnostics.
    pub original_response: String,
}

/// Candidate produced by a single strategy before acceptance.
struct Candidate {
    code: String,
    language: CodeKind,
    from_delimiters: bool,
    confidence: f64,
    method: ExtractionMethod,
}

/// Extracts the intended artifact from `response`.
///
/// Strategies run in priority order (delimiters, fences, patterns) and the
/// first whose confidence exceeds [`confidence::ACCEPT_THRESHOLD`] wins. When
/// none qualifies the whole trimmed response is returned with a fallback
/// score, so this never fails and never reports a confidence of zero.
///
/// # Examples
///
/// ```
/// use gauge_extract::{extract, CodeKind};
///
/// let result = extract("```al\ncodeunit 1 Test {}\n```", CodeKind::Al);
/// assert_eq!(result.code, "codeunit 1 Test {}");
/// assert!((result.confidence - 0.9).abs() < f64::EPSILON);
/// ```
#[must_use]
pub fn extract(response: &str, expected: CodeKind) -> ExtractionResult {
    let strategies: [fn(&str, CodeKind) -> Option<Candidate>; 3] =
        [from_delimiters, from_fences, from_patterns];

    let candidate = strategies
        .iter()
        .filter_map(|strategy| strategy(response, expected))
        .find(|c| c.confidence > confidence::ACCEPT_THRESHOLD)
        .unwrap_or_else(|| whole_response(response, expected));

    tracing::debug!(
        event = "extraction_selected",
        method = ?candidate.method,
        confidence = candidate.confidence,
        expected = %expected,
        detected = %candidate.language,
        "extraction_selected"
    );

    ExtractionResult {
        code: candidate.code,
        language: candidate.language,
        extracted_from_delimiters: candidate.from_delimiters,
        confidence: candidate.confidence,
        method: candidate.method,
        original_response: response.to_string(),
    }
}

/// Last non-empty `BEGIN-…`/`END-…` pair for the expected kind.
fn from_delimiters(response: &str, expected: CodeKind) -> Option<Candidate> {
    let pattern = match expected {
        CodeKind::Diff => &*DIFF_DELIMITERS,
        CodeKind::Al | CodeKind::Unknown => &*CODE_DELIMITERS,
    };

    // Later blocks in verbose answers tend to be the corrected version.
    let body = pattern
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| !body.is_empty())
        .last()?;

    Some(Candidate {
        code: body.to_string(),
        language: expected,
        from_delimiters: true,
        confidence: confidence::DELIMITER,
        method: ExtractionMethod::Delimiter,
    })
}

/// First fence tagged for the expected kind, else the first untagged fence.
fn from_fences(response: &str, expected: CodeKind) -> Option<Candidate> {
    let fences: Vec<(String, &str)> = FENCED_BLOCK
        .captures_iter(response)
        .filter_map(|caps| {
            let tag = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
            caps.get(2).map(|body| (tag, body.as_str()))
        })
        .collect();

    let hints = expected.fence_hints();
    if let Some((_, body)) = fences.iter().find(|(tag, _)| hints.contains(&tag.as_str())) {
        return Some(Candidate {
            code: body.trim().to_string(),
            language: expected,
            from_delimiters: true,
            confidence: confidence::TAGGED_FENCE,
            method: ExtractionMethod::Fence,
        });
    }

    let (_, body) = fences.iter().find(|(tag, _)| tag.is_empty())?;
    let code = body.trim().to_string();
    let detected = detect_kind(&code);
    let score = if detected == expected {
        confidence::UNTAGGED_FENCE_MATCH
    } else {
        confidence::UNTAGGED_FENCE_MISMATCH
    };

    Some(Candidate {
        code,
        language: detected,
        from_delimiters: true,
        confidence: score,
        method: ExtractionMethod::Fence,
    })
}

fn from_patterns(response: &str, expected: CodeKind) -> Option<Candidate> {
    let (code, language) = match expected {
        CodeKind::Diff => (diff_lines(response)?, CodeKind::Diff),
        CodeKind::Al | CodeKind::Unknown => (al_region(response)?, CodeKind::Al),
    };

    Some(Candidate {
        code,
        language,
        from_delimiters: false,
        confidence: confidence::PATTERN,
        method: ExtractionMethod::Pattern,
    })
}

fn is_diff_line(line: &str) -> bool {
    ["---", "+++", "@@", "+", "-", " "]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// Longest contiguous run of diff-shaped lines, if it is long enough.
fn diff_lines(response: &str) -> Option<String> {
    let mut best: Vec<&str> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in response.lines() {
        if is_diff_line(line) {
            current.push(line);
            continue;
        }
        if current.len() > best.len() {
            best = std::mem::take(&mut current);
        } else {
            current.clear();
        }
    }
    if current.len() > best.len() {
        best = current;
    }

    (best.len() > MIN_DIFF_LINES).then(|| best.join("\n"))
}

/// Span from the first AL start line to the last block end after it.
fn al_region(response: &str) -> Option<String> {
    let lines: Vec<&str> = response.lines().collect();

    let start = lines
        .iter()
        .position(|line| AL_OBJECT_HEADER.is_match(line) || AL_BLOCK_START.is_match(line))?;

    let end = lines
        .iter()
        .enumerate()
        .skip(start)
        .filter(|(_, line)| AL_BLOCK_END.is_match(line))
        .map(|(idx, _)| idx)
        .last()
        .unwrap_or(lines.len() - 1);

    let region = lines[start..=end].join("\n");
    let region = region.trim();
    (!region.is_empty()).then(|| region.to_string())
}

fn whole_response(response: &str, expected: CodeKind) -> Candidate {
    let code = response.trim().to_string();
    let detected = detect_kind(&code);
    let score = if detected == expected {
        confidence::FALLBACK_MATCH
    } else {
        confidence::FALLBACK_MISMATCH
    };

    Candidate {
        code,
        language: detected,
        from_delimiters: false,
        confidence: score,
        method: ExtractionMethod::Fallback,
    }
}
