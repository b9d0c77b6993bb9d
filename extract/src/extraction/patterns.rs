//! Compiled regular expressions shared by the strategies, cleaner and validator.

#![allow(clippy::expect_used)]

use regex::Regex;
use std::sync::LazyLock;

/// `BEGIN-CODE ... END-CODE` blocks. Non-greedy so every pair is found.
pub static CODE_DELIMITERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)BEGIN-CODE[ \t]*\r?\n?(.*?)END-CODE").expect("static regex")
});

/// `BEGIN-DIFF ... END-DIFF` blocks.
pub static DIFF_DELIMITERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)BEGIN-DIFF[ \t]*\r?\n?(.*?)END-DIFF").expect("static regex")
});

/// Fenced blocks: group 1 is the language tag (possibly empty), group 2 the body.
pub static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+.-]*)[^\n]*\n(.*?)```").expect("static regex")
});

/// AL object declarations such as `codeunit 50100 "My Codeunit"` or `table 1 X`.
pub static AL_OBJECT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*(codeunit|table|tableextension|page|pageextension|report|reportextension|query|xmlport|enum|enumextension|interface|permissionset|permissionsetextension|profile|controladdin|entitlement)\s+(\d+\s+)?("[^"]+"|[A-Za-z_][\w]*)"#,
    )
    .expect("static regex")
});

/// Procedure / trigger declarations and bare `begin` lines.
pub static AL_BLOCK_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*((local|internal)\s+)?(procedure|trigger)\s+[\w\x22]+.*\(|^\s*begin\s*$")
        .expect("static regex")
});

/// Lines that close an AL block: `end;`, `end`, or anything ending in `}`.
pub static AL_BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*end;?\s*$|\}\s*$").expect("static regex")
});

/// Whole-word AL vocabulary used by kind detection.
pub static AL_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(codeunit|table|tableextension|page|pageextension|report|query|xmlport|enum|interface|procedure|trigger|begin|end|var|field|fields|keys|key|layout|actions|area|record|dataitem|column|permissions)\b",
    )
    .expect("static regex")
});

/// Explanatory lead-in such as "Here is the corrected code:".
pub static EXPLANATORY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(here is|here's|here are|below is|the following|this is the|i have|i've|sure|certainly|okay|explanation)\b.*[:.!]\s*$",
    )
    .expect("static regex")
});

/// Opening fence on the first line, with optional language tag.
pub static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\s*```[^\n]*(\n|\z)").expect("static regex"));

/// Closing fence on the last line.
pub static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\A|\n)[ \t]*```[ \t]*\s*\z").expect("static regex"));

/// Opening custom delimiter at the very start of the text.
pub static LEADING_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\s*BEGIN-(CODE|DIFF)[ \t]*(\n|\z)").expect("static regex"));

/// Closing custom delimiter at the very end of the text.
pub static TRAILING_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\A|\n)[ \t]*END-(CODE|DIFF)\s*\z").expect("static regex"));

/// A line that is nothing but a fence marker.
pub static FENCE_ARTIFACT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[A-Za-z0-9_+.-]*\s*$").expect("static regex"));
