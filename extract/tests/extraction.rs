#![allow(clippy::float_cmp)]

use gauge_extract::prelude::*;

#[test]
fn test_tagged_fence_scenario() {
    let result = extract("```al\ncodeunit 1 Test {}\n```", CodeKind::Al);

    assert!(result.extracted_from_delimiters);
    assert_eq!(result.confidence, confidence::TAGGED_FENCE);
    assert_eq!(result.code, "codeunit 1 Test {}");
    assert_eq!(result.language, CodeKind::Al);
}

#[test]
fn test_bare_object_scenario() {
    let result = extract("table 1 X {}", CodeKind::Al);

    assert_eq!(result.method, ExtractionMethod::Pattern);
    assert_eq!(result.confidence, confidence::PATTERN);
    assert!(!result.extracted_from_delimiters);
    assert_eq!(result.code, "table 1 X {}");
}

#[test]
fn test_delimiters_outrank_fence() {
    let response = "Draft:\n```al\ncodeunit 1 Draft {}\n```\n\nFinal:\nBEGIN-CODE\ncodeunit 1 Final {}\nEND-CODE\n";
    let result = extract(response, CodeKind::Al);

    assert_eq!(result.code, "codeunit 1 Final {}");
    assert_eq!(result.confidence, confidence::DELIMITER);
}

#[test]
fn test_verbose_response_round_trip_through_clean_and_validate() {
    let response = "I've rewritten the codeunit below.\n\n```al\r\ncodeunit 50100 \"Price Calc\"\r\n{\r\n    procedure Total(): Decimal\r\n    begin\r\n        exit(0);\r\n    end;\r\n}\r\n```\r\n\r\nLet me know if you need anything else.";

    let result = extract(response, CodeKind::Al);
    assert_eq!(result.method, ExtractionMethod::Fence);

    let cleaned = clean_code(&result.code, CodeKind::Al);
    assert!(cleaned.starts_with("codeunit 50100 \"Price Calc\""));
    assert!(!cleaned.contains('\r'));
    assert!(validate_code(&cleaned, CodeKind::Al).is_empty());
}

#[test]
fn test_hunk_only_diff_gets_headers_and_validates() {
    let response = "Apply this:\n@@ -1,2 +1,2 @@\n codeunit 1 A\n-{ old }\n+{ new }\n end;\nThanks";

    let result = extract(response, CodeKind::Diff);
    assert_eq!(result.method, ExtractionMethod::Pattern);

    let cleaned = clean_code(&result.code, CodeKind::Diff);
    assert!(cleaned.starts_with("--- a/code.al\n+++ b/code.al\n@@ -1,2 +1,2 @@"));
    assert!(validate_code(&cleaned, CodeKind::Diff).is_empty());
}

#[test]
fn test_prose_only_response_is_low_confidence_not_error() {
    let result = extract("I'm sorry, I can't produce that.", CodeKind::Al);

    assert_eq!(result.method, ExtractionMethod::Fallback);
    assert!(result.confidence > 0.0);
    assert!(result.confidence <= confidence::FALLBACK_MATCH);
    assert!(!validate_code(&result.code, CodeKind::Al).is_empty());
}
