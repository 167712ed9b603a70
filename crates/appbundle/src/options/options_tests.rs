#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

#[test]
fn ValidationOptions___default___has_expected_values() {
    let options = ValidationOptions::default();

    assert!(options.strict);
    assert_eq!(options.max_total_size, Some(512 * 1024 * 1024));
    assert_eq!(options.max_file_count, Some(65_536));
    assert_eq!(options.max_file_size, None);
    assert_eq!(options.max_entrypoint_depth, 32);
}

#[test]
fn ValidationOptions___from_empty_bytes___returns_defaults() {
    let options = ValidationOptions::from_json(&[]).unwrap();

    assert_eq!(options, ValidationOptions::default());
}

#[test]
fn ValidationOptions___from_json___overrides_only_given_fields() {
    let options = ValidationOptions::from_json(br#"{"strict": false, "max_file_size": 10}"#).unwrap();

    assert!(!options.strict);
    assert_eq!(options.max_file_size, Some(10));
    assert_eq!(options.max_entrypoint_depth, 32);
}

#[test]
fn ValidationOptions___null_limit___disables_it() {
    let options = ValidationOptions::from_json(br#"{"max_total_size": null}"#).unwrap();

    assert_eq!(options.max_total_size, None);
}

#[test]
fn ParseOptions___lenient___only_changes_strictness() {
    let options = ParseOptions::lenient();

    assert!(!options.validation.strict);
    assert_eq!(options.max_manifest_size, Some(1024 * 1024));
}

#[test]
fn ParseOptions___from_json___parses_nested_validation() {
    let options =
        ParseOptions::from_json(br#"{"max_manifest_size": 64, "validation": {"strict": false}}"#)
            .unwrap();

    assert_eq!(options.max_manifest_size, Some(64));
    assert!(!options.validation.strict);
}

#[test]
fn SerializeOptions___default___is_deterministic() {
    let options = SerializeOptions::default();

    assert!(options.deterministic);
    assert_eq!(options.compression_level, None);
}

#[test]
fn SerializeOptions___from_json___keeps_deterministic_default() {
    let options = SerializeOptions::from_json(br#"{"compression_level": 9}"#).unwrap();

    assert_eq!(options.compression_level, Some(9));
    assert!(options.deterministic);
}

#[test_case("error", ConflictResolution::Error)]
#[test_case("skip", ConflictResolution::Skip)]
#[test_case("replace", ConflictResolution::Replace)]
fn ConflictResolution___from_str___parses(raw: &str, expected: ConflictResolution) {
    assert_eq!(raw.parse::<ConflictResolution>().unwrap(), expected);
    assert_eq!(expected.to_string(), raw);
}

#[test]
fn ConflictResolution___from_str___rejects_unknown() {
    assert!("overwrite".parse::<ConflictResolution>().is_err());
}

#[test]
fn MergeOptions___from_json___parses_policies() {
    let options = MergeOptions::from_json(
        br#"{"conflict_resolution": "replace", "entrypoint_conflict_resolution": "skip"}"#,
    )
    .unwrap();

    assert_eq!(options.conflict_resolution, ConflictResolution::Replace);
    assert_eq!(
        options.entrypoint_conflict_resolution,
        ConflictResolution::Skip
    );
}

#[test]
fn MergeOptions___default___errors_on_conflict() {
    let options = MergeOptions::default();

    assert_eq!(options.conflict_resolution, ConflictResolution::Error);
    assert_eq!(
        options.entrypoint_conflict_resolution,
        ConflictResolution::Error
    );
}

#[test]
fn AddFileOptions___builders___compose() {
    let options = AddFileOptions::overwrite()
        .with_content_type("text/plain")
        .stored();

    assert!(options.overwrite);
    assert!(!options.compress);
    assert_eq!(options.content_type.as_deref(), Some("text/plain"));
}
