use super::*;
use pretty_assertions::assert_eq;

const H2_SAFE: &[SafeOption] = &[
    SafeOption::force("ACCESS_MODE_DATA", "r"),
    SafeOption::force("IFEXISTS", "TRUE"),
    SafeOption::strip("INIT"),
];

#[test]
fn test_decode_keeps_option_order() {
    let descriptor = ConnectionDescriptor::decode("file:/data/db;USER=alice;PASSWORD=secret").unwrap();
    assert_eq!(descriptor.primary_target, "file:/data/db");
    assert_eq!(
        descriptor.options.iter().collect::<Vec<_>>(),
        vec![
            (&"USER".to_string(), &"alice".to_string()),
            (&"PASSWORD".to_string(), &"secret".to_string())
        ]
    );
    assert_eq!(descriptor.user(), Some("alice"));
}

#[test]
fn test_value_splits_on_first_equals_only() {
    let descriptor = ConnectionDescriptor::decode("mem:test;FILTER=a=b").unwrap();
    assert_eq!(descriptor.option("FILTER"), Some("a=b"));
}

#[test]
fn test_empty_target_is_malformed() {
    for input in ["", ";USER=sa", "  ;USER=sa"] {
        let err = ConnectionDescriptor::decode(input).unwrap_err();
        assert!(matches!(err, GateError::MalformedConnectionString(_)), "{input:?}");
        assert!(err.is_configuration());
    }
}

#[test]
fn test_option_without_equals_is_malformed() {
    let err = "file:/db;READONLY".parse::<ConnectionDescriptor>().unwrap_err();
    assert!(matches!(err, GateError::MalformedConnectionString(_)));
}

#[test]
fn test_empty_segments_are_ignored() {
    let descriptor = ConnectionDescriptor::decode("file:/db;;USER=bob;").unwrap();
    assert_eq!(descriptor.options.len(), 1);
    assert_eq!(descriptor.encode(), "file:/db;USER=bob");
}

#[test]
fn test_reencoding_is_stable() {
    for input in [
        "file:/data/db",
        "file:/data/db;USER=sa;ACCESS_MODE_DATA=rws",
        "tcp://localhost/~/test;;MODE=PostgreSQL;",
    ] {
        let decoded = ConnectionDescriptor::decode(input).unwrap();
        let again = ConnectionDescriptor::decode(&decoded.encode()).unwrap();
        assert_eq!(again, decoded);
    }
}

#[test]
fn test_safe_defaults_force_read_only_and_existing_database() {
    let descriptor =
        ConnectionDescriptor::decode("file:/data/db;ACCESS_MODE_DATA=rws;USER=sa").unwrap();
    let sanitized = descriptor.apply_safe_defaults(H2_SAFE);

    assert_eq!(sanitized.option("ACCESS_MODE_DATA"), Some("r"));
    assert_eq!(sanitized.option("IFEXISTS"), Some("TRUE"));
    assert_eq!(sanitized.user(), Some("sa"));
    assert_eq!(sanitized.encode(), "file:/data/db;USER=sa;ACCESS_MODE_DATA=r;IFEXISTS=TRUE");
}

#[test]
fn test_safe_defaults_match_keys_case_insensitively() {
    let descriptor = ConnectionDescriptor::decode(
        "file:/db;access_mode_data=rw;IfExists=FALSE;init=RUNSCRIPT FROM 'evil.sql'",
    )
    .unwrap();
    let sanitized = descriptor.apply_safe_defaults(H2_SAFE);

    assert_eq!(sanitized.options.len(), 2);
    assert_eq!(sanitized.option("access_mode_data"), None);
    assert_eq!(sanitized.option("ACCESS_MODE_DATA"), Some("r"));
    assert_eq!(sanitized.option("init"), None);
}

#[test]
fn test_safe_defaults_are_idempotent() {
    let descriptor = ConnectionDescriptor::decode("file:/db;IFEXISTS=FALSE;USER=x").unwrap();
    let once = descriptor.apply_safe_defaults(H2_SAFE);
    let twice = once.apply_safe_defaults(H2_SAFE);
    assert_eq!(once, twice);
}
