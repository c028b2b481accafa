//! Tests for the PanelError type

use huntarr_panel::PanelError;

#[test]
fn test_error_display_network() {
    let err = PanelError::Network("GET http://huntarr/ timed out".to_string());
    assert_eq!(format!("{}", err), "Network error: GET http://huntarr/ timed out");
}

#[test]
fn test_error_display_http_status() {
    let err = PanelError::HttpStatus {
        status: 502,
        url: "http://huntarr/api/history/all".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "HTTP 502 from http://huntarr/api/history/all"
    );
}

#[test]
fn test_error_display_parse() {
    let err = PanelError::Parse("expected value".to_string());
    assert_eq!(format!("{}", err), "Parse error: expected value");
}

#[test]
fn test_error_display_schema() {
    let err = PanelError::Schema("missing field `entries`".to_string());
    assert_eq!(format!("{}", err), "Schema error: missing field `entries`");
}

#[test]
fn test_error_display_stale_or_empty() {
    let err = PanelError::StaleOrEmptyState("no tracked app in document".to_string());
    assert_eq!(
        format!("{}", err),
        "No usable cycle state: no tracked app in document"
    );
}

#[test]
fn test_error_display_config() {
    let err = PanelError::Config("bad port".to_string());
    assert_eq!(format!("{}", err), "Configuration error: bad port");
}

#[test]
fn test_error_display_invalid_argument() {
    let err = PanelError::InvalidArgument("page size 25".to_string());
    assert_eq!(format!("{}", err), "Invalid argument: page size 25");
}

#[test]
fn test_error_display_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err = PanelError::from(io_err);
    assert_eq!(format!("{}", err), "IO error: missing");
}

#[test]
fn test_error_from_serde_json_is_parse() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err = PanelError::from(json_err);
    assert!(matches!(err, PanelError::Parse(_)));
}
