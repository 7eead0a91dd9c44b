use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_when_nothing_set() {
    let cfg = ViewerConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg.backend_url, DEFAULT_BACKEND_URL);
    assert_eq!(
        cfg.timeouts,
        HttpTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
    assert_eq!(cfg.view, ViewOptions::default());
}

#[test]
fn parses_overrides() {
    let cfg = ViewerConfig::from_lookup(lookup_from(&[
        ("DECKMAP_BACKEND_URL", "https://flotilla.example.test/api/"),
        ("DECKMAP_REQUEST_TIMEOUT_SECS", "5"),
        ("DECKMAP_CONNECT_TIMEOUT_SECS", "2"),
        ("DECKMAP_FRAME_INTERVAL_MS", "33"),
        ("DECKMAP_MAX_SURFACE_PX", " 800 "),
    ]))
    .unwrap();
    assert_eq!(cfg.backend_url, "https://flotilla.example.test/api");
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 5, connect_secs: 2 });
    assert_eq!(cfg.view.frame_interval, Duration::from_millis(33));
    assert_eq!(cfg.view.max_surface_width, 800);
    assert_eq!(cfg.view.max_surface_height, 800);
}

#[test]
fn invalid_number_errors() {
    let err = ViewerConfig::from_lookup(lookup_from(&[("DECKMAP_REQUEST_TIMEOUT_SECS", "soon")])).unwrap_err();
    assert!(err.to_string().contains("DECKMAP_REQUEST_TIMEOUT_SECS"));
}

#[test]
fn zero_frame_interval_errors() {
    let err = ViewerConfig::from_lookup(lookup_from(&[("DECKMAP_FRAME_INTERVAL_MS", "0")])).unwrap_err();
    assert!(matches!(err, MapError::ConfigParse(_)));
}

#[test]
fn zero_surface_errors() {
    let err = ViewerConfig::from_lookup(lookup_from(&[("DECKMAP_MAX_SURFACE_PX", "0")])).unwrap_err();
    assert!(err.to_string().contains("DECKMAP_MAX_SURFACE_PX"));
}

#[test]
fn empty_backend_url_errors() {
    let err = ViewerConfig::from_lookup(lookup_from(&[("DECKMAP_BACKEND_URL", "/")])).unwrap_err();
    assert!(err.to_string().contains("DECKMAP_BACKEND_URL"));
}
