use crmsync_types::{Credentials, EntityKind, RunId};
use std::collections::HashSet;
use std::str::FromStr;

// ── RunId ────────────────────────────────────────────────────────

#[test]
fn run_id_new_is_unique() {
    let a = RunId::new();
    let b = RunId::new();
    assert_ne!(a, b);
}

#[test]
fn run_id_display_and_parse() {
    let id = RunId::new();
    let parsed = RunId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn run_id_from_str_invalid() {
    assert!(RunId::from_str("garbage").is_err());
}

#[test]
fn run_ids_are_time_ordered() {
    let first = RunId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = RunId::new();
    assert!(first < second);
}

#[test]
fn run_id_hash_and_eq() {
    let id = RunId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}

// ── EntityKind ───────────────────────────────────────────────────

#[test]
fn entity_kind_parse() {
    assert_eq!("leads".parse::<EntityKind>().unwrap(), EntityKind::Leads);
    assert_eq!("User".parse::<EntityKind>().unwrap(), EntityKind::Users);
    assert_eq!(" roles ".parse::<EntityKind>().unwrap(), EntityKind::Roles);
    assert!("deals".parse::<EntityKind>().is_err());
}

#[test]
fn entity_kind_serde_lowercase() {
    let json = serde_json::to_string(&EntityKind::Leads).unwrap();
    assert_eq!(json, r#""leads""#);
    let kind: EntityKind = serde_json::from_str(r#""roles""#).unwrap();
    assert_eq!(kind, EntityKind::Roles);
}

#[test]
fn entity_kind_display_matches_as_str() {
    for kind in EntityKind::ALL {
        assert_eq!(kind.to_string(), kind.as_str());
    }
}

// ── Credentials ──────────────────────────────────────────────────

#[test]
fn credentials_debug_redacts_tokens() {
    let creds = Credentials::new("1000.abcdefsecret", "1000.refreshsecret");
    let debug = format!("{creds:?}");
    assert!(!debug.contains("abcdefsecret"));
    assert!(!debug.contains("refreshsecret"));
    assert!(debug.contains("access_token"));
}

#[test]
fn credentials_with_access_token_keeps_refresh() {
    let creds = Credentials::new("old", "refresh");
    let updated = creds.with_access_token("new");
    assert_eq!(updated.access_token, "new");
    assert_eq!(updated.refresh_token, "refresh");
}
