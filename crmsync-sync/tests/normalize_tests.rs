use chrono::FixedOffset;
use crmsync_sync::schema::{LEADS, ROLES, USERS};
use crmsync_sync::Normalizer;
use crmsync_types::{CanonicalRecord, ScalarValue};
use pretty_assertions::assert_eq;
use serde_json::json;

fn text(s: &str) -> ScalarValue {
    ScalarValue::from(s)
}

// ── Field mapping ───────────────────────────────────────────────

#[test]
fn projects_remote_keys_onto_columns() {
    let raw = vec![json!({"id": "10", "name": "Admin", "unmapped": "dropped"})];

    let records = Normalizer::utc().normalize_source(&raw, &ROLES);

    assert_eq!(
        records,
        vec![CanonicalRecord::new().with("id", "10").with("name", "Admin")]
    );
}

#[test]
fn absent_fields_become_null() {
    let raw = vec![json!({"id": "u1", "email": "a@b.c"})];

    let records = Normalizer::utc().normalize_source(&raw, &USERS);

    assert_eq!(records[0].len(), USERS.columns.len());
    assert_eq!(records[0].value("full_name"), &ScalarValue::Null);
    assert_eq!(records[0].value("email"), &text("a@b.c"));
}

#[test]
fn nested_objects_flatten_to_their_id() {
    let raw = vec![json!({
        "id": "1",
        "Owner": {"id": "99", "name": "Ana", "email": "ana@example.com"},
        "Created_By": {"name": "no id here"},
    })];

    let record = &Normalizer::utc().normalize_source(&raw, &LEADS)[0];

    assert_eq!(record.value("owner"), &text("99"));
    assert_eq!(record.value("created_by"), &ScalarValue::Null);
}

#[test]
fn collections_serialize_or_become_null() {
    let raw = vec![
        json!({"id": "1", "Interesado_en": ["Cursos", "Becas"]}),
        json!({"id": "2", "Interesado_en": []}),
    ];

    let records = Normalizer::utc().normalize_source(&raw, &LEADS);

    assert_eq!(records[0].value("interested_in"), &text(r#"["Cursos","Becas"]"#));
    assert_eq!(records[1].value("interested_in"), &ScalarValue::Null);
}

#[test]
fn scalar_types_are_preserved() {
    let raw = vec![json!({"id": 5, "$converted": true, "Mobile": null})];

    let record = &Normalizer::utc().normalize_source(&raw, &LEADS)[0];

    assert_eq!(record.value("id"), &ScalarValue::Integer(5));
    assert_eq!(record.value("converted"), &ScalarValue::Bool(true));
    assert_eq!(record.value("mobile"), &ScalarValue::Null);
}

#[test]
fn records_without_id_are_dropped() {
    let raw = vec![
        json!({"name": "nameless"}),
        json!({"id": null, "name": "null id"}),
        json!("not an object"),
        json!({"id": "3", "name": "kept"}),
    ];

    let records = Normalizer::utc().normalize_source(&raw, &ROLES);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value("id"), &text("3"));
}

#[test]
fn text_ids_are_trimmed_and_blank_ids_dropped() {
    let raw = vec![
        json!({"id": " 5 ", "name": "padded"}),
        json!({"id": "   ", "name": "blank"}),
        json!({"id": "", "name": "empty"}),
    ];

    let records = Normalizer::utc().normalize_source(&raw, &ROLES);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value("id"), &text("5"));
}

// ── Timestamps ──────────────────────────────────────────────────

#[test]
fn zoned_timestamps_convert_to_the_offset() {
    let raw = vec![json!({"id": "1", "Created_Time": "2024-03-01T10:15:30-05:00"})];

    let utc = &Normalizer::utc().normalize_source(&raw, &LEADS)[0];
    assert_eq!(utc.value("created_at"), &text("2024-03-01 15:15:30"));

    let ecuador = Normalizer::new(FixedOffset::west_opt(5 * 3600).unwrap());
    let local = &ecuador.normalize_source(&raw, &LEADS)[0];
    assert_eq!(local.value("created_at"), &text("2024-03-01 10:15:30"));
}

#[test]
fn naive_and_date_only_timestamps_are_reformatted() {
    let n = Normalizer::utc();
    assert_eq!(
        n.canonicalize_timestamp(&text("2024-03-01T08:00:00")),
        text("2024-03-01 08:00:00")
    );
    assert_eq!(
        n.canonicalize_timestamp(&text("2024-03-01 08:00:00.250")),
        text("2024-03-01 08:00:00")
    );
    assert_eq!(n.canonicalize_timestamp(&text("2024-03-01")), text("2024-03-01 00:00:00"));
}

#[test]
fn canonical_timestamps_are_a_fixed_point() {
    let n = Normalizer::utc();
    let canonical = text("2023-12-31 23:59:59");
    assert_eq!(n.canonicalize_timestamp(&canonical), canonical);
}

#[test]
fn null_and_blank_timestamps_are_null() {
    let n = Normalizer::utc();
    assert_eq!(n.canonicalize_timestamp(&ScalarValue::Null), ScalarValue::Null);
    assert_eq!(n.canonicalize_timestamp(&text("   ")), ScalarValue::Null);
}

#[test]
fn unparseable_timestamps_are_kept() {
    let n = Normalizer::utc();
    assert_eq!(n.canonicalize_timestamp(&text("yesterday")), text("yesterday"));
}

#[test]
fn non_timestamp_columns_are_untouched() {
    let raw = vec![json!({"id": "1", "Fecha_de_Nacimiento": "1990-05-04"})];
    let record = &Normalizer::utc().normalize_source(&raw, &LEADS)[0];
    assert_eq!(record.value("birthday"), &text("1990-05-04"));
}

#[test]
fn target_rows_only_get_timestamps_canonicalized() {
    let rows = vec![CanonicalRecord::new()
        .with("id", "1")
        .with("created_at", "2024-01-02T03:04:05Z")
        .with("modified_at", ScalarValue::Null)
        .with("converted", 0i64)];

    let records = Normalizer::utc().normalize_target(rows, &LEADS);

    assert_eq!(records[0].value("created_at"), &text("2024-01-02 03:04:05"));
    assert_eq!(records[0].value("modified_at"), &ScalarValue::Null);
    assert_eq!(records[0].value("converted"), &ScalarValue::Integer(0));
}

#[test]
fn normalization_is_deterministic() {
    let raw = vec![json!({
        "id": "1",
        "Owner": {"id": "2"},
        "Modified_Time": "2024-06-01T12:00:00+02:00",
        "Interesado_en": ["x"],
    })];
    let n = Normalizer::utc();
    assert_eq!(n.normalize_source(&raw, &LEADS), n.normalize_source(&raw, &LEADS));
}
