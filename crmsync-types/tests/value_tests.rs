use crmsync_types::ScalarValue;
use proptest::prelude::*;
use serde_json::json;

// ── Same-variant comparison ──────────────────────────────────────

#[test]
fn null_equals_only_null() {
    assert!(ScalarValue::Null.loosely_eq(&ScalarValue::Null));
    assert!(!ScalarValue::Null.loosely_eq(&ScalarValue::Integer(0)));
    assert!(!ScalarValue::Null.loosely_eq(&"".into()));
    assert!(!ScalarValue::Bool(false).loosely_eq(&ScalarValue::Null));
}

#[test]
fn text_compares_exactly() {
    assert!(ScalarValue::from("B").loosely_eq(&"B".into()));
    assert!(!ScalarValue::from("B").loosely_eq(&"B-old".into()));
    assert!(!ScalarValue::from("b").loosely_eq(&"B".into()));
}

// ── Type drift ───────────────────────────────────────────────────

#[test]
fn number_and_numeric_text_are_equal() {
    assert!(ScalarValue::Integer(5).loosely_eq(&"5".into()));
    assert!(ScalarValue::from("5").loosely_eq(&ScalarValue::Integer(5)));
    assert!(ScalarValue::Real(5.0).loosely_eq(&"5".into()));
    assert!(ScalarValue::Integer(5).loosely_eq(&" 5.0 ".into()));
}

#[test]
fn large_ids_compare_exactly() {
    let remote = ScalarValue::from("4150868000000224005");
    let stored = ScalarValue::Integer(4_150_868_000_000_224_005);
    let neighbour = ScalarValue::Integer(4_150_868_000_000_224_006);
    assert!(remote.loosely_eq(&stored));
    assert!(!remote.loosely_eq(&neighbour));
}

#[test]
fn bool_and_integer_flags_are_equal() {
    assert!(ScalarValue::Bool(true).loosely_eq(&ScalarValue::Integer(1)));
    assert!(ScalarValue::Bool(false).loosely_eq(&ScalarValue::Integer(0)));
    assert!(!ScalarValue::Bool(true).loosely_eq(&ScalarValue::Integer(0)));
}

#[test]
fn non_numeric_text_never_equals_number() {
    assert!(!ScalarValue::from("").loosely_eq(&ScalarValue::Integer(0)));
    assert!(!ScalarValue::from("abc").loosely_eq(&ScalarValue::Integer(0)));
    assert!(!ScalarValue::from("true").loosely_eq(&ScalarValue::Bool(true)));
}

#[test]
fn integer_and_real_compare_numerically() {
    assert!(ScalarValue::Integer(2).loosely_eq(&ScalarValue::Real(2.0)));
    assert!(!ScalarValue::Integer(2).loosely_eq(&ScalarValue::Real(2.5)));
}

// ── JSON conversion ──────────────────────────────────────────────

#[test]
fn from_json_scalars() {
    assert_eq!(ScalarValue::from_json(&json!(null)), Some(ScalarValue::Null));
    assert_eq!(ScalarValue::from_json(&json!(true)), Some(ScalarValue::Bool(true)));
    assert_eq!(ScalarValue::from_json(&json!(42)), Some(ScalarValue::Integer(42)));
    assert_eq!(ScalarValue::from_json(&json!(1.5)), Some(ScalarValue::Real(1.5)));
    assert_eq!(ScalarValue::from_json(&json!("x")), Some("x".into()));
}

#[test]
fn from_json_rejects_containers() {
    assert_eq!(ScalarValue::from_json(&json!({"id": "1"})), None);
    assert_eq!(ScalarValue::from_json(&json!([1, 2])), None);
}

#[test]
fn serializes_untagged() {
    let values = vec![
        ScalarValue::Null,
        ScalarValue::Bool(false),
        ScalarValue::Integer(7),
        "seven".into(),
    ];
    let json = serde_json::to_string(&values).unwrap();
    assert_eq!(json, r#"[null,false,7,"seven"]"#);
}

#[test]
fn option_conversion() {
    assert_eq!(ScalarValue::from(None::<&str>), ScalarValue::Null);
    assert_eq!(ScalarValue::from(Some(3i64)), ScalarValue::Integer(3));
}

#[test]
fn display() {
    assert_eq!(ScalarValue::Null.to_string(), "null");
    assert_eq!(ScalarValue::Integer(-4).to_string(), "-4");
    assert_eq!(ScalarValue::from("abc").to_string(), "abc");
}

// ── Properties ───────────────────────────────────────────────────

fn scalar() -> impl Strategy<Value = ScalarValue> {
    prop_oneof![
        Just(ScalarValue::Null),
        any::<bool>().prop_map(ScalarValue::Bool),
        any::<i64>().prop_map(ScalarValue::Integer),
        (-1.0e9f64..1.0e9).prop_map(ScalarValue::Real),
        "[a-z0-9 .]{0,12}".prop_map(ScalarValue::Text),
    ]
}

proptest! {
    #[test]
    fn loose_equality_is_reflexive(v in scalar()) {
        prop_assert!(v.loosely_eq(&v));
    }

    #[test]
    fn loose_equality_is_symmetric(a in scalar(), b in scalar()) {
        prop_assert_eq!(a.loosely_eq(&b), b.loosely_eq(&a));
    }

    #[test]
    fn integer_matches_its_text(i in any::<i64>()) {
        prop_assert!(ScalarValue::Integer(i).loosely_eq(&ScalarValue::Text(i.to_string())));
    }
}
