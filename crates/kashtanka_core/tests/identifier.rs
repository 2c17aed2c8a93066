use kashtanka_core::{Identifier, IdentifierError};

#[test]
fn permitted_characters_round_trip_trimmed() {
    for raw in ["pet911ru", "rf123", "crop_v2", "CamelCase-9", "  padded\t", ""] {
        let identifier = Identifier::new(raw).unwrap();
        assert_eq!(identifier.as_str(), raw.trim());
        assert_eq!(identifier.to_string(), raw.trim());
    }
}

#[test]
fn any_other_character_is_rejected_with_original_input() {
    for raw in ["pet 911", "a.b", "ns/id", "ключ", "x;DROP", "tag\"", " semi;colon "] {
        let err: IdentifierError = Identifier::new(raw).unwrap_err();
        assert_eq!(err.raw, raw);
    }
}

#[test]
fn case_is_preserved() {
    let upper = Identifier::new("Rf123").unwrap();
    let lower = Identifier::new("rf123").unwrap();
    assert_ne!(upper, lower);
}

#[test]
fn deserialization_validates() {
    let ok: Identifier = serde_json::from_str("\" rf123 \"").unwrap();
    assert_eq!(ok.as_str(), "rf123");
    assert!(serde_json::from_str::<Identifier>("\"rf 123\"").is_err());
}
