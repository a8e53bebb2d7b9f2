//! Property tests for the repair ladder and addressing detection.

use proptest::prelude::*;
use sunny_llm::{AddressingDetector, JsonRepairer};

const ROSTER: [&str; 4] = ["Elena", "Marco", "Gruk", "Bones"];

fn repairer() -> JsonRepairer {
    JsonRepairer::new(&ROSTER).expect("patterns")
}

proptest! {
    #[test]
    fn repair_never_panics(raw in ".{0,200}") {
        let r = repairer();
        let _ = r.repair_object(&raw);
        let _ = r.repair_turns(&raw, 200);
    }

    #[test]
    fn well_formed_objects_parse_clean(
        elena in "[a-zA-Z ]{1,40}",
        marco in proptest::option::of("[a-zA-Z ]{1,40}"),
    ) {
        let json = serde_json::json!({ "Elena": elena, "Marco": marco }).to_string();
        let out = repairer().repair_object(&json).expect("parse");
        prop_assert!(!out.repaired);
        prop_assert_eq!(out.value.get("Elena").cloned().flatten(), Some(elena));
        prop_assert_eq!(out.value.get("Marco").cloned().flatten(), marco);
    }

    #[test]
    fn truncation_inside_first_value_recovers_it(
        text in "[a-z]{2,30}( [a-z]{1,10}){0,3}",
        keep in 1usize..40,
    ) {
        let json = format!(r#"{{"Elena":"{text}","Marco":null}}"#);
        let prefix_len = r#"{"Elena":""#.len();
        let cut = (prefix_len + keep).min(prefix_len + text.len());
        let truncated = &json[..cut];
        let out = repairer().repair_object(truncated).expect("repair");
        let elena = out.value.get("Elena").cloned().flatten().expect("elena");
        prop_assert!(!elena.trim().is_empty());
        prop_assert!(text.starts_with(&elena));
    }

    #[test]
    fn greeting_a_name_speaks_to_it(idx in 0usize..4, greeting in "(hola|oye|hey|mira)") {
        let detector = AddressingDetector::new(&ROSTER).expect("patterns");
        let name = ROSTER[idx];
        let a = detector.detect(&format!("{greeting} {name}, que tal"));
        prop_assert_eq!(a.spoken_to, vec![name.to_string()]);
    }
}
