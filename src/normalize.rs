//! Maps the tool's loosely-typed reply onto the fixed result schema.

use crate::analysis::RawReply;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value used when the reply carries no agent identifier
pub const MISSING_AGENT_ID: &str = "N/A";

/// Normalized analysis of one frame. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "robot_id")]
    pub agent_id: String,
    #[serde(rename = "file_size_bytes")]
    pub payload_size_bytes: u64,
    pub description: String,
    pub environment: String,
    pub indoor_or_outdoor: String,
    pub lighting_condition: String,
    #[serde(rename = "human")]
    pub human_presence: String,
    #[serde(rename = "animals")]
    pub animal_presence: String,
    pub objects: Vec<String>,
    pub hazards: String,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            agent_id: MISSING_AGENT_ID.to_string(),
            payload_size_bytes: 0,
            description: String::new(),
            environment: String::new(),
            indoor_or_outdoor: String::new(),
            lighting_condition: String::new(),
            human_presence: String::new(),
            animal_presence: String::new(),
            objects: Vec::new(),
            hazards: String::new(),
        }
    }
}

/// Total over any mapping: absent or mistyped fields take their defaults.
///
/// The agent identifier and payload size are read from the top level, the
/// scene fields from the nested `result` mapping.
pub fn normalize(reply: &RawReply) -> AnalysisResult {
    let defaults = AnalysisResult::default();
    let nested = reply.get("result").and_then(Value::as_object);
    let scene = |key: &str| nested.and_then(|map| map.get(key));

    AnalysisResult {
        agent_id: text_field(reply.get("robot_id")).unwrap_or(defaults.agent_id),
        payload_size_bytes: size_field(reply.get("file_size_bytes")).unwrap_or(0),
        description: text_field(scene("description")).unwrap_or_default(),
        environment: text_field(scene("environment")).unwrap_or_default(),
        indoor_or_outdoor: text_field(scene("indoor_or_outdoor")).unwrap_or_default(),
        lighting_condition: text_field(scene("lighting_condition")).unwrap_or_default(),
        human_presence: text_field(scene("human")).unwrap_or_default(),
        animal_presence: text_field(scene("animals")).unwrap_or_default(),
        objects: objects_field(scene("objects")),
        hazards: text_field(scene("hazards")).unwrap_or_default(),
    }
}

/// Scalar rendered as text; null and containers yield `None`
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    value.and_then(scalar_text)
}

fn size_field(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn objects_field(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| scalar_text(item).unwrap_or_else(|| item.to_string()))
            .collect(),
        Some(other) => vec![scalar_text(other).unwrap_or_else(|| other.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(value: Value) -> RawReply {
        match value {
            Value::Object(map) => RawReply::new(map),
            _ => panic!("test reply must be a mapping"),
        }
    }

    #[test]
    fn test_reference_scenario() {
        let raw = reply(json!({
            "robot_id": "R1",
            "file_size_bytes": 12345,
            "result": {"description": "a hallway", "objects": ["chair", "door"]}
        }));

        assert_eq!(
            normalize(&raw),
            AnalysisResult {
                agent_id: "R1".to_string(),
                payload_size_bytes: 12345,
                description: "a hallway".to_string(),
                environment: String::new(),
                indoor_or_outdoor: String::new(),
                lighting_condition: String::new(),
                human_presence: String::new(),
                animal_presence: String::new(),
                objects: vec!["chair".to_string(), "door".to_string()],
                hazards: String::new(),
            }
        );
    }

    #[test]
    fn test_empty_reply_yields_all_defaults() {
        assert_eq!(normalize(&RawReply::default()), AnalysisResult::default());
        assert_eq!(normalize(&RawReply::default()).agent_id, "N/A");
    }

    #[test]
    fn test_every_subset_of_fields_is_populated() {
        let full = json!({
            "robot_id": "R2",
            "file_size_bytes": 10,
            "result": {
                "description": "d",
                "environment": "e",
                "indoor_or_outdoor": "indoor",
                "lighting_condition": "dim",
                "human": "yes",
                "animals": "no",
                "objects": ["x"],
                "hazards": "wet floor"
            }
        });
        let nested_keys = [
            "description",
            "environment",
            "indoor_or_outdoor",
            "lighting_condition",
            "human",
            "animals",
            "objects",
            "hazards",
        ];

        // Drop each combination of nested keys and check defaults fill the gaps
        for mask in 0u32..(1 << nested_keys.len()) {
            let mut value = full.clone();
            let result = value["result"].as_object_mut().unwrap();
            for (bit, key) in nested_keys.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    result.remove(*key);
                }
            }

            let normalized = normalize(&reply(value));
            assert_eq!(normalized.agent_id, "R2");
            assert_eq!(normalized.payload_size_bytes, 10);
            let dropped = |key: &str| {
                let bit = nested_keys.iter().position(|k| *k == key).unwrap();
                mask & (1 << bit) != 0
            };
            assert_eq!(normalized.description.is_empty(), dropped("description"));
            assert_eq!(normalized.hazards.is_empty(), dropped("hazards"));
            assert_eq!(normalized.objects.is_empty(), dropped("objects"));
            assert_eq!(normalized.human_presence.is_empty(), dropped("human"));
        }
    }

    #[test]
    fn test_wrong_shapes_fall_back() {
        let raw = reply(json!({
            "robot_id": null,
            "file_size_bytes": "not a number",
            "result": {
                "description": ["list"],
                "environment": {"nested": true},
                "indoor_or_outdoor": 3,
                "lighting_condition": false,
                "human": null
            }
        }));

        let normalized = normalize(&raw);
        assert_eq!(normalized.agent_id, "N/A");
        assert_eq!(normalized.payload_size_bytes, 0);
        assert_eq!(normalized.description, "");
        assert_eq!(normalized.environment, "");
        assert_eq!(normalized.indoor_or_outdoor, "3");
        assert_eq!(normalized.lighting_condition, "false");
        assert_eq!(normalized.human_presence, "");
    }

    #[test]
    fn test_result_not_a_mapping() {
        let raw = reply(json!({"robot_id": "R3", "result": "oops"}));
        let normalized = normalize(&raw);
        assert_eq!(normalized.agent_id, "R3");
        assert_eq!(normalized.description, "");
        assert!(normalized.objects.is_empty());
    }

    #[test]
    fn test_payload_size_variants() {
        let size = |v: Value| normalize(&reply(json!({ "file_size_bytes": v }))).payload_size_bytes;
        assert_eq!(size(json!(42)), 42);
        assert_eq!(size(json!(42.0)), 42);
        assert_eq!(size(json!(" 77 ")), 77);
        assert_eq!(size(json!(-5)), 0);
        assert_eq!(size(json!(1.5)), 0);
        assert_eq!(size(json!(true)), 0);
    }

    #[test]
    fn test_objects_coercion() {
        let objects = |v: Value| normalize(&reply(json!({"result": {"objects": v}}))).objects;
        assert_eq!(objects(json!("chair")), vec!["chair"]);
        assert_eq!(objects(json!(7)), vec!["7"]);
        assert_eq!(objects(json!(null)), Vec::<String>::new());
        assert_eq!(objects(json!(["a", 1, null])), vec!["a", "1", "null"]);
        assert_eq!(objects(json!({"k": "v"})), vec![r#"{"k":"v"}"#]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = reply(json!({
            "robot_id": "R1",
            "result": {"objects": "lamp", "hazards": "stairs"}
        }));
        assert_eq!(normalize(&raw), normalize(&raw));
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let value = serde_json::to_value(AnalysisResult::default()).unwrap();
        assert_eq!(value["robot_id"], json!("N/A"));
        assert_eq!(value["file_size_bytes"], json!(0));
        assert_eq!(value["human"], json!(""));
        assert_eq!(value["animals"], json!(""));
        assert_eq!(value["objects"], json!([]));
    }
}
