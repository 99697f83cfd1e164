use serde::{Deserialize, Serialize};

/// Typed view over the settings table's TEXT values.
///
/// The stored form is JSON for everything except plain strings, which are
/// stored raw; parsing tries JSON first and falls back to `Text`, so rows
/// written by earlier deployments stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Json(serde_json::Value),
}

impl SettingValue {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Bool(b)) => SettingValue::Bool(b),
            Ok(serde_json::Value::Number(n)) => {
                SettingValue::Number(n.as_f64().unwrap_or_default())
            }
            Ok(serde_json::Value::String(s)) => SettingValue::Text(s),
            Ok(v @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
                SettingValue::Json(v)
            }
            _ => SettingValue::Text(raw.to_string()),
        }
    }

    pub fn serialize_to_store(&self) -> String {
        match self {
            SettingValue::Text(s) => s.clone(),
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Number(n) => {
                // Whole numbers serialize without the trailing ".0".
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            SettingValue::Json(v) => v.to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SettingValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_survives_round_trip() {
        let v = SettingValue::parse("hello world");
        assert_eq!(v, SettingValue::Text("hello world".into()));
        assert_eq!(v.serialize_to_store(), "hello world");
    }

    #[test]
    fn numbers_parse_as_numbers() {
        let v = SettingValue::parse("10000");
        assert_eq!(v.as_number(), Some(10000.0));
        assert_eq!(v.serialize_to_store(), "10000");
    }

    #[test]
    fn structured_values_stay_json() {
        let v = SettingValue::parse(r#"[{"step":1}]"#);
        assert!(matches!(v, SettingValue::Json(_)));
        let stored = v.serialize_to_store();
        assert_eq!(SettingValue::parse(&stored), v);
    }

    #[test]
    fn comma_separated_ids_are_text() {
        // The admin_ids override is a raw comma list, not JSON.
        let v = SettingValue::parse("1097943646,6668026635");
        assert!(matches!(v, SettingValue::Text(_)));
    }
}
