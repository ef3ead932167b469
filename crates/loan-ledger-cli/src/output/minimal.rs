use serde_json::Value;

use super::{payload, scalar};

// First non-null match wins.
const PRIORITY_KEYS: [&str; 8] = [
    "status",
    "total_payable",
    "late_fee",
    "receivable",
    "consistent",
    "deleted",
    "paid",
    "count",
];

/// Print only the headline value of a command's output.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(value));
}

pub fn headline(value: &Value) -> String {
    let result = payload(value);
    match result {
        Value::Object(map) => {
            for key in PRIORITY_KEYS {
                if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
                    return scalar(val);
                }
            }
            match map.iter().next() {
                Some((key, val)) => format!("{key}: {}", scalar(val)),
                None => String::new(),
            }
        }
        Value::Array(rows) => rows.len().to_string(),
        other => scalar(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_key() {
        let v = json!({"result": {"total_interest": "142.03", "total_payable": "1342.03"}});
        assert_eq!(headline(&v), "1342.03");
    }

    #[test]
    fn test_array_counts_rows() {
        assert_eq!(headline(&json!([{"a": 1}, {"a": 2}])), "2");
    }

    #[test]
    fn test_fallback_to_first_field() {
        assert_eq!(headline(&json!({"as_of": "2024-03-15"})), "as_of: 2024-03-15");
    }
}
