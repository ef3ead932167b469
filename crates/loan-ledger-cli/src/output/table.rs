use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{payload, scalar};

pub fn print_table(value: &Value) {
    print!("{}", render(value));
}

/// Scalar fields become a Field/Value table; every array of objects (an
/// installment schedule, a list of overdue items) gets a table of its own.
pub fn render(value: &Value) -> String {
    let mut out = String::new();
    match payload(value) {
        Value::Object(map) => render_object(map, &mut out),
        Value::Array(rows) => render_rows(rows, &mut out),
        other => out.push_str(&format!("{}\n", scalar(other))),
    }

    if let Some(envelope) = value.as_object().filter(|m| m.contains_key("result")) {
        if let Some(Value::Array(warnings)) = envelope.get("warnings") {
            if !warnings.is_empty() {
                out.push_str("\nWarnings:\n");
                for w in warnings.iter().filter_map(Value::as_str) {
                    out.push_str(&format!("  - {w}\n"));
                }
            }
        }
        if let Some(Value::String(meth)) = envelope.get("methodology") {
            out.push_str(&format!("\nMethodology: {meth}\n"));
        }
    }
    out
}

fn render_object(map: &Map<String, Value>, out: &mut String) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut nested = Vec::new();
    for (key, val) in map {
        match val {
            Value::Array(rows) if rows.iter().any(Value::is_object) => nested.push((key, rows)),
            Value::Object(inner) => {
                for (k, v) in inner {
                    builder.push_record([format!("{key}.{k}"), scalar(v)]);
                }
            }
            _ => builder.push_record([key.clone(), cell(val)]),
        }
    }
    out.push_str(&format!("{}\n", Table::from(builder)));

    for (key, rows) in nested {
        out.push_str(&format!("\n{key}:\n"));
        render_rows(rows, out);
    }
}

fn render_rows(rows: &[Value], out: &mut String) {
    let Some(Value::Object(first)) = rows.first() else {
        if rows.is_empty() {
            out.push_str("(none)\n");
        }
        for item in rows {
            out.push_str(&format!("{}\n", cell(item)));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for map in rows.iter().filter_map(Value::as_object) {
        builder.push_record(
            headers
                .iter()
                .map(|h| map.get(h).map(cell).unwrap_or_default()),
        );
    }
    out.push_str(&format!("{}\n", Table::from(builder)));
}

fn cell(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(", "),
        _ => scalar(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schedule_gets_its_own_table() {
        let v = json!({
            "result": {
                "total_interest": "142.03",
                "installments": [
                    {"sequence": 1, "total_due": "111.84"},
                    {"sequence": 2, "total_due": "111.79"}
                ]
            },
            "warnings": ["last installment differs"],
            "methodology": "Simple interest"
        });
        let text = render(&v);
        assert!(text.contains("total_interest"));
        assert!(text.contains("installments:"));
        assert!(text.contains("111.79"));
        assert!(text.contains("  - last installment differs"));
        assert!(text.contains("Methodology: Simple interest"));
        // the schedule is a separate table, not a JSON blob in a cell
        assert!(!text.contains("{\"sequence\""));
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(render(&json!([])), "(none)\n");
    }
}
