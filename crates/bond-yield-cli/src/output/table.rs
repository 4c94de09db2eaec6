use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{format_scalar, is_record_array};

/// Format output as tables using the tabled crate. Nested record arrays
/// (the cash-flow schedule) are rendered as their own table.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_object(map);
            }
        }
        Value::Array(arr) => println!("{}", array_table(arr)),
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => print_object(res_map),
        _ => print_object(envelope),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_object(map: &Map<String, Value>) {
    println!("{}", field_table(map));
    for (key, val) in map {
        if let Value::Array(arr) = val {
            if is_record_array(val) {
                println!("\n{} ({} rows)", key, arr.len());
                println!("{}", array_table(arr));
            }
        }
    }
}

/// Two-column Field / Value table of everything except record arrays.
fn field_table(map: &Map<String, Value>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map.iter().filter(|(_, v)| !is_record_array(v)) {
        builder.push_record([key.as_str(), &format_scalar(val)]);
    }
    builder.build()
}

fn array_table(arr: &[Value]) -> Table {
    let mut builder = Builder::default();
    match arr.first() {
        Some(Value::Object(first)) => {
            let headers: Vec<String> = first.keys().cloned().collect();
            builder.push_record(headers.clone());
            for item in arr {
                if let Value::Object(map) = item {
                    let row: Vec<String> = headers
                        .iter()
                        .map(|h| map.get(h.as_str()).map(format_scalar).unwrap_or_default())
                        .collect();
                    builder.push_record(row);
                }
            }
        }
        Some(_) => {
            builder.push_record(["Value"]);
            for item in arr {
                builder.push_record([format_scalar(item)]);
            }
        }
        None => builder.push_record(["(empty)"]),
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_table_skips_schedule() {
        let v = json!({
            "status": "discount",
            "cashFlows": [{"period": 1, "couponPayment": 25.0}]
        });
        let rendered = field_table(v.as_object().unwrap()).to_string();
        assert!(rendered.contains("discount"));
        assert!(!rendered.contains("couponPayment"));
    }

    #[test]
    fn test_array_table_headers_from_first_row() {
        let v = json!([
            {"period": 1, "couponPayment": 25.0},
            {"period": 2, "couponPayment": 25.0}
        ]);
        let rendered = array_table(v.as_array().unwrap()).to_string();
        assert!(rendered.contains("couponPayment"));
        assert!(rendered.contains("period"));
        assert_eq!(rendered.matches("25.0").count(), 2);
    }
}
