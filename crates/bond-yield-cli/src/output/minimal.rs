use serde_json::Value;

use super::format_scalar;

/// Priority list of key output fields.
const PRIORITY_KEYS: [&str; 4] = ["yieldToMaturity", "currentYield", "totalInterest", "status"];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", minimal_line(value));
}

fn minimal_line(value: &Value) -> String {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result_obj {
        Value::Object(map) => {
            for key in &PRIORITY_KEYS {
                if let Some(val) = map.get(*key) {
                    if !val.is_null() {
                        return format_scalar(val);
                    }
                }
            }
            match map.iter().next() {
                Some((key, val)) => format!("{}: {}", key, format_scalar(val)),
                None => String::new(),
            }
        }
        // Schedule output: report the number of payments
        Value::Array(arr) => format!("{} payments", arr.len()),
        other => format_scalar(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_prefers_ytm() {
        let v = json!({"result": {"currentYield": 5.26, "yieldToMaturity": 5.66}});
        assert_eq!(minimal_line(&v), "5.66");
    }

    #[test]
    fn test_minimal_schedule_counts_payments() {
        let v = json!([{"period": 1}, {"period": 2}]);
        assert_eq!(minimal_line(&v), "2 payments");
    }
}
