use serde_json::{Map, Value};
use std::io::{self, Write};

use super::{format_scalar, is_record_array};

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let _ = write_csv(stdout.lock(), value);
}

/// A result object becomes `field,value` rows followed by any nested record
/// array (the cash-flow schedule) with its own header row.
fn write_csv<W: Write>(out: W, value: &Value) -> csv::Result<()> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(out);

    match value {
        Value::Object(map) => {
            let body = match map.get("result") {
                Some(Value::Object(result)) => result,
                _ => map,
            };
            write_object(&mut wtr, body)?;
        }
        Value::Array(arr) => write_array(&mut wtr, arr)?,
        _ => wtr.write_record([format_scalar(value)])?,
    }

    wtr.flush()?;
    Ok(())
}

fn write_object<W: Write>(wtr: &mut csv::Writer<W>, map: &Map<String, Value>) -> csv::Result<()> {
    wtr.write_record(["field", "value"])?;
    for (key, val) in map.iter().filter(|(_, v)| !is_record_array(v)) {
        wtr.write_record([key.as_str(), &format_scalar(val)])?;
    }
    for val in map.values() {
        if let Value::Array(arr) = val {
            if is_record_array(val) {
                write_array(wtr, arr)?;
            }
        }
    }
    Ok(())
}

fn write_array<W: Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            wtr.write_record([format_scalar(item)])?;
        }
        return Ok(());
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    wtr.write_record(&headers)?;
    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_scalar).unwrap_or_default())
                .collect();
            wtr.write_record(&row)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: &Value) -> String {
        let mut buf = Vec::new();
        write_csv(&mut buf, value).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_result_then_schedule() {
        let v = json!({
            "result": {
                "status": "par",
                "cashFlows": [{"period": 1, "couponPayment": 50.0}]
            },
            "warnings": []
        });
        let out = render(&v);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec!["field,value", "status,par", "couponPayment,period", "50.0,1"]);
    }

    #[test]
    fn test_schedule_array() {
        let v = json!([{"period": 1}, {"period": 2}]);
        assert_eq!(render(&v), "period\n1\n2\n");
    }
}
