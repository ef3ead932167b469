use serde_json::{Map, Value};
use std::io;

use super::{payload, scalar};

/// CSV on stdout. Row lists become one record per row; an object holding a
/// row list (a schedule, a loan) is written as that list; anything else is
/// field,value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());
    if let Err(e) = write_csv(&mut wtr, value) {
        eprintln!("CSV output error: {e}");
    }
}

pub fn write_csv<W: io::Write>(wtr: &mut csv::Writer<W>, value: &Value) -> csv::Result<()> {
    match payload(value) {
        Value::Array(rows) => write_rows(wtr, rows)?,
        Value::Object(map) => match row_list(map) {
            Some(rows) => write_rows(wtr, rows)?,
            None => {
                wtr.write_record(["field", "value"])?;
                for (key, val) in map {
                    wtr.write_record([key.as_str(), &scalar(val)])?;
                }
            }
        },
        other => wtr.write_record([scalar(other)])?,
    }
    wtr.flush()?;
    Ok(())
}

fn row_list(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    map.values().find_map(|v| match v {
        Value::Array(rows) if rows.first().is_some_and(Value::is_object) => Some(rows),
        _ => None,
    })
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            wtr.write_record([scalar(item)])?;
        }
        return Ok(());
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    wtr.write_record(&headers)?;
    for map in rows.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| map.get(*h).map(scalar).unwrap_or_default())
            .collect();
        wtr.write_record(&row)?;
    }
    Ok(())
}
