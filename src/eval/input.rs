use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::info;

use super::{is_score_column, quote_ident};
use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone)]
pub struct PairTable {
    pub name: String,
    pub columns: Vec<String>,
    pub row_count: usize,
}

pub fn load_csv_table(connection: &mut Connection, name: &str, path: &Path) -> EvalResult<PairTable> {
    let file = File::open(path).map_err(|err| EvalError::Input {
        table: name.to_string(),
        message: format!("failed to open {}: {err}", path.display()),
    })?;
    let table = load_table_from_reader(connection, name, file)?;
    info!(
        table = %table.name,
        path = %path.display(),
        columns = table.columns.len(),
        rows = table.row_count,
        "loaded input table"
    );
    Ok(table)
}

/// Replaces table `name` with the CSV rows from `reader`.
///
/// Score columns are stored REAL and must lie in [0, 1]; every other column
/// is stored TEXT. Empty cells become NULL.
pub fn load_table_from_reader<R: Read>(
    connection: &mut Connection,
    name: &str,
    reader: R,
) -> EvalResult<PairTable> {
    let input_error = |message: String| EvalError::Input {
        table: name.to_string(),
        message,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = csv_reader
        .headers()
        .map_err(|err| input_error(format!("failed to read header: {err}")))?
        .iter()
        .map(|header| header.trim_matches('\u{feff}').to_string())
        .collect::<Vec<String>>();

    let mut seen = HashSet::new();
    for column in &columns {
        if column.is_empty() {
            return Err(EvalError::schema(name, "header contains an empty column name"));
        }
        if !seen.insert(column.as_str()) {
            return Err(EvalError::schema(name, format!("duplicate column '{column}'")));
        }
    }

    let definitions = columns
        .iter()
        .map(|column| {
            let affinity = if is_score_column(column) { "REAL" } else { "TEXT" };
            format!("{} {affinity}", quote_ident(column))
        })
        .collect::<Vec<String>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<String>>()
        .join(", ");

    let tx = connection.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} ({definitions});",
        table = quote_ident(name)
    ))?;

    let mut row_count = 0_usize;
    {
        let mut statement = tx.prepare(&format!(
            "INSERT INTO {}({}) VALUES({placeholders})",
            quote_ident(name),
            columns
                .iter()
                .map(|column| quote_ident(column))
                .collect::<Vec<String>>()
                .join(", ")
        ))?;

        for (index, record) in csv_reader.records().enumerate() {
            let row = index + 1;
            let record =
                record.map_err(|err| input_error(format!("failed to read row {row}: {err}")))?;

            let mut values = Vec::with_capacity(columns.len());
            for (column, raw) in columns.iter().zip(record.iter()) {
                values.push(parse_cell(column, raw, row)?);
            }
            statement.execute(params_from_iter(values))?;
            row_count += 1;
        }
    }
    tx.commit()?;

    Ok(PairTable {
        name: name.to_string(),
        columns,
        row_count,
    })
}

fn parse_cell(column: &str, raw: &str, row: usize) -> EvalResult<Value> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    if !is_score_column(column) {
        return Ok(Value::Text(raw.to_string()));
    }

    let invalid = |message: String| EvalError::InvalidValue {
        column: column.to_string(),
        row,
        message,
    };
    let value = raw
        .parse::<f64>()
        .map_err(|err| invalid(format!("'{raw}' is not a number: {err}")))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{value} is outside [0, 1]")));
    }
    Ok(Value::Real(value))
}

/// Column names of `table` as reported by `PRAGMA table_info`.
pub fn table_columns(connection: &Connection, table: &str) -> EvalResult<Vec<String>> {
    let pragma_sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut statement = connection.prepare(&pragma_sql)?;

    let mut columns = Vec::new();
    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }

    if columns.is_empty() {
        return Err(EvalError::schema(table, "table does not exist"));
    }
    Ok(columns)
}
