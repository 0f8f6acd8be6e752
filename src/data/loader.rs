use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{
    COUNTRY_COLUMN, CellValue, Column, ColumnKind, IndicatorTable, Record, YEAR_COLUMN,
    infer_columns,
};
use crate::error::LoadError;

/// Tokens read as a missing value, on top of the empty cell.
const MISSING_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-nan", "null", "NULL", "#N/A", "None",
];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an indicator table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, `country_name`, `year`, then indicator columns
/// * `.json`    – `[{ "country_name": ..., "year": ..., ...indicators }, ...]`
/// * `.parquet` – flat columns; kinds come from the Arrow data types
pub fn load_file(path: &Path) -> Result<IndicatorTable, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let loaded = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        _ => return Err(LoadError::UnsupportedFormat { extension: ext }),
    };

    let table = loaded.map_err(|source| LoadError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    let indicators = table.indicators();
    log::info!(
        "loaded {}: {} rows, {} columns, {} indicators",
        path.display(),
        table.len(),
        table.columns.len(),
        indicators.len()
    );
    if table.is_empty() || indicators.is_empty() {
        log::warn!("{} has no data rows or no numeric indicators", path.display());
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names; `country_name` and `year` are
/// required, every other column becomes a value column whose kind is inferred
/// from its cells.
fn load_csv(path: &Path) -> Result<IndicatorTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let country_idx = headers
        .iter()
        .position(|h| h == COUNTRY_COLUMN)
        .with_context(|| format!("CSV missing '{COUNTRY_COLUMN}' column"))?;
    let year_idx = headers
        .iter()
        .position(|h| h == YEAR_COLUMN)
        .with_context(|| format!("CSV missing '{YEAR_COLUMN}' column"))?;

    let value_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != country_idx && *i != year_idx)
        .map(|(i, h)| (i, h.clone()))
        .collect();

    let mut records = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;

        let country_name = row.get(country_idx).unwrap_or("").trim().to_string();
        let year = parse_year(row.get(year_idx).unwrap_or(""))
            .with_context(|| format!("CSV row {row_no}: invalid '{YEAR_COLUMN}'"))?;
        let cells = value_cols
            .iter()
            .map(|(idx, _)| parse_cell(row.get(*idx).unwrap_or("")))
            .collect();

        records.push(Record {
            country_name,
            year,
            cells,
        });
    }

    let names = value_cols.into_iter().map(|(_, name)| name).collect();
    let columns = infer_columns(names, &records);
    Ok(IndicatorTable::new(columns, records))
}

fn parse_year(s: &str) -> Result<i32> {
    let s = s.trim();
    if s.is_empty() {
        bail!("year is empty");
    }
    if let Ok(y) = s.parse::<i32>() {
        return Ok(y);
    }
    // Integer columns with gaps are often written as floats ("2020.0").
    match s.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 => Ok(f as i32),
        _ => bail!("'{s}' is not an integer year"),
    }
}

fn parse_cell(s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() || MISSING_TOKENS.contains(&s) {
        return CellValue::Missing;
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => CellValue::Number(f),
        Ok(_) => CellValue::Missing,
        Err(_) => CellValue::Text(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "country_name": "Chile", "year": 2020, "rainfall": 356.0, "yield": null },
///   ...
/// ]
/// ```
///
/// Value columns are ordered by first appearance across all objects.
fn load_json(path: &Path) -> Result<IndicatorTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    let mut names: Vec<String> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if key != COUNTRY_COLUMN && key != YEAR_COLUMN && !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        // Shape was checked above.
        let Some(obj) = row.as_object() else { continue };

        let country_name = obj
            .get(COUNTRY_COLUMN)
            .and_then(JsonValue::as_str)
            .with_context(|| format!("Row {i}: missing or invalid '{COUNTRY_COLUMN}'"))?
            .trim()
            .to_string();
        let year = json_year(obj.get(YEAR_COLUMN))
            .with_context(|| format!("Row {i}: invalid '{YEAR_COLUMN}'"))?;
        let cells = names
            .iter()
            .map(|name| obj.get(name).map_or(CellValue::Missing, json_to_cell))
            .collect();

        records.push(Record {
            country_name,
            year,
            cells,
        });
    }

    let columns = infer_columns(names, &records);
    Ok(IndicatorTable::new(columns, records))
}

fn json_year(val: Option<&JsonValue>) -> Result<i32> {
    match val {
        Some(JsonValue::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).with_context(|| format!("year {i} out of range"))
            } else {
                parse_year(&n.to_string())
            }
        }
        Some(JsonValue::String(s)) => parse_year(s),
        Some(other) => bail!("expected a number, got {other}"),
        None => bail!("missing"),
    }
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => CellValue::Number(f),
            _ => CellValue::Missing,
        },
        JsonValue::String(s) => parse_cell(s),
        JsonValue::Null => CellValue::Missing,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file holding one indicator observation per row.
///
/// Expected schema:
/// - `country_name`: Utf8 or LargeUtf8
/// - `year`: Int16 / Int32 / Int64 (or an integral Float64)
/// - Any other column: float or integer columns are indicators, anything
///   else is kept as a text column
fn load_parquet(path: &Path) -> Result<IndicatorTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let schema = builder.schema().clone();

    let country_idx = schema
        .index_of(COUNTRY_COLUMN)
        .map_err(|_| anyhow!("Parquet file missing '{COUNTRY_COLUMN}' column"))?;
    let year_idx = schema
        .index_of(YEAR_COLUMN)
        .map_err(|_| anyhow!("Parquet file missing '{YEAR_COLUMN}' column"))?;

    let value_cols: Vec<(usize, Column)> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != country_idx && *i != year_idx)
        .map(|(i, f)| (i, Column::new(f.name().clone(), kind_for(f.data_type()))))
        .collect();

    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();
    let mut row_offset = 0usize;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let country_col = batch.column(country_idx);
        let year_col = batch.column(year_idx);

        for row in 0..batch.num_rows() {
            let row_no = row_offset + row;
            let country_name = extract_string(country_col, row)
                .with_context(|| format!("Row {row_no}: failed to read '{COUNTRY_COLUMN}'"))?;
            let year = extract_year(year_col, row)
                .with_context(|| format!("Row {row_no}: failed to read '{YEAR_COLUMN}'"))?;
            let cells = value_cols
                .iter()
                .map(|(idx, _)| extract_cell(batch.column(*idx), row))
                .collect();

            records.push(Record {
                country_name,
                year,
                cells,
            });
        }
        row_offset += batch.num_rows();
    }

    let columns = value_cols.into_iter().map(|(_, col)| col).collect();
    Ok(IndicatorTable::new(columns, records))
}

// -- Parquet / Arrow helpers --

fn kind_for(data_type: &DataType) -> ColumnKind {
    match data_type {
        DataType::Null
        | DataType::Float32
        | DataType::Float64
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64 => ColumnKind::Numeric,
        _ => ColumnKind::Text,
    }
}

fn extract_string(col: &ArrayRef, row: usize) -> Result<String> {
    if col.is_null(row) {
        bail!("null value");
    }
    match col.data_type() {
        DataType::Utf8 => Ok(col.as_string::<i32>().value(row).trim().to_string()),
        DataType::LargeUtf8 => Ok(col.as_string::<i64>().value(row).trim().to_string()),
        other => bail!("expected a string column, got {other:?}"),
    }
}

fn extract_year(col: &ArrayRef, row: usize) -> Result<i32> {
    if col.is_null(row) {
        bail!("null value");
    }
    match col.data_type() {
        DataType::Int16 => Ok(i32::from(col.as_primitive::<Int16Type>().value(row))),
        DataType::Int32 => Ok(col.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => {
            let v = col.as_primitive::<Int64Type>().value(row);
            i32::try_from(v).with_context(|| format!("year {v} out of range"))
        }
        DataType::Float64 => parse_year(&col.as_primitive::<Float64Type>().value(row).to_string()),
        other => bail!("expected an integer column, got {other:?}"),
    }
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.data_type() == &DataType::Null || col.is_null(row) {
        return CellValue::Missing;
    }
    let number = |v: f64| {
        if v.is_finite() {
            CellValue::Number(v)
        } else {
            CellValue::Missing
        }
    };
    match col.data_type() {
        DataType::Float32 => number(f64::from(col.as_primitive::<Float32Type>().value(row))),
        DataType::Float64 => number(col.as_primitive::<Float64Type>().value(row)),
        DataType::Int16 => number(f64::from(col.as_primitive::<Int16Type>().value(row))),
        DataType::Int32 => number(f64::from(col.as_primitive::<Int32Type>().value(row))),
        DataType::Int64 => number(col.as_primitive::<Int64Type>().value(row) as f64),
        DataType::Utf8 => CellValue::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Boolean => CellValue::Text(col.as_boolean().value(row).to_string()),
        other => CellValue::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn csv_loads_typed_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "table.csv",
            "country_name,year,rainfall,code,yield\n\
             Chile,2020,356.5,CHL,\n\
             Peru,2020,1738,PER,NA\n\
             Peru,2019,,PER,4.2\n",
        );

        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 3);
        let kinds: Vec<_> = table.columns.iter().map(|c| (c.name.as_str(), c.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("rainfall", ColumnKind::Numeric),
                ("code", ColumnKind::Text),
                ("yield", ColumnKind::Numeric),
            ]
        );
        assert_eq!(table.indicators().names(), vec!["rainfall", "yield"]);

        let peru_2019 = &table.records[2];
        assert_eq!(peru_2019.country_name, "Peru");
        assert_eq!(peru_2019.year, 2019);
        assert_eq!(
            peru_2019.cells,
            vec![
                CellValue::Missing,
                CellValue::Text("PER".into()),
                CellValue::Number(4.2)
            ]
        );
    }

    #[test]
    fn float_years_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.csv", "year,country_name,a\n2020.0,Cuba,1\n");
        let table = load_file(&path).unwrap();
        assert_eq!(table.records[0].year, 2020);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn missing_year_column_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.csv", "country_name,rainfall\nChile,1\n");
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
        assert!(err.to_string().contains("missing 'year'"), "{err}");
    }

    #[test]
    fn non_integer_year_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.csv", "country_name,year,a\nChile,twenty,1\n");
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
        assert!(err.to_string().contains("row 0"), "{err}");
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.csv", "country_name,year,a\nChile,2020,1,9\n");
        assert!(matches!(load_file(&path), Err(LoadError::Malformed { .. })));
    }

    #[test]
    fn csv_non_finite_and_na_tokens_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "t.csv",
            "country_name,year,a,b,c,d,e,f,g,h\n\
             Chile,2020,inf,-inf,NaN,#N/A,None,NULL,null,N/A\n\
             Peru,2020,1.5,2,3,4,5,6,7,8\n",
        );
        let table = load_file(&path).unwrap();
        assert!(table.records[0].cells.iter().all(|c| *c == CellValue::Missing));
        assert!(table.columns.iter().all(|c| c.kind == ColumnKind::Numeric));
        assert_eq!(table.indicators().len(), 8);
        assert_eq!(table.records[1].cells[0], CellValue::Number(1.5));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.xlsx", "");
        assert!(matches!(
            load_file(&path),
            Err(LoadError::UnsupportedFormat { extension }) if extension == "xlsx"
        ));
    }

    #[test]
    fn json_records_keep_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "t.json",
            r#"[
                {"country_name": "Chile", "year": 2020, "yield": 3.5, "rainfall": null},
                {"country_name": "Peru", "year": "2021", "rainfall": 12, "area": "n/a"}
            ]"#,
        );
        let table = load_file(&path).unwrap();
        assert_eq!(table.indicators().names(), vec!["yield", "rainfall", "area"]);
        assert_eq!(table.records[1].year, 2021);
        assert_eq!(
            table.records[1].cells,
            vec![CellValue::Missing, CellValue::Number(12.0), CellValue::Missing]
        );
    }

    #[test]
    fn json_without_country_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.json", r#"[{"year": 2020, "a": 1}]"#);
        assert!(matches!(load_file(&path), Err(LoadError::Malformed { .. })));
    }

    #[test]
    fn parquet_kinds_follow_arrow_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("country_name", DataType::Utf8, false),
            Field::new("year", DataType::Int64, false),
            Field::new("rainfall", DataType::Float64, true),
            Field::new("code", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["Chile", "Peru"])) as ArrayRef,
                Arc::new(Int64Array::from(vec![2020, 2020])),
                Arc::new(Float64Array::from(vec![Some(356.5), None])),
                Arc::new(StringArray::from(vec![Some("CHL"), None])),
            ],
        )
        .unwrap();
        let file = fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(&path).unwrap();
        assert_eq!(table.indicators().names(), vec!["rainfall"]);
        assert_eq!(table.columns[1].kind, ColumnKind::Text);
        assert_eq!(table.records[0].cells[0], CellValue::Number(356.5));
        assert_eq!(table.records[1].cells, vec![CellValue::Missing, CellValue::Missing]);
        assert_eq!(table.records[1].year, 2020);
    }

    #[test]
    fn parquet_non_finite_floats_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("country_name", DataType::Utf8, false),
            Field::new("year", DataType::Int64, false),
            Field::new("rainfall", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["Chile", "Peru", "Cuba"])) as ArrayRef,
                Arc::new(Int64Array::from(vec![2020, 2020, 2020])),
                Arc::new(Float64Array::from(vec![f64::INFINITY, f64::NAN, 3.0])),
            ],
        )
        .unwrap();
        let file = fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(&path).unwrap();
        assert_eq!(table.columns[0].kind, ColumnKind::Numeric);
        assert_eq!(table.records[0].cells, vec![CellValue::Missing]);
        assert_eq!(table.records[1].cells, vec![CellValue::Missing]);
        assert_eq!(table.records[2].cells, vec![CellValue::Number(3.0)]);
    }
}
