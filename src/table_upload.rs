//! Table Upload Module
//!
//! Reads a spreadsheet-like file into a `DataFrame`. The format comes from
//! the file extension:
//! - `.csv` / `.tsv`
//! - `.parquet`
//! - `.json` (array of records) and `.ndjson` / `.jsonl`

use crate::error::{Result, SheetError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    Csv,
    Tsv,
    Parquet,
    Json,
    NdJson,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "tsv" => Ok(TableFormat::Tsv),
            "parquet" => Ok(TableFormat::Parquet),
            "json" => Ok(TableFormat::Json),
            "ndjson" | "jsonl" => Ok(TableFormat::NdJson),
            _ => Err(SheetError::UnsupportedFormat(format!(
                "{} (expected csv, tsv, parquet, json or ndjson)",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// What was read from disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableUpload {
    pub table_name: String,
    pub format: TableFormat,
    pub row_count: usize,
    pub columns: Vec<ColumnInfo>,
}

impl TableUpload {
    pub fn describe(df: &DataFrame, table_name: &str, format: TableFormat) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|s| ColumnInfo {
                name: s.name().to_string(),
                data_type: format!("{}", s.dtype()),
            })
            .collect();
        Self {
            table_name: table_name.to_string(),
            format,
            row_count: df.height(),
            columns,
        }
    }
}

/// Table name from the file stem ("data/sales_2024.csv" -> "sales_2024")
pub fn table_name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table")
        .to_string()
}

/// Read a file into a `DataFrame`
pub fn read_table(path: impl AsRef<Path>) -> Result<(TableUpload, DataFrame)> {
    let path = path.as_ref();
    let format = TableFormat::from_path(path)?;

    let df = match format {
        TableFormat::Csv | TableFormat::Tsv => {
            let separator = if format == TableFormat::Tsv { b'\t' } else { b',' };
            LazyCsvReader::new(path)
                .with_has_header(true)
                .with_separator(separator)
                .with_try_parse_dates(true)
                .with_infer_schema_length(None)
                .finish()
                .map_err(|e| SheetError::Load(format!("Failed to read CSV {}: {}", path.display(), e)))?
                .collect()?
        }
        TableFormat::Parquet => LazyFrame::scan_parquet(path, ScanArgsParquet::default())
            .map_err(|e| SheetError::Load(format!("Failed to scan parquet {}: {}", path.display(), e)))?
            .collect()?,
        TableFormat::Json | TableFormat::NdJson => {
            let json_format = if format == TableFormat::Json {
                JsonFormat::Json
            } else {
                JsonFormat::JsonLines
            };
            JsonReader::new(File::open(path)?)
                .with_json_format(json_format)
                .finish()
                .map_err(|e| SheetError::Load(format!("Failed to read JSON {}: {}", path.display(), e)))?
        }
    };

    if df.width() == 0 {
        return Err(SheetError::Load(format!("{} has no columns", path.display())));
    }

    let upload = TableUpload::describe(&df, &table_name_from_path(path), format);
    info!(
        "Loaded table '{}' from {} ({} rows, {} columns)",
        upload.table_name,
        path.display(),
        upload.row_count,
        upload.columns.len()
    );
    Ok((upload, df))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a/b.CSV")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("x.jsonl")).unwrap(), TableFormat::NdJson);
        assert!(matches!(
            TableFormat::from_path(Path::new("report.xlsx")),
            Err(SheetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_read_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "Product,Region,Sales\nA,North,100\nB,South,50\nA,South,30\n").unwrap();

        let (upload, df) = read_table(&path).unwrap();
        assert_eq!(upload.table_name, "sales");
        assert_eq!(upload.row_count, 3);
        assert_eq!(df.width(), 3);
        assert!(df.column("Sales").unwrap().dtype().is_numeric());
    }

    #[test]
    fn test_read_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.ndjson");
        std::fs::write(
            &path,
            "{\"city\":\"Riyadh\",\"amount\":10.5}\n{\"city\":\"Jeddah\",\"amount\":4.0}\n",
        )
        .unwrap();

        let (upload, df) = read_table(&path).unwrap();
        assert_eq!(upload.format, TableFormat::NdJson);
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(read_table("/definitely/not/here.csv").is_err());
    }
}
