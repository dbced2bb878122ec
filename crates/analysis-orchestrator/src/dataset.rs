//! Reading and writing entity tables as CSV.
//!
//! Columns are typed by polars schema inference. Empty cells and the usual
//! not-available tokens (`NA`, `n/a`, `#N/A`, `-`, ...) read as null, and
//! every numeric column is widened to `Float64`.

use analysis_core::columns::*;
use analysis_core::{AnalysisError, FinancialTable};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Cells read as missing
pub const NA_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "na", "#N/A", "#NA", "NaN", "nan", "NULL", "null", "None", "-",
];

/// What to do when the input file does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingInputPolicy {
    /// Continue with the built-in three-company sample
    #[default]
    UseSample,
    Fail,
}

impl FromStr for MissingInputPolicy {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sample" | "use_sample" => Ok(MissingInputPolicy::UseSample),
            "fail" => Ok(MissingInputPolicy::Fail),
            other => Err(AnalysisError::InvalidData(format!(
                "Unknown missing-input policy '{}'",
                other
            ))),
        }
    }
}

/// Load `path`, or fall back according to `policy` when it does not exist
pub fn load_table(path: &Path, policy: MissingInputPolicy) -> Result<FinancialTable, AnalysisError> {
    if path.exists() {
        let table = read_csv(File::open(path)?)?;
        tracing::info!(
            path = %path.display(),
            rows = table.len(),
            columns = table.width(),
            "Input data loaded"
        );
        return Ok(table);
    }

    match policy {
        MissingInputPolicy::UseSample => {
            tracing::warn!(path = %path.display(), "Input file not found, using sample data");
            sample_table()
        }
        MissingInputPolicy::Fail => Err(AnalysisError::MissingInput(path.display().to_string())),
    }
}

pub fn read_csv<R: Read>(mut reader: R) -> Result<FinancialTable, AnalysisError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let null_values = NullValues::AllColumns(NA_TOKENS.iter().map(|t| (*t).into()).collect());
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .map_parse_options(|parse| parse.with_null_values(Some(null_values.clone())))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(dataset_error)?;

    let widened: Vec<Expr> = frame
        .get_columns()
        .iter()
        .filter(|c| numeric_or_blank(c))
        .map(|c| col(c.name().clone()).cast(DataType::Float64))
        .collect();
    let frame = frame.lazy().with_columns(widened).collect()?;
    Ok(FinancialTable::from_frame(frame))
}

/// Integer and float columns, plus columns with no value at all
fn numeric_or_blank(column: &Column) -> bool {
    let dtype = column.dtype();
    dtype.is_integer()
        || dtype.is_float()
        || (dtype == &DataType::String && column.null_count() == column.len())
}

pub fn save_table(table: &FinancialTable, path: &Path) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_csv(table, File::create(path)?)?;
    tracing::info!(path = %path.display(), rows = table.len(), "Processed data saved");
    Ok(())
}

/// Write every column; missing numeric cells are written empty
pub fn write_csv<W: Write>(table: &FinancialTable, mut writer: W) -> Result<(), AnalysisError> {
    let blanked: Vec<Expr> = table
        .frame()
        .get_columns()
        .iter()
        .filter(|c| c.dtype().is_float())
        .map(|c| col(c.name().clone()).fill_nan(lit(NULL)))
        .collect();
    let mut frame = table.frame().clone().lazy().with_columns(blanked).collect()?;

    CsvWriter::new(&mut writer)
        .include_header(true)
        .finish(&mut frame)
        .map_err(dataset_error)?;
    writer.flush()?;
    Ok(())
}

/// Three-company table used when no input file is available
pub fn sample_table() -> Result<FinancialTable, AnalysisError> {
    let companies: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    let numeric: [(&str, [f64; 3]); 9] = [
        (CURRENT_ASSETS, [100000.0, 150000.0, 120000.0]),
        (CURRENT_LIABILITIES, [50000.0, 70000.0, 60000.0]),
        (INVENTORY, [20000.0, 30000.0, 25000.0]),
        (CASH, [30000.0, 40000.0, 35000.0]),
        (EQUITY, [50000.0, 80000.0, 60000.0]),
        (TOTAL_LIABILITIES, [50000.0, 70000.0, 60000.0]),
        (BETA, [1.0, 0.8, 0.9]),
        (FCF, [5000.0, 7000.0, 6000.0]),
        (DISTRESS, [0.0, 1.0, 0.0]),
    ];

    numeric.iter().try_fold(
        FinancialTable::new(3).with_text(COMPANY, companies)?,
        |table, (name, values)| table.with_numbers(name, values.to_vec()),
    )
}

fn dataset_error(e: PolarsError) -> AnalysisError {
    AnalysisError::Dataset(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_types_columns() {
        let data = "Company,CurrentAssets,Inventory,Listed\nA,100000,,true\nB,150000,30000,false\n";
        let table = read_csv(data.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.entity_name(1), Some("B"));
        assert_eq!(table.numbers(CURRENT_ASSETS).unwrap(), &[100000.0, 150000.0]);
        assert!(table.missing_columns(&[CURRENT_ASSETS, INVENTORY]).is_empty());
        assert!(table.numbers(INVENTORY).unwrap()[0].is_nan());
        assert_eq!(table.flags("Listed").unwrap(), &[true, false]);
    }

    #[test]
    fn test_write_csv_blanks_nan() {
        let table = FinancialTable::new(2)
            .with_text(COMPANY, vec!["A".to_string(), "B".to_string()])
            .unwrap()
            .with_numbers(CASH, vec![1.5, f64::NAN])
            .unwrap()
            .with_flags(DQ_INVALID_FCF, vec![false, true])
            .unwrap();

        let mut out = Vec::new();
        write_csv(&table, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Company,Cash,DQ_Invalid_FCF\nA,1.5,false\nB,,true\n"
        );

        let back = read_csv(text.as_bytes()).unwrap();
        assert!(back.numbers(CASH).unwrap()[1].is_nan());
        assert_eq!(back.flags(DQ_INVALID_FCF).unwrap(), &[false, true]);
    }

    #[test]
    fn test_na_tokens_read_as_missing() {
        let data = "Company,TotalAssets,NetIncome\nA,100000,5000\nB,n/a,#N/A\nC,-,NA\n";
        let table = read_csv(data.as_bytes()).unwrap();

        let assets = table.numbers(TOTAL_ASSETS).unwrap();
        assert_eq!(assets[0], 100000.0);
        assert!(assets[1].is_nan() && assets[2].is_nan());
        assert!(table.missing_columns(&[TOTAL_ASSETS, NET_INCOME]).is_empty());
    }

    #[test]
    fn test_blank_column_is_numeric() {
        let data = "Company,Cash\nA,\nB,\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert!(table.numbers(CASH).unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_missing_file_policy() {
        let path = Path::new("/nonexistent/financial_data.csv");

        let table = load_table(path, MissingInputPolicy::UseSample).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.numbers(BETA).unwrap(), &[1.0, 0.8, 0.9]);

        assert!(matches!(
            load_table(path, MissingInputPolicy::Fail),
            Err(AnalysisError::MissingInput(_))
        ));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("sample".parse::<MissingInputPolicy>().unwrap(), MissingInputPolicy::UseSample);
        assert_eq!("FAIL".parse::<MissingInputPolicy>().unwrap(), MissingInputPolicy::Fail);
    }
}
