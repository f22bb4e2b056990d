//! Parquet trade ledger

use super::DataError;
use crate::execution::ExecutionQuality;
use crate::risk::ClosedTrade;
use crate::signal::Side;
use arrow::array::{ArrayRef, BooleanArray, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

fn timestamp_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )
}

/// Closed trade schema; decimals are stored as strings to keep precision
pub fn trade_ledger_schema() -> Schema {
    Schema::new(vec![
        Field::new("event_id", DataType::Utf8, false),
        Field::new("side", DataType::Utf8, false),
        timestamp_field("entry_timestamp"),
        timestamp_field("exit_timestamp"),
        Field::new("entry_price", DataType::Utf8, false),
        Field::new("exit_price", DataType::Utf8, false),
        Field::new("contracts", DataType::Utf8, false),
        Field::new("gross_profit", DataType::Utf8, false),
        Field::new("fees", DataType::Utf8, false),
        Field::new("slippage", DataType::Utf8, false),
        Field::new("net_profit", DataType::Utf8, false),
        Field::new("exit_quality", DataType::Utf8, false),
        Field::new("forced_close", DataType::Boolean, false),
    ])
}

/// Writes closed trades to a Snappy-compressed Parquet file
pub struct TradeLedgerWriter {
    output_dir: PathBuf,
}

impl TradeLedgerWriter {
    /// Create a writer rooted at an output directory
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Path of the ledger file for a given label
    pub fn file_path(&self, label: &str) -> PathBuf {
        let sanitized: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        self.output_dir.join(format!("trades_{}.parquet", sanitized))
    }

    /// Write trades, returning the file path. Nothing is written for an empty ledger.
    pub fn write(&self, label: &str, trades: &[ClosedTrade]) -> Result<Option<PathBuf>, DataError> {
        if trades.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(&self.output_dir)?;
        let path = self.file_path(label);

        let schema = Arc::new(trade_ledger_schema());
        let file = File::create(&path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        let decimal_column = |f: fn(&ClosedTrade) -> Decimal| -> ArrayRef {
            Arc::new(StringArray::from(
                trades.iter().map(|t| f(t).to_string()).collect::<Vec<_>>(),
            ))
        };
        let micros_column = |micros: Vec<i64>| -> ArrayRef {
            Arc::new(TimestampMicrosecondArray::from(micros).with_timezone("UTC"))
        };

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(
                trades.iter().map(|t| t.event_id.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                trades.iter().map(|t| t.side.as_str()).collect::<Vec<_>>(),
            )),
            micros_column(
                trades
                    .iter()
                    .map(|t| t.entry_timestamp.timestamp_micros())
                    .collect(),
            ),
            micros_column(
                trades
                    .iter()
                    .map(|t| t.exit_timestamp.timestamp_micros())
                    .collect(),
            ),
            decimal_column(|t| t.entry_price),
            decimal_column(|t| t.exit_price),
            decimal_column(|t| t.contracts),
            decimal_column(|t| t.gross_profit),
            decimal_column(|t| t.fees),
            decimal_column(|t| t.slippage),
            decimal_column(|t| t.net_profit),
            Arc::new(StringArray::from(
                trades
                    .iter()
                    .map(|t| t.exit_quality.as_str())
                    .collect::<Vec<_>>(),
            )),
            Arc::new(BooleanArray::from(
                trades.iter().map(|t| t.forced_close).collect::<Vec<_>>(),
            )),
        ];

        let batch = RecordBatch::try_new(schema, columns)?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = trades.len(), "Wrote trade ledger to Parquet");

        Ok(Some(path))
    }
}

/// Reads a trade ledger back into memory
pub struct TradeLedgerReader {
    path: PathBuf,
}

impl TradeLedgerReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read all trades in file order
    pub fn read(&self) -> Result<Vec<ClosedTrade>, DataError> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut trades = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;

            let forced = batch
                .column(12)
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| DataError::InvalidColumn("forced_close".to_string()))?;

            let event_ids = string_column(&batch, 0)?;
            let sides = string_column(&batch, 1)?;
            let entries = timestamp_column(&batch, 2)?;
            let exits = timestamp_column(&batch, 3)?;
            let qualities = string_column(&batch, 11)?;
            let decimals = (4..=10)
                .map(|idx| string_column(&batch, idx))
                .collect::<Result<Vec<_>, _>>()?;

            let decimal_at = |col: usize, row: usize| -> Result<Decimal, DataError> {
                let raw = decimals[col - 4].value(row);
                Decimal::from_str(raw)
                    .map_err(|e| DataError::InvalidColumn(format!("{}: {}", raw, e)))
            };
            let timestamp_at = |array: &TimestampMicrosecondArray, row: usize| {
                DateTime::from_timestamp_micros(array.value(row))
                    .ok_or_else(|| DataError::InvalidColumn("timestamp out of range".to_string()))
            };

            for row in 0..batch.num_rows() {
                trades.push(ClosedTrade {
                    event_id: event_ids.value(row).to_string(),
                    side: Side::from_str(sides.value(row)).map_err(DataError::InvalidColumn)?,
                    entry_timestamp: timestamp_at(entries, row)?,
                    exit_timestamp: timestamp_at(exits, row)?,
                    entry_price: decimal_at(4, row)?,
                    exit_price: decimal_at(5, row)?,
                    contracts: decimal_at(6, row)?,
                    gross_profit: decimal_at(7, row)?,
                    fees: decimal_at(8, row)?,
                    slippage: decimal_at(9, row)?,
                    net_profit: decimal_at(10, row)?,
                    exit_quality: ExecutionQuality::from_str(qualities.value(row))
                        .map_err(DataError::InvalidColumn)?,
                    forced_close: forced.value(row),
                });
            }
        }

        Ok(trades)
    }
}

fn string_column(batch: &RecordBatch, idx: usize) -> Result<&StringArray, DataError> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| DataError::InvalidColumn(format!("column {} is not utf8", idx)))
}

fn timestamp_column(
    batch: &RecordBatch,
    idx: usize,
) -> Result<&TimestampMicrosecondArray, DataError> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| DataError::InvalidColumn(format!("column {} is not a timestamp", idx)))
}
