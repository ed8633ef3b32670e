use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::normalize::{CleanTable, SemanticType, Value};

/// Arrow type carrying each semantic type.
fn arrow_type(ty: SemanticType) -> DataType {
    match ty {
        SemanticType::String | SemanticType::Categorical => DataType::Utf8,
        SemanticType::Integer | SemanticType::HourOfDay => DataType::Int64,
        SemanticType::FloatLocale => DataType::Float64,
        SemanticType::Date => DataType::Timestamp(TimeUnit::Millisecond, None),
    }
}

pub fn arrow_schema(table: &CleanTable) -> Arc<Schema> {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.ty), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Columnar copy of `table`, or of the rows in `selection`. Nulls stay null.
pub fn to_record_batch(table: &CleanTable, selection: Option<&[usize]>) -> Result<RecordBatch> {
    let schema = arrow_schema(table);
    let rows: Vec<usize> = match selection {
        Some(rows) => {
            if let Some(bad) = rows.iter().find(|&&i| i >= table.len()) {
                anyhow::bail!("row {} out of range", bad);
            }
            rows.to_vec()
        }
        None => (0..table.len()).collect(),
    };

    let arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(col, meta)| {
            let cells = rows.iter().map(|&r| &table.raw_values(r)[col]);
            let array: ArrayRef = match arrow_type(meta.ty) {
                DataType::Utf8 => Arc::new(cells.map(Value::as_str).collect::<StringArray>()),
                DataType::Int64 => Arc::new(cells.map(Value::as_i64).collect::<Int64Array>()),
                DataType::Float64 => Arc::new(cells.map(Value::as_f64).collect::<Float64Array>()),
                _ => Arc::new(
                    cells
                        .map(|v| v.as_date().map(|d| d.and_utc().timestamp_millis()))
                        .collect::<TimestampMillisecondArray>(),
                ),
            };
            array
        })
        .collect();

    RecordBatch::try_new(schema, arrays).context("building record batch")
}

/// Write `table` as one Parquet file, through a temp file renamed into place.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn write_parquet<P: AsRef<Path>>(
    table: &CleanTable,
    selection: Option<&[usize]>,
    path: P,
) -> Result<()> {
    let path = path.as_ref();

    // 1) build the batch
    let batch = to_record_batch(table, selection)?;
    debug!(rows = batch.num_rows(), columns = batch.num_columns(), "record batch built");

    // 2) parquet writer properties
    let props = WriterProperties::builder()
        .set_compression(Compression::BROTLI(
            BrotliLevel::try_new(5).context("brotli level")?,
        ))
        .set_dictionary_enabled(true)
        .build();

    // 3) write to a temporary path, then move into place
    let tmp_path = path.with_extension("parquet.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;

    info!(rows = batch.num_rows(), "wrote parquet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::RawTable;
    use crate::normalize::{normalize, ColumnDef, ColumnSpec};
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn table() -> CleanTable {
        let raw = RawTable::new(
            vec!["data".into(), "horario".into(), "km".into(), "sentido".into()],
            vec![
                vec![
                    Some("05/03/2021 23:47:01,250".into()),
                    Some("23:47".into()),
                    Some("12,5".into()),
                    Some("Norte".into()),
                ],
                vec![
                    Some("06/03/2021".into()),
                    Some("07:10".into()),
                    None,
                    None,
                ],
            ],
        );
        let spec = ColumnSpec::new(vec![
            ColumnDef::new("data", SemanticType::Date).required(),
            ColumnDef::new("horario", SemanticType::HourOfDay).required(),
            ColumnDef::new("km", SemanticType::FloatLocale),
            ColumnDef::new("sentido", SemanticType::Categorical),
        ]);
        normalize(&raw, &spec).unwrap().0
    }

    #[test]
    fn batch_is_typed_and_keeps_nulls() {
        let batch = to_record_batch(&table(), None).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(
            batch.schema().field(0).data_type(),
            &DataType::Timestamp(TimeUnit::Millisecond, None)
        );

        let data = batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .unwrap();
        assert_eq!(data.value(0), 1_614_988_021_250);

        let horario = batch.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(horario.values().to_vec(), vec![23, 7]);

        let km = batch.column(2).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(km.value(0), 12.5);
        assert!(km.is_null(1));
        assert!(batch.column(3).is_null(1));
    }

    #[test]
    fn selection_out_of_range_is_an_error() {
        assert!(to_record_batch(&table(), Some(&[0, 5])).is_err());
        let batch = to_record_batch(&table(), Some(&[1])).unwrap();
        assert_eq!(batch.num_rows(), 1);
    }

    #[test]
    fn parquet_file_reads_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("acidentes.parquet");
        write_parquet(&table(), None, &path)?;

        let file = File::open(&path)?;
        let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let batch = reader.next().context("no batch")??;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(3).name(), "sentido");
        assert!(!path.with_extension("parquet.tmp").exists());
        Ok(())
    }
}
