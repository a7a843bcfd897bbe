// src/export/panel.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt16Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use csv::Writer;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{fs::File, path::Path, sync::Arc};
use tracing::info;

use crate::group::{GroupedPanel, GroupedRow};
use crate::normalize::ColumnSpec;

const LEAD_COLUMNS: [&str; 6] = ["year", "group_id", "role", "source", "line_number", "name"];

fn kept_rows(panels: &[GroupedPanel]) -> impl Iterator<Item = (u16, &GroupedRow)> {
    panels
        .iter()
        .flat_map(|p| p.reduced().map(move |r| (p.year, r)))
}

/// Flat CSV of the reduced panels: lead columns then one column per numeric
/// field, missing written as an empty cell.
pub fn write_panel_csv(path: &Path, panels: &[GroupedPanel], columns: &[ColumnSpec]) -> Result<usize> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("creating panel csv {}", path.display()))?;

    let header: Vec<&str> = LEAD_COLUMNS
        .iter()
        .copied()
        .chain(columns.iter().map(|c| c.name.as_str()))
        .collect();
    wtr.write_record(&header)?;

    let mut written = 0usize;
    for (year, r) in kept_rows(panels) {
        let mut record = vec![
            year.to_string(),
            r.group_id.to_string(),
            r.role.as_str().to_string(),
            r.row.source.clone(),
            r.row.line_number.clone(),
            r.row.name.clone(),
        ];
        for col in columns {
            let cell = r.row.cell(&col.name);
            record.push(cell.value().map(|_| cell.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)?;
        written += 1;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = written, "panel csv written");
    Ok(written)
}

fn panel_schema(columns: &[ColumnSpec]) -> Schema {
    let mut fields = vec![
        Field::new("year", DataType::UInt16, false),
        Field::new("group_id", DataType::UInt64, false),
        Field::new("role", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("line_number", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
    ];
    fields.extend(
        columns
            .iter()
            .map(|c| Field::new(&c.name, DataType::Float64, true)),
    );
    Schema::new(fields)
}

/// Build the Arrow batch for the reduced panels.
pub fn panel_batch(panels: &[GroupedPanel], columns: &[ColumnSpec]) -> Result<RecordBatch> {
    let rows: Vec<(u16, &GroupedRow)> = kept_rows(panels).collect();

    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt16Array::from_iter_values(rows.iter().map(|(y, _)| *y))),
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|(_, r)| r.group_id as u64),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, r)| r.role.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, r)| r.row.source.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, r)| r.row.line_number.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, r)| r.row.name.as_str()),
        )),
    ];
    for col in columns {
        let values: Float64Array = rows
            .iter()
            .map(|(_, r)| r.row.cell(&col.name).value())
            .collect();
        arrays.push(Arc::new(values));
    }

    RecordBatch::try_new(Arc::new(panel_schema(columns)), arrays)
        .context("building panel record batch")
}

/// Snappy-compressed Parquet of the reduced panels.
pub fn write_panel_parquet(
    path: &Path,
    panels: &[GroupedPanel],
    columns: &[ColumnSpec],
) -> Result<usize> {
    let batch = panel_batch(panels, columns)?;
    let file =
        File::create(path).with_context(|| format!("creating panel parquet {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer for panel")?;
    writer.write(&batch).context("writing panel batch")?;
    writer.close().context("closing panel writer")?;
    info!(path = %path.display(), rows = batch.num_rows(), "panel parquet written");
    Ok(batch.num_rows())
}
