use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use parquet::basic::{Compression, Type as PhysicalType};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::Field;
use parquet::schema::parser::parse_message_type;

/// One nullable column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Str(Vec<Option<String>>),
    I64(Vec<Option<i64>>),
    F64(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Str(v) => v.len(),
            ColumnData::I64(v) => v.len(),
            ColumnData::F64(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
        }
    }

    fn parquet_decl(&self, name: &str) -> String {
        match self {
            ColumnData::Str(_) => format!("OPTIONAL BYTE_ARRAY {name} (UTF8);"),
            ColumnData::I64(_) => format!("OPTIONAL INT64 {name};"),
            ColumnData::F64(_) => format!("OPTIONAL DOUBLE {name};"),
            ColumnData::Bool(_) => format!("OPTIONAL BOOLEAN {name};"),
        }
    }
}

/// Column-major table: the unit every stage reads and writes.
///
/// Columns keep insertion order so repeated runs serialize identically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<(String, ColumnData)>,
    n_rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn add(&mut self, name: impl Into<String>, data: ColumnData) {
        let name = name.into();
        if self.columns.is_empty() {
            self.n_rows = data.len();
        } else {
            assert_eq!(
                data.len(),
                self.n_rows,
                "column {name} length mismatch: {} vs {}",
                data.len(),
                self.n_rows
            );
        }
        assert!(!self.has_column(&name), "duplicate column {name}");
        self.columns.push((name, data));
    }

    pub fn add_str(&mut self, name: impl Into<String>, values: Vec<Option<String>>) {
        self.add(name, ColumnData::Str(values));
    }

    pub fn add_i64(&mut self, name: impl Into<String>, values: Vec<Option<i64>>) {
        self.add(name, ColumnData::I64(values));
    }

    pub fn add_f64(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        self.add(name, ColumnData::F64(values));
    }

    pub fn add_bool(&mut self, name: impl Into<String>, values: Vec<Option<bool>>) {
        self.add(name, ColumnData::Bool(values));
    }

    fn col(&self, name: &str) -> Result<&ColumnData> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
            .ok_or_else(|| anyhow!("missing column {name}"))
    }

    pub fn str_col(&self, name: &str) -> Result<&[Option<String>]> {
        match self.col(name)? {
            ColumnData::Str(v) => Ok(v),
            other => bail!("column {name} is not a string column: {other:?}"),
        }
    }

    pub fn i64_col(&self, name: &str) -> Result<&[Option<i64>]> {
        match self.col(name)? {
            ColumnData::I64(v) => Ok(v),
            other => bail!("column {name} is not an integer column: {other:?}"),
        }
    }

    pub fn bool_col(&self, name: &str) -> Result<&[Option<bool>]> {
        match self.col(name)? {
            ColumnData::Bool(v) => Ok(v),
            other => bail!("column {name} is not a boolean column: {other:?}"),
        }
    }

    /// Numeric column as f64, coercing integers. Raw extraction output is not
    /// strict about INT64 vs DOUBLE for count columns.
    pub fn f64_col(&self, name: &str) -> Result<Vec<Option<f64>>> {
        match self.col(name)? {
            ColumnData::F64(v) => Ok(v.clone()),
            ColumnData::I64(v) => Ok(v.iter().map(|x| x.map(|n| n as f64)).collect()),
            other => bail!("column {name} is not numeric: {other:?}"),
        }
    }

    pub fn f64_col_opt(&self, name: &str) -> Option<Vec<Option<f64>>> {
        if self.has_column(name) {
            self.f64_col(name).ok()
        } else {
            None
        }
    }

    /// Write as a single-row-group parquet file, atomically (tmp + rename).
    /// Uncompressed with fixed writer properties so unchanged inputs produce
    /// byte-identical files.
    pub fn write_parquet(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let mut message = String::from("message table {\n");
        for (name, data) in &self.columns {
            message.push_str("  ");
            message.push_str(&data.parquet_decl(name));
            message.push('\n');
        }
        message.push('}');
        let schema = parse_message_type(&message).context("build parquet schema")?;
        let props = WriterProperties::builder()
            .set_compression(Compression::UNCOMPRESSED)
            .build();

        let tmp = path.with_extension("parquet.tmp");
        let file =
            File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let mut writer = SerializedFileWriter::new(file, Arc::new(schema), Arc::new(props))
            .context("open parquet writer")?;
        let mut rg = writer.next_row_group().context("open row group")?;
        let mut idx = 0usize;
        while let Some(mut col_writer) = rg.next_column().context("next column")? {
            let (name, data) = &self.columns[idx];
            match data {
                ColumnData::Str(values) => {
                    let mut defs: Vec<i16> = Vec::with_capacity(values.len());
                    let mut batch: Vec<ByteArray> = Vec::new();
                    for v in values {
                        match v {
                            Some(s) => {
                                defs.push(1);
                                batch.push(ByteArray::from(s.as_str()));
                            }
                            None => defs.push(0),
                        }
                    }
                    col_writer
                        .typed::<ByteArrayType>()
                        .write_batch(&batch, Some(&defs), None)
                        .with_context(|| format!("write column {name}"))?;
                }
                ColumnData::I64(values) => {
                    let mut defs: Vec<i16> = Vec::with_capacity(values.len());
                    let mut batch: Vec<i64> = Vec::new();
                    for v in values {
                        match v {
                            Some(n) => {
                                defs.push(1);
                                batch.push(*n);
                            }
                            None => defs.push(0),
                        }
                    }
                    col_writer
                        .typed::<Int64Type>()
                        .write_batch(&batch, Some(&defs), None)
                        .with_context(|| format!("write column {name}"))?;
                }
                ColumnData::F64(values) => {
                    let mut defs: Vec<i16> = Vec::with_capacity(values.len());
                    let mut batch: Vec<f64> = Vec::new();
                    for v in values {
                        match v {
                            Some(x) => {
                                defs.push(1);
                                batch.push(*x);
                            }
                            None => defs.push(0),
                        }
                    }
                    col_writer
                        .typed::<DoubleType>()
                        .write_batch(&batch, Some(&defs), None)
                        .with_context(|| format!("write column {name}"))?;
                }
                ColumnData::Bool(values) => {
                    let mut defs: Vec<i16> = Vec::with_capacity(values.len());
                    let mut batch: Vec<bool> = Vec::new();
                    for v in values {
                        match v {
                            Some(b) => {
                                defs.push(1);
                                batch.push(*b);
                            }
                            None => defs.push(0),
                        }
                    }
                    col_writer
                        .typed::<BoolType>()
                        .write_batch(&batch, Some(&defs), None)
                        .with_context(|| format!("write column {name}"))?;
                }
            }
            col_writer.close().context("close column")?;
            idx += 1;
        }
        rg.close().context("close row group")?;
        writer.close().context("close parquet writer")?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("swap {} into place", path.display()))?;
        Ok(())
    }

    pub fn read_parquet(path: &Path) -> Result<Table> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let reader =
            SerializedFileReader::new(file).with_context(|| format!("read {}", path.display()))?;
        let descr = reader.metadata().file_metadata().schema_descr_ptr();

        let mut columns: Vec<(String, ColumnData)> = Vec::new();
        for col in descr.columns() {
            let name = col.name().to_string();
            let data = match col.physical_type() {
                PhysicalType::BYTE_ARRAY => ColumnData::Str(Vec::new()),
                PhysicalType::INT32 | PhysicalType::INT64 => ColumnData::I64(Vec::new()),
                PhysicalType::FLOAT | PhysicalType::DOUBLE => ColumnData::F64(Vec::new()),
                PhysicalType::BOOLEAN => ColumnData::Bool(Vec::new()),
                other => bail!("unsupported parquet type {other} in {}", path.display()),
            };
            columns.push((name, data));
        }

        let mut n_rows = 0usize;
        let iter = reader
            .get_row_iter(None)
            .with_context(|| format!("iterate rows of {}", path.display()))?;
        for row in iter {
            let row = row.with_context(|| format!("decode row of {}", path.display()))?;
            for (idx, (_, field)) in row.get_column_iter().enumerate() {
                let (name, data) = &mut columns[idx];
                match (data, field) {
                    (ColumnData::Str(v), Field::Str(s)) => v.push(Some(s.clone())),
                    (ColumnData::Str(v), Field::Null) => v.push(None),
                    (ColumnData::I64(v), Field::Long(n)) => v.push(Some(*n)),
                    (ColumnData::I64(v), Field::Int(n)) => v.push(Some(*n as i64)),
                    (ColumnData::I64(v), Field::Null) => v.push(None),
                    (ColumnData::F64(v), Field::Double(x)) => v.push(Some(*x)),
                    (ColumnData::F64(v), Field::Float(x)) => v.push(Some(*x as f64)),
                    (ColumnData::F64(v), Field::Null) => v.push(None),
                    (ColumnData::Bool(v), Field::Bool(b)) => v.push(Some(*b)),
                    (ColumnData::Bool(v), Field::Null) => v.push(None),
                    (_, field) => bail!(
                        "unexpected value {field:?} for column {name} in {}",
                        path.display()
                    ),
                }
            }
            n_rows += 1;
        }

        Ok(Table { columns, n_rows })
    }

    /// CSV mirror for the human-auditable tables. Nulls become empty cells.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let tmp = path.with_extension("csv.tmp");
        let mut writer = csv::Writer::from_path(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        writer
            .write_record(self.column_names())
            .context("write csv header")?;
        for row in 0..self.n_rows {
            let mut record: Vec<String> = Vec::with_capacity(self.columns.len());
            for (_, data) in &self.columns {
                record.push(match data {
                    ColumnData::Str(v) => v[row].clone().unwrap_or_default(),
                    ColumnData::I64(v) => v[row].map(|n| n.to_string()).unwrap_or_default(),
                    ColumnData::F64(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
                    ColumnData::Bool(v) => v[row].map(|b| b.to_string()).unwrap_or_default(),
                });
            }
            writer.write_record(&record).context("write csv row")?;
        }
        writer.flush().context("flush csv")?;
        drop(writer);
        std::fs::rename(&tmp, path)
            .with_context(|| format!("swap {} into place", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new();
        t.add_str(
            "match_id",
            vec![Some("m1".into()), Some("m2".into()), Some("m3".into())],
        );
        t.add_i64("home_score", vec![Some(2), Some(0), None]);
        t.add_f64("xg", vec![Some(1.25), None, Some(0.0)]);
        t.add_bool("finished", vec![Some(true), Some(true), None]);
        t
    }

    #[test]
    fn parquet_round_trip_preserves_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        let table = sample();
        table.write_parquet(&path).unwrap();
        let back = Table::read_parquet(&path).unwrap();
        assert_eq!(back.n_rows(), 3);
        assert_eq!(back.str_col("match_id").unwrap()[1].as_deref(), Some("m2"));
        assert_eq!(back.i64_col("home_score").unwrap()[2], None);
        assert_eq!(back.f64_col("xg").unwrap()[0], Some(1.25));
        assert_eq!(back.bool_col("finished").unwrap()[2], None);
    }

    #[test]
    fn rewrite_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.parquet");
        let b = dir.path().join("b.parquet");
        let table = sample();
        table.write_parquet(&a).unwrap();
        table.write_parquet(&b).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    #[test]
    fn csv_mirror_blanks_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        sample().write_csv(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines[0], "match_id,home_score,xg,finished");
        assert_eq!(lines[3], "m3,,0,");
    }

    #[test]
    fn empty_table_with_declared_columns_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");
        let mut t = Table::new();
        t.add_str("match_id", vec![]);
        t.add_f64("sub_minute", vec![]);
        t.write_parquet(&path).unwrap();
        let back = Table::read_parquet(&path).unwrap();
        assert_eq!(back.n_rows(), 0);
        assert!(back.has_column("sub_minute"));
    }
}
