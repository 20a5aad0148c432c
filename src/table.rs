//! The per-region metric report and its CSV representation.

use csv::WriterBuilder;

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::color_lut::ColorLut;
use crate::error::Result;

pub const SUBJECT_COLUMN: &str = "subject";
pub const REGION_COLUMN: &str = "region";

/// The human-readable label used for a numeric region identifier.
pub fn region_label(region: i64) -> String {
    format!("region_{}", region)
}

/// One row of a [`ResultTable`]: the metric means of one region of one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub subject: String,
    pub region: String,
    /// The numeric region identifier, if the row came from a label volume rather than a named mask.
    pub region_id: Option<i64>,
    /// One value per metric, in the metric order of the table. NaN marks a missing value.
    pub values: Vec<f64>,
}

/// A table with columns `subject`, `region` and one column per metric.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    metric_names: Vec<String>,
    rows: Vec<MetricRow>,
}

impl ResultTable {
    pub fn new(metric_names: Vec<String>) -> ResultTable {
        ResultTable {
            metric_names,
            rows: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, row: MetricRow) {
        debug_assert_eq!(row.values.len(), self.metric_names.len());
        self.rows.push(row);
    }

    /// All column names, in order.
    pub fn columns(&self) -> Vec<String> {
        let mut cols = vec![SUBJECT_COLUMN.to_string(), REGION_COLUMN.to_string()];
        cols.extend(self.metric_names.iter().cloned());
        cols
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a single cell by region label and metric name.
    pub fn value(&self, region: &str, metric: &str) -> Option<f64> {
        let col = self.metric_names.iter().position(|m| m == metric)?;
        self.rows
            .iter()
            .find(|r| r.region == region)
            .map(|r| r.values[col])
    }

    /// Replace numeric region labels by the names from a color lookup table.
    ///
    /// Rows whose identifier has no entry in the table, and rows without a numeric
    /// identifier, keep their label.
    pub fn rename_regions(&mut self, lut: &ColorLut) {
        for row in self.rows.iter_mut() {
            if let Some(name) = row.region_id.and_then(|id| lut.name_of(id)) {
                row.region = name.to_string();
            }
        }
    }

    /// Write the table as CSV with a header line. NaN values are written as empty fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
        wtr.write_record(self.columns())?;
        for row in self.rows.iter() {
            let mut record: Vec<String> = Vec::with_capacity(row.values.len() + 2);
            record.push(row.subject.clone());
            record.push(row.region.clone());
            record.extend(row.values.iter().map(|v| format_cell(*v)));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file, replacing any existing file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        self.write_csv(file)
    }
}

fn format_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Metric table with {} regions and {} metrics.", self.rows.len(), self.metric_names.len())
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn demo_table() -> ResultTable {
        let mut table = ResultTable::new(vec![String::from("FA"), String::from("T1")]);
        table.push(MetricRow {
            subject: String::from("sub-01"),
            region: region_label(17),
            region_id: Some(17),
            values: vec![0.25, f64::NAN],
        });
        table.push(MetricRow {
            subject: String::from("sub-01"),
            region: region_label(53),
            region_id: Some(53),
            values: vec![0.5, 1200.0],
        });
        table
    }

    #[test]
    fn csv_output_has_header_and_empty_nan_cells() {
        let mut buf: Vec<u8> = Vec::new();
        demo_table().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "subject,region,FA,T1");
        assert_eq!(lines[1], "sub-01,region_17,0.25,");
        assert_eq!(lines[2], "sub-01,region_53,0.5,1200");
    }

    #[test]
    fn cells_can_be_looked_up_by_region_and_metric() {
        let table = demo_table();
        assert_eq!(table.value("region_53", "T1"), Some(1200.0));
        assert!(table.value("region_17", "T1").unwrap().is_nan());
        assert_eq!(table.value("region_99", "T1"), None);
        assert_eq!(table.value("region_17", "MD"), None);
    }

    #[test]
    fn regions_are_renamed_from_lut() {
        let lut = ColorLut::from_reader("17 Left-Hippocampus 220 216 20 0\n".as_bytes()).unwrap();
        let mut table = demo_table();
        table.rename_regions(&lut);
        assert_eq!(table.rows()[0].region, "Left-Hippocampus");
        assert_eq!(table.rows()[1].region, "region_53");
    }

    #[test]
    fn the_csv_file_can_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        demo_table().to_csv_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("subject,region,FA,T1\n"));
    }
}
