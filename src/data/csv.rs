//! CSV export of the `electricity_monitor` table, loaded with polars

use super::{distinct_devices, filter_and_order, parse_timestamp, RawReading, ReadingSource};
use crate::error::{IdsError, Result};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Reading source backed by a CSV file
///
/// Expected header: `data_id,device_id,voltage,current,power,energy,frequency,power_factor,created_at`.
/// Empty cells are treated as missing values.
pub struct CsvReadingSource {
    path: PathBuf,
    frame: Option<DataFrame>,
}

impl CsvReadingSource {
    /// Open and parse the file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let start = Instant::now();

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .try_into_reader_with_file_path(Some(path.clone()))?
            .finish()?;

        tracing::debug!(
            path = %path.display(),
            rows = frame.height(),
            elapsed = ?start.elapsed(),
            "Loaded readings CSV"
        );

        Ok(Self { path, frame: Some(frame) })
    }

    fn frame(&self) -> Result<&DataFrame> {
        self.frame.as_ref().ok_or_else(|| {
            IdsError::DataError(format!("Source {} already closed", self.path.display()))
        })
    }

    fn rows(&self) -> Result<Vec<RawReading>> {
        let df = self.frame()?;

        let data_ids = df.column("data_id")?.cast(&DataType::Int64)?;
        let data_ids = data_ids.i64()?;
        let devices = string_column(df, "device_id")?;
        let created = string_column(df, "created_at")?;

        let voltage = f64_column(df, "voltage")?;
        let current = f64_column(df, "current")?;
        let power = f64_column(df, "power")?;
        let energy = f64_column(df, "energy")?;
        let frequency = f64_column(df, "frequency")?;
        let power_factor = f64_column(df, "power_factor")?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let data_id = data_ids.get(i).ok_or_else(|| {
                IdsError::DataError(format!("Row {} has no data_id", i))
            })?;

            rows.push(RawReading {
                data_id,
                device_id: devices[i].clone().filter(|s| !s.is_empty()),
                voltage: voltage[i],
                current: current[i],
                power: power[i],
                energy: energy[i],
                frequency: frequency[i],
                power_factor: power_factor[i],
                created_at: created[i].as_deref().and_then(parse_timestamp),
            });
        }

        Ok(rows)
    }
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}

impl ReadingSource for CsvReadingSource {
    fn fetch_readings(&mut self, min_power: f64) -> Result<Vec<RawReading>> {
        Ok(filter_and_order(self.rows()?, min_power))
    }

    fn device_ids(&mut self) -> Result<Vec<String>> {
        let devices = string_column(self.frame()?, "device_id")?;
        Ok(distinct_devices(devices.iter().map(|d| d.as_deref())))
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.frame = None;
        tracing::debug!(path = %self.path.display(), "Closed readings CSV");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv() -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(
            tmp.as_file(),
            "data_id,device_id,voltage,current,power,energy,frequency,power_factor,created_at"
        )
        .unwrap();
        writeln!(tmp.as_file(), "1,AA:BB,230.1,1.2,276.0,12.5,50.0,0.98,2024-01-01 10:00:00").unwrap();
        writeln!(tmp.as_file(), "2,AA:BB,229.0,0.0,0.1,12.5,50.0,0.10,2024-01-01 11:00:00").unwrap();
        writeln!(tmp.as_file(), "3,CC:DD,,2.0,460.0,3.0,49.9,0.95,2024-01-01 12:00:00").unwrap();
        tmp.as_file().flush().unwrap();
        tmp
    }

    #[test]
    fn test_csv_fetch_filters_and_orders() {
        let tmp = write_csv();
        let mut source = CsvReadingSource::open(tmp.path()).unwrap();
        let rows = source.fetch_readings(0.5).unwrap();

        let ids: Vec<i64> = rows.iter().map(|r| r.data_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(rows[0].voltage, None);
        assert_eq!(rows[0].device_id.as_deref(), Some("CC:DD"));
    }

    #[test]
    fn test_csv_device_ids() {
        let tmp = write_csv();
        let mut source = CsvReadingSource::open(tmp.path()).unwrap();
        let devices = source.device_ids().unwrap();
        assert_eq!(devices, vec!["AA:BB".to_string(), "CC:DD".to_string()]);
    }
}
