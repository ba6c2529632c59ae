use matrix_util::common_io::append_lines;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

struct MetricSeries {
    values: Vec<f32>,
    flushed: usize,
}

///
/// Accumulates named scalar series and appends their running
/// averages to a text file on every `flush`.
///
/// Each flush writes one tab-separated line per series that received
/// new values since the previous flush:
///
/// `flush_no  name  count  last  running_avg`
///
/// where the running average covers the latest `window` values.
///
pub struct MetricLogger {
    file: PathBuf,
    window: usize,
    series: BTreeMap<Box<str>, MetricSeries>,
    num_flush: usize,
}

impl MetricLogger {
    pub fn new(file: &Path, window: usize) -> Self {
        Self {
            file: file.to_path_buf(),
            window: window.max(1),
            series: BTreeMap::new(),
            num_flush: 0,
        }
    }

    pub fn add_item(&mut self, name: &str, value: f32) {
        self.series
            .entry(name.into())
            .or_insert_with(|| MetricSeries {
                values: vec![],
                flushed: 0,
            })
            .values
            .push(value);
    }

    pub fn series(&self, name: &str) -> Option<&[f32]> {
        self.series.get(name).map(|s| s.values.as_slice())
    }

    pub fn running_average(&self, name: &str) -> Option<f32> {
        let values = self.series(name)?;
        let lb = values.len().saturating_sub(self.window);
        let recent = &values[lb..];
        if recent.is_empty() {
            return None;
        }
        Some(recent.iter().sum::<f32>() / recent.len() as f32)
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        let mut lines = vec![];
        for (name, series) in self.series.iter() {
            if series.values.len() == series.flushed {
                continue;
            }
            if let (Some(last), Some(avg)) = (series.values.last(), self.running_average(name)) {
                lines.push(format!(
                    "{}\t{}\t{}\t{}\t{}",
                    self.num_flush,
                    name,
                    series.values.len(),
                    last,
                    avg
                ));
            }
        }

        let file = self
            .file
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("invalid log file path {:?}", self.file))?;
        append_lines(&lines, file)?;

        for series in self.series.values_mut() {
            series.flushed = series.values.len();
        }
        self.num_flush += 1;
        Ok(())
    }
}
