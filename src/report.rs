use std::{io, time::Duration};

use log::info;

use ml_core::Score;

const MIN_WIDTH: usize = 8;

/// Receives the per-epoch progress table of a `fit` run.
pub trait Reporter {
    /// Writes the column names, called once before the first epoch.
    fn header(&mut self, columns: &[String]) -> io::Result<()>;

    /// Writes one epoch's formatted stats, aligned with the header.
    fn row(&mut self, cells: &[String]) -> io::Result<()>;

    /// Writes a free-form line, such as the restored best epoch.
    fn message(&mut self, msg: &str) -> io::Result<()>;
}

/// Writes fixed-width columns to any writer.
#[derive(Debug)]
pub struct TableReporter<W> {
    out: W,
    widths: Vec<usize>,
}

impl<W: io::Write> TableReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            widths: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_cells(&mut self, cells: &[String]) -> io::Result<()> {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = self.widths.get(i).copied().unwrap_or(cell.len());
                format!("{cell:<width$}")
            })
            .collect();

        writeln!(self.out, "{}", line.join("  ").trim_end())
    }
}

impl<W: io::Write> Reporter for TableReporter<W> {
    fn header(&mut self, columns: &[String]) -> io::Result<()> {
        self.widths = columns.iter().map(|c| c.len().max(MIN_WIDTH)).collect();
        self.write_cells(columns)
    }

    fn row(&mut self, cells: &[String]) -> io::Result<()> {
        self.write_cells(cells)
    }

    fn message(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.out, "{msg}")
    }
}

/// Sends the table to the `log` facade, one record per row.
#[derive(Debug, Default)]
pub struct LogReporter {
    columns: Vec<String>,
}

impl LogReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for LogReporter {
    fn header(&mut self, columns: &[String]) -> io::Result<()> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn row(&mut self, cells: &[String]) -> io::Result<()> {
        let line = self
            .columns
            .iter()
            .zip(cells)
            .map(|(c, v)| format!("{c}={v}"))
            .collect::<Vec<_>>()
            .join(" ");

        info!(stats = line.as_str(); "epoch");
        Ok(())
    }

    fn message(&mut self, msg: &str) -> io::Result<()> {
        info!("{msg}");
        Ok(())
    }
}

/// Formats an optional loss, `NA` when it's absent.
pub fn format_stat(stat: Option<f32>) -> String {
    match stat {
        Some(v) => format!("{v:.6}"),
        None => "NA".to_string(),
    }
}

/// Formats a score with six decimals, falling back to its raw rendering
/// when it isn't a single number.
pub fn format_score(score: &Score) -> String {
    match score.as_scalar() {
        Some(v) => format!("{v:.6}"),
        None => score.to_string().split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// Formats a duration as `mm:ss`, or `h:mm:ss` past the hour.
pub fn format_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);

    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn stats_are_formatted_or_missing() {
        assert_eq!(format_stat(Some(0.5)), "0.500000");
        assert_eq!(format_stat(None), "NA");
    }

    #[test]
    fn matrix_scores_fall_back_to_raw() {
        assert_eq!(format_score(&Score::Scalar(1.0)), "1.000000");

        let raw = format_score(&Score::Matrix(array![[1., 0.], [0., 2.]]));
        assert!(!raw.contains('\n'));
        assert!(raw.contains('2'));
    }

    #[test]
    fn times_are_clock_like() {
        assert_eq!(format_time(Duration::from_secs(65)), "01:05");
        assert_eq!(format_time(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn table_rows_align_with_the_header() {
        let mut table = TableReporter::new(Vec::new());
        let header = vec!["train_loss".to_string(), "time".to_string()];
        let row = vec!["0.100000".to_string(), "00:01".to_string()];

        table.header(&header).unwrap();
        table.row(&row).unwrap();

        let out = String::from_utf8(table.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "train_loss  time");
        assert_eq!(lines[1], "0.100000    00:01");
    }
}
