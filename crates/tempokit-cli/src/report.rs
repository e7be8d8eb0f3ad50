//! Plain-text reporting of batch results

use std::fmt::Write as _;
use std::path::Path;

use tempokit_core::pipeline::{ConvertResult, NormalizeResult, TempoResult, TimeStretchResult};
use tempokit_core::template::format_number;
use tempokit_core::BatchSummary;

/// A result type that can be printed as a table row
pub trait ReportRow {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

impl ReportRow for TempoResult {
    fn headers() -> &'static [&'static str] {
        &["source", "tempo (BPM)"]
    }

    fn cells(&self) -> Vec<String> {
        vec![display(&self.source), format!("{:.2}", self.tempo_bpm)]
    }
}

impl ReportRow for TimeStretchResult {
    fn headers() -> &'static [&'static str] {
        &["source", "tempo (BPM)", "target (BPM)", "rate", "output"]
    }

    fn cells(&self) -> Vec<String> {
        let rate = if self.min_rate == self.max_rate {
            format_number(self.min_rate)
        } else {
            format!("{}-{}", format_number(self.min_rate), format_number(self.max_rate))
        };
        vec![
            display(&self.source),
            format!("{:.2}", self.original_tempo),
            format_number(self.target_tempo),
            rate,
            display(&self.output_path),
        ]
    }
}

impl ReportRow for ConvertResult {
    fn headers() -> &'static [&'static str] {
        &["source", "output", "mode"]
    }

    fn cells(&self) -> Vec<String> {
        let mode = if self.passthrough { "copied" } else { "encoded" };
        vec![display(&self.source), display(&self.output_path), mode.to_string()]
    }
}

impl ReportRow for NormalizeResult {
    fn headers() -> &'static [&'static str] {
        &["source", "measured (LUFS)", "target (LUFS)", "output"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            display(&self.source),
            format!("{:.2}", self.original_lufs),
            format!("{:.1}", self.lufs),
            display(&self.output_path),
        ]
    }
}

/// Render rows as a left-aligned table, or an empty string when there are none
pub fn table<R: ReportRow>(rows: &[R]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let headers = R::headers();
    let cells: Vec<Vec<String>> = rows.iter().map(ReportRow::cells).collect();
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            cells
                .iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_row(&mut out, &header_cells, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &cells {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    let _ = writeln!(out, "{}", line.join("  ").trim_end());
}

/// Summary line followed by one line per failed or unattempted source
pub fn summary(summary: &BatchSummary) -> String {
    let mut out = format!("{}\n", summary);
    for (path, error) in &summary.failures {
        let _ = writeln!(out, "  {} [{}] {}", path.display(), error.kind(), error);
    }
    for path in &summary.not_run {
        let _ = writeln!(out, "  {} [not run] batch aborted", path.display());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempokit_core::PipelineError;

    #[test]
    fn test_tempo_table_aligns_columns() {
        let rows = vec![
            TempoResult { source: PathBuf::from("a.wav"), tempo_bpm: 120.0 },
            TempoResult { source: PathBuf::from("longer_name.wav"), tempo_bpm: 93.456 },
        ];
        let text = table(&rows);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "source           tempo (BPM)");
        assert_eq!(lines[2], "a.wav            120.00");
        assert_eq!(lines[3], "longer_name.wav  93.46");
    }

    #[test]
    fn test_empty_table() {
        assert!(table::<ConvertResult>(&[]).is_empty());
    }

    #[test]
    fn test_stretch_rate_column() {
        let result = TimeStretchResult {
            source: PathBuf::from("loop.wav"),
            original_tempo: 120.0,
            target_tempo: 120.0,
            min_rate: 0.9,
            max_rate: 1.1,
            output_path: PathBuf::from("out/loop.wav"),
        };
        assert_eq!(result.cells()[3], "0.9-1.1");
    }

    #[test]
    fn test_summary_lists_failures() {
        let mut batch = BatchSummary::default();
        batch.processed = 2;
        batch
            .failures
            .push((PathBuf::from("b.wav"), PipelineError::Computation("no onsets".into())));

        let text = summary(&batch);
        assert!(text.starts_with("processed 2, skipped (no-op) 0, failed 1\n"));
        assert!(text.contains("b.wav"));
        assert!(text.contains("no onsets"));
    }

    #[test]
    fn test_summary_lists_sources_left_after_abort() {
        let mut batch = BatchSummary::default();
        batch
            .failures
            .push((PathBuf::from("a.wav"), PipelineError::Computation("zero tempo".into())));
        batch.not_run.push(PathBuf::from("b.wav"));
        batch.aborted = true;

        let text = summary(&batch);
        assert!(text.starts_with("processed 0, skipped (no-op) 0, failed 1, not run 1 (aborted)\n"));
        assert!(text.contains("  b.wav [not run]"));
    }
}
