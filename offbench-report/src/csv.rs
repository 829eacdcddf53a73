//! CSV Output
//!
//! One row per `(strategy, size)` cell. Cells without a valid trial leave the
//! statistic columns empty.

use crate::report::{Report, StrategyStatus};
use std::fmt::Write;

const HEADER: &str = "id,name,size,status,mean_us,std_dev_us,median_us,iqr_us,min_us,max_us,valid_trials,invalid_trials";

/// Render the report as CSV
pub fn generate_csv_report(report: &Report) -> String {
    let mut out = String::with_capacity(64 * (report.results.len() + 1));
    out.push_str(HEADER);
    out.push('\n');

    for result in &report.results {
        let status = match result.status {
            StrategyStatus::Measured => "measured",
            StrategyStatus::Partial => "partial",
            StrategyStatus::Failed => "failed",
        };
        for cell in &result.cells {
            let _ = write!(
                out,
                "{},{},{},{},",
                result.id,
                escape_csv(&result.name),
                cell.size,
                status
            );
            match &cell.overhead {
                Some(m) => {
                    let _ = writeln!(
                        out,
                        "{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{},{}",
                        m.mean_us,
                        m.std_dev_us,
                        m.median_us,
                        m.iqr_us,
                        m.min_us,
                        m.max_us,
                        m.valid_trials,
                        cell.invalid_trials
                    );
                }
                None => {
                    let _ = writeln!(out, ",,,,,,0,{}", cell.invalid_trials);
                }
            }
        }
    }
    out
}

/// Wrap in quotes if the value contains a comma, quote or newline
fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::OverheadCell;
    use crate::report::tests::{cell, dummy_report, dummy_result};

    #[test]
    fn csv_rows_per_cell() {
        let report = dummy_report(vec![
            dummy_result(1, "roundtrip", vec![cell(1, 3.0, 0.25), cell(2, 3.5, 0.25)]),
            dummy_result(6, "teams", vec![cell(1, 9.0, 1.0), OverheadCell::unavailable(2, 400)]),
        ]);
        let csv = generate_csv_report(&report);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("1,roundtrip,1,measured,3.000000,0.250000,"));
        assert_eq!(lines[4], "6,teams,2,measured,,,,,,,0,400");
    }

    #[test]
    fn escape_special_names() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
