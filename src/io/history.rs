//! Provenance log for the global `history` attribute.
//!
//! A new log entry records when and how the output was produced, followed
//! by the history of every input file that carried one:
//!
//! ```text
//! Fri Oct 16 09:12:44 2026: gridmask-apply in.nc pr out.nc --shapefile aus.shp
//! History of in.nc:
//! Thu Oct 01 11:02:10 2026: ...
//! ```

use chrono::{DateTime, Local, TimeZone};

const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// The invoking command line, arguments joined by spaces.
pub fn command_line() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}

/// Build a history log for `command` run now.
///
/// `infile_logs` pairs each input file name with its prior history.
pub fn new_log(command: &str, infile_logs: &[(String, String)]) -> String {
    new_log_at(&Local::now(), command, infile_logs)
}

/// Build a history log with an explicit timestamp.
pub fn new_log_at<Tz: TimeZone>(
    timestamp: &DateTime<Tz>,
    command: &str,
    infile_logs: &[(String, String)],
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut log = format!("{}: {}", timestamp.format(TIMESTAMP_FORMAT), command);
    for (infile, history) in infile_logs {
        log.push_str(&format!("\nHistory of {infile}:\n{history}"));
    }
    log
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 12, 44).unwrap()
    }

    #[test]
    fn test_new_log_without_inputs() {
        let log = new_log_at(&timestamp(), "gridmask-weight-fraction a.nc out.nc", &[]);
        assert_eq!(log, "Fri Oct 16 09:12:44 2026: gridmask-weight-fraction a.nc out.nc");
    }

    #[test]
    fn test_new_log_chains_history() {
        let log = new_log_at(
            &timestamp(),
            "gridmask-apply in.nc out.nc",
            &[("in.nc".to_string(), "created by regrid".to_string())],
        );
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("gridmask-apply in.nc out.nc"));
        assert_eq!(lines[1], "History of in.nc:");
        assert_eq!(lines[2], "created by regrid");
    }

    #[test]
    fn test_command_line_not_empty() {
        assert!(!command_line().is_empty());
    }
}
