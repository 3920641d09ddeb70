use crate::domain::model::ObservationTime;
use crate::utils::error::{EtlError, Result};
use chrono::{NaiveDateTime, Timelike};

const DEFERRED_MARKER: &str = "needs to be after";

/// Parses the "CME date and time" column.
///
/// Two shapes occur in the catalogue:
/// - `14/12/2011 20.58.00`
/// - `needs to be after 20:58 on 14/12/2011`, for events whose magnetogram
///   must be taken after a given time.
///
/// Seconds are dropped; SHARP records are keyed to the minute.
pub fn parse_cme_time(text: &str) -> Result<ObservationTime> {
    let parsed = if text.contains(DEFERRED_MARKER) {
        let tail = text
            .split_once("after")
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        let (time, date) = tail.split_once(" on ").ok_or_else(|| EtlError::TimestampError {
            value: text.to_string(),
            reason: "expected 'HH:MM on DD/MM/YYYY' after the marker".to_string(),
        })?;
        let combined = format!("{} {}", date.trim(), time.trim());
        NaiveDateTime::parse_from_str(&combined, "%d/%m/%Y %H:%M")
    } else {
        NaiveDateTime::parse_from_str(text.trim(), "%d/%m/%Y %H.%M.%S")
    };

    let datetime = parsed.map_err(|e| EtlError::TimestampError {
        value: text.to_string(),
        reason: e.to_string(),
    })?;

    let truncated = datetime.with_second(0).unwrap_or(datetime);
    Ok(ObservationTime(truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_timestamp() {
        let time = parse_cme_time(" 14/12/2011 20.58.31 ").unwrap();
        assert_eq!(time.query_stamp(), "2011.12.14_20:58:00_TAI");
        assert_eq!(time.file_stamp(), "20111214_205800_TAI");
    }

    #[test]
    fn test_deferred_timestamp() {
        let time = parse_cme_time("needs to be after 06:12 on 03/01/2012").unwrap();
        assert_eq!(time.query_stamp(), "2012.01.03_06:12:00_TAI");
    }

    #[test]
    fn test_deferred_timestamp_without_date_is_error() {
        let err = parse_cme_time("needs to be after 06:12").unwrap_err();
        assert!(matches!(err, EtlError::TimestampError { .. }));
    }

    #[test]
    fn test_malformed_timestamp_reports_input() {
        let err = parse_cme_time("2011-12-14T20:58").unwrap_err();
        assert!(err.to_string().contains("2011-12-14T20:58"));
    }
}
