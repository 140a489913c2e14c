//! Constructors for every mutation the agent performs on the store.

use crate::{SqlValue, WriteJob};

/// Snapshot of a process accepted for tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProcess<'a> {
    pub name: &'a str,
    pub pid: i64,
    /// `None` when the parent could not be read; stored as an empty string.
    pub parent_name: Option<&'a str>,
    pub exe_path: Option<&'a str>,
    pub start_time: i64,
}

/// Opens a process record.
pub fn insert_process(process: &NewProcess<'_>) -> WriteJob {
    WriteJob::new(
        "INSERT INTO process_events \
         (process_name, pid, parent_process_name, exe_path, start_time, end_time) \
         VALUES (?, ?, ?, ?, ?, NULL)",
        vec![
            process.name.into(),
            process.pid.into(),
            process.parent_name.unwrap_or_default().into(),
            process.exe_path.map(str::to_string).into(),
            process.start_time.into(),
        ],
    )
}

/// Seals the open record of `pid`. Closed records are never touched again.
pub fn close_process(pid: i64, end_time: i64) -> WriteJob {
    WriteJob::new(
        "UPDATE process_events SET end_time = ? WHERE pid = ? AND end_time IS NULL",
        vec![end_time.into(), pid.into()],
    )
}

pub fn insert_web_event(url: &str, timestamp: i64) -> WriteJob {
    WriteJob::new(
        "INSERT INTO web_events (url, timestamp) VALUES (?, ?)",
        vec![url.into(), timestamp.into()],
    )
}

pub fn upsert_web_metadata(
    domain: &str,
    title: Option<&str>,
    icon_url: Option<&str>,
    timestamp: i64,
) -> WriteJob {
    WriteJob::new(
        "INSERT OR REPLACE INTO web_metadata (domain, title, icon_url, timestamp) \
         VALUES (?, ?, ?, ?)",
        vec![
            domain.into(),
            title.map(str::to_string).into(),
            icon_url.map(str::to_string).into(),
            timestamp.into(),
        ],
    )
}

pub fn insert_log(timestamp: i64, level: &str, message: &str) -> WriteJob {
    WriteJob::new(
        "INSERT INTO logs (timestamp, level, message) VALUES (?, ?, ?)",
        vec![timestamp.into(), level.into(), message.into()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_parent_is_stored_empty() {
        let job = insert_process(&NewProcess {
            name: "firefox",
            pid: 4242,
            parent_name: None,
            exe_path: None,
            start_time: 17,
        });
        assert_eq!(
            job.args(),
            &[
                SqlValue::Text("firefox".into()),
                SqlValue::Integer(4242),
                SqlValue::Text(String::new()),
                SqlValue::Null,
                SqlValue::Integer(17),
            ]
        );
    }

    #[test]
    fn close_targets_open_record_only() {
        let job = close_process(500, 99);
        assert!(job.statement().ends_with("WHERE pid = ? AND end_time IS NULL"));
        assert_eq!(job.args(), &[SqlValue::Integer(99), SqlValue::Integer(500)]);
    }
}
