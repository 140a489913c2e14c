/// Tables and indices owned by the store. Every statement is idempotent so
/// the whole batch runs on each start.
pub(crate) const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS process_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    process_name TEXT NOT NULL,
    pid INTEGER NOT NULL,
    parent_process_name TEXT,
    exe_path TEXT,
    start_time INTEGER NOT NULL,
    end_time INTEGER
);
CREATE INDEX IF NOT EXISTS idx_process_events_start_time ON process_events(start_time);
CREATE INDEX IF NOT EXISTS idx_process_events_end_time ON process_events(end_time);
CREATE INDEX IF NOT EXISTS idx_process_events_pid ON process_events(pid);

CREATE TABLE IF NOT EXISTS web_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_web_events_timestamp ON web_events(timestamp);

CREATE TABLE IF NOT EXISTS web_metadata (
    domain TEXT PRIMARY KEY,
    title TEXT,
    icon_url TEXT,
    timestamp INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    level TEXT NOT NULL,
    message TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp);
"#;

diesel::table! {
    process_events (id) {
        id -> BigInt,
        process_name -> Text,
        pid -> BigInt,
        parent_process_name -> Nullable<Text>,
        exe_path -> Nullable<Text>,
        start_time -> BigInt,
        end_time -> Nullable<BigInt>,
    }
}

diesel::table! {
    web_events (id) {
        id -> BigInt,
        url -> Text,
        timestamp -> BigInt,
    }
}

diesel::table! {
    web_metadata (domain) {
        domain -> Text,
        title -> Nullable<Text>,
        icon_url -> Nullable<Text>,
        timestamp -> BigInt,
    }
}

diesel::table! {
    logs (id) {
        id -> BigInt,
        timestamp -> BigInt,
        level -> Text,
        message -> Text,
    }
}
