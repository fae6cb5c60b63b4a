//! SQL schema for the Prophet SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are server defaults in RFC 3339 form with millisecond
/// precision. Responses cascade away with their user or question.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS \"user\" (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_identifier TEXT    NOT NULL UNIQUE
                       CHECK (length(subject_identifier) <= 44)
);

CREATE TABLE IF NOT EXISTS question (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    prompt         TEXT    NOT NULL,
    more_info_link TEXT,
    correct_answer INTEGER CHECK (correct_answer IN (0, 1)),  -- NULL: unknown
    created_at     TEXT    NOT NULL
                   DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    expires_at     TEXT                                        -- NULL: never
);

CREATE TABLE IF NOT EXISTS response (
    user_id     INTEGER NOT NULL REFERENCES \"user\"(id)  ON DELETE CASCADE,
    question_id INTEGER NOT NULL REFERENCES question(id) ON DELETE CASCADE,
    response    INTEGER CHECK (response IN (0, 1)),        -- NULL: skipped
    view_time   TEXT    NOT NULL,                          -- HH:MM:SS[.fff]
    answered_at TEXT    NOT NULL
                DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (user_id, question_id)
);

CREATE INDEX IF NOT EXISTS response_question_idx ON response(question_id);

PRAGMA user_version = 1;
";
