//! Database schema definitions

pub const CREATE_SITES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    protocol_security INTEGER NOT NULL DEFAULT 1,
    user_id INTEGER NOT NULL,
    created_at BIGINT NOT NULL
)
"#;

// One row per (user, site); counters only ever grow through the upsert below
pub const CREATE_STATISTICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_statistics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    page_transitions INTEGER NOT NULL DEFAULT 0,
    data_sent REAL NOT NULL DEFAULT 0,
    data_received REAL NOT NULL DEFAULT 0,
    updated_at BIGINT NOT NULL,
    UNIQUE (user_id, site_id)
)
"#;

pub const CREATE_INDEX_SITES_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_sites_user ON sites(user_id, id)";

pub const CREATE_INDEX_STATISTICS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_statistics_user ON user_statistics(user_id)";

pub const INCREMENT_STATISTICS: &str = r#"
INSERT INTO user_statistics (user_id, site_id, page_transitions, data_sent, data_received, updated_at)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (user_id, site_id) DO UPDATE SET
    page_transitions = page_transitions + excluded.page_transitions,
    data_sent = data_sent + excluded.data_sent,
    data_received = data_received + excluded.data_received,
    updated_at = excluded.updated_at
"#;
