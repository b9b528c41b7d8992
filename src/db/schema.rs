pub const SCHEMA: &str = r#"
-- One row per saved capture
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,  -- AUTOINCREMENT keeps ids from being reused
    uri TEXT NOT NULL CHECK (uri <> ''),   -- Durable path inside the archive
    location TEXT,                         -- JSON, NULL when geolocation failed
    address TEXT                           -- Reverse-geocoded label
);
"#;
