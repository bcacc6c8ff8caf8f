use std::time::Duration;

use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection, busy_timeout: Duration) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
    ",
    )?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS zones (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);

CREATE TABLE IF NOT EXISTS areas (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    zone_id BLOB NOT NULL REFERENCES zones (id),
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);
CREATE INDEX IF NOT EXISTS idx_areas_zone ON areas (zone_id);

CREATE TABLE IF NOT EXISTS villages (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    area_id BLOB NOT NULL REFERENCES areas (id),
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    pincode TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);
CREATE INDEX IF NOT EXISTS idx_villages_area ON villages (area_id);

CREATE TABLE IF NOT EXISTS staff (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    employee_code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    phone TEXT,
    email TEXT,
    role TEXT NOT NULL,
    zone_id BLOB REFERENCES zones (id),
    is_active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);

CREATE TABLE IF NOT EXISTS dealers (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    contact_person TEXT,
    phone TEXT,
    zone_id BLOB REFERENCES zones (id),
    area_id BLOB REFERENCES areas (id),
    is_active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);

CREATE TABLE IF NOT EXISTS farmers (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    name TEXT NOT NULL,
    father_name TEXT,
    phone TEXT NOT NULL,
    alternate_phone TEXT,
    village_id BLOB REFERENCES villages (id),
    area_id BLOB REFERENCES areas (id),
    zone_id BLOB REFERENCES zones (id),
    land_acres REAL,
    primary_crops TEXT,
    lead_score INTEGER NOT NULL DEFAULT 0 CHECK (lead_score BETWEEN 0 AND 100),
    lead_quality TEXT,
    is_customer INTEGER NOT NULL DEFAULT 0,
    assigned_tmo_id BLOB REFERENCES staff (id),
    assigned_field_staff_id BLOB REFERENCES staff (id),
    dealer_id BLOB REFERENCES dealers (id),
    is_active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);
CREATE INDEX IF NOT EXISTS idx_farmers_village ON farmers (village_id);
CREATE INDEX IF NOT EXISTS idx_farmers_tmo ON farmers (assigned_tmo_id);

CREATE TABLE IF NOT EXISTS products (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    category TEXT,
    unit TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);

CREATE TABLE IF NOT EXISTS engagements (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    farmer_id BLOB NOT NULL REFERENCES farmers (id),
    product_id BLOB NOT NULL REFERENCES products (id),
    season TEXT NOT NULL,
    data_source TEXT NOT NULL,
    lead_stage TEXT NOT NULL,
    assigned_tmo_id BLOB REFERENCES staff (id),
    is_active INTEGER NOT NULL DEFAULT 1,
    total_purchases REAL,
    closure_reason TEXT,
    notes TEXT,
    version INTEGER NOT NULL DEFAULT 1,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);
CREATE INDEX IF NOT EXISTS idx_engagements_farmer ON engagements (farmer_id);
CREATE INDEX IF NOT EXISTS idx_engagements_stage ON engagements (lead_stage, is_active);

CREATE TABLE IF NOT EXISTS activities (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    engagement_id BLOB NOT NULL REFERENCES engagements (id) ON DELETE CASCADE,
    farmer_id BLOB NOT NULL REFERENCES farmers (id),
    activity_type TEXT NOT NULL,
    outcome TEXT,
    performed_by BLOB REFERENCES staff (id),
    follow_up_at INTEGER,
    version INTEGER NOT NULL DEFAULT 1,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);
CREATE INDEX IF NOT EXISTS idx_activities_engagement ON activities (engagement_id);

CREATE TABLE IF NOT EXISTS stage_transitions (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    engagement_id BLOB NOT NULL REFERENCES engagements (id) ON DELETE CASCADE,
    from_stage TEXT NOT NULL,
    to_stage TEXT NOT NULL,
    actor_id BLOB,
    reason TEXT,
    at BLOB NOT NULL CHECK (length(at) = 12)
);
CREATE INDEX IF NOT EXISTS idx_stage_transitions_engagement ON stage_transitions (engagement_id, at);

CREATE TABLE IF NOT EXISTS audit_log (
    rowid INTEGER PRIMARY KEY,
    audit_id BLOB NOT NULL UNIQUE CHECK (length(audit_id) = 16),
    table_name TEXT NOT NULL,
    record_id BLOB NOT NULL CHECK (length(record_id) = 16),
    action TEXT NOT NULL,
    actor_id BLOB,
    at BLOB NOT NULL CHECK (length(at) = 12),
    payload BLOB
);
CREATE INDEX IF NOT EXISTS idx_audit_record ON audit_log (table_name, record_id);
";
