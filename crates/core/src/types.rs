/// Opaque per-connection identity (UUID v4 string).
pub type ConnId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh connection identity.
pub fn new_conn_id() -> ConnId {
    uuid::Uuid::new_v4().to_string()
}
