use redb::TableDefinition;

/// Upload records: `{owner}/{identifier}` -> UploadRecord (msgpack)
pub const UPLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("uploads");

/// Uploads still PROCESSING: `{owner}/{identifier}` -> created_at (unix millis).
/// Rows are removed on the terminal transition, so the reaper only scans live work.
pub const PENDING_UPLOADS: TableDefinition<&str, i64> = TableDefinition::new("pending_uploads");

/// Accounts: owner id -> Account (msgpack)
pub const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");
