pub(super) const RECORD_COLUMNS: &str = r#"
    id, owner_scope, status, step_data, pending_assets, assets, last_synced_at,
    is_dirty, is_new, needs_attention, last_error, created_at, updated_at
"#;

pub(super) const UPSERT_RECORD: &str = r#"
    INSERT INTO records (
        id, owner_scope, status, step_data, pending_assets, assets, last_synced_at,
        is_dirty, is_new, needs_attention, last_error, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
    ON CONFLICT(id) DO UPDATE SET
        status = excluded.status,
        step_data = excluded.step_data,
        pending_assets = excluded.pending_assets,
        assets = excluded.assets,
        last_synced_at = excluded.last_synced_at,
        is_dirty = excluded.is_dirty,
        is_new = excluded.is_new,
        needs_attention = excluded.needs_attention,
        last_error = excluded.last_error,
        updated_at = excluded.updated_at
"#;

pub(super) const SELECT_RECORD_BY_ID: &str = r#"
    SELECT id, owner_scope, status, step_data, pending_assets, assets, last_synced_at,
           is_dirty, is_new, needs_attention, last_error, created_at, updated_at
    FROM records
    WHERE id = ?1
"#;

pub(super) const DELETE_RECORD: &str = r#"
    DELETE FROM records
    WHERE id = ?1
"#;

pub(super) const INSERT_QUEUE_ENTRY: &str = r#"
    INSERT INTO sync_queue (
        record_id, owner_scope, operation, payload, attempts, next_attempt_at, created_at
    ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
"#;

pub(super) const SELECT_QUEUE_ENTRY_BY_ID: &str = r#"
    SELECT id, record_id, owner_scope, operation, payload, attempts, last_error,
           last_error_kind, last_attempt_at, next_attempt_at, created_at
    FROM sync_queue
    WHERE id = ?1
"#;

pub(super) const SELECT_QUEUE_ENTRIES: &str = r#"
    SELECT id, record_id, owner_scope, operation, payload, attempts, last_error,
           last_error_kind, last_attempt_at, next_attempt_at, created_at
    FROM sync_queue
    ORDER BY created_at ASC, id ASC
"#;

pub(super) const SELECT_QUEUE_ENTRIES_BY_SCOPE: &str = r#"
    SELECT id, record_id, owner_scope, operation, payload, attempts, last_error,
           last_error_kind, last_attempt_at, next_attempt_at, created_at
    FROM sync_queue
    WHERE owner_scope = ?1
    ORDER BY created_at ASC, id ASC
"#;

pub(super) const SELECT_QUEUE_ENTRIES_BY_RECORD: &str = r#"
    SELECT id, record_id, owner_scope, operation, payload, attempts, last_error,
           last_error_kind, last_attempt_at, next_attempt_at, created_at
    FROM sync_queue
    WHERE record_id = ?1
    ORDER BY id ASC
"#;

pub(super) const COUNT_QUEUE_ENTRIES_BY_RECORD: &str = r#"
    SELECT COUNT(*) AS count
    FROM sync_queue
    WHERE record_id = ?1
"#;

pub(super) const DELETE_QUEUE_ENTRY: &str = r#"
    DELETE FROM sync_queue
    WHERE id = ?1
"#;

pub(super) const DELETE_QUEUE_ENTRIES_BY_RECORD: &str = r#"
    DELETE FROM sync_queue
    WHERE record_id = ?1
"#;

pub(super) const UPDATE_QUEUE_FAILURE: &str = r#"
    UPDATE sync_queue
    SET attempts = ?2,
        last_error = ?3,
        last_error_kind = ?4,
        last_attempt_at = ?5,
        next_attempt_at = ?6
    WHERE id = ?1
"#;

pub(super) const COUNT_PENDING_RECORDS: &str = r#"
    SELECT COUNT(*) AS count FROM (
        SELECT id AS record_id FROM records
        WHERE owner_scope = ?1 AND is_dirty = 1
        UNION
        SELECT record_id FROM sync_queue
        WHERE owner_scope = ?1
    )
"#;
