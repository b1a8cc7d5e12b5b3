use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use enforcement_core::{
    format_iso_date, parse_iso_date, Attachment, AuditLogEntry, EnforcementRecord, NoticeNumber,
    ProcessTaken, RecordId, RecordStatus, RecordStore,
};
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

const LATEST_SCHEMA_VERSION: i64 = 1;
const RECORDS_FILE: &str = "enforcement_records.ndjson";
const MANIFEST_FILE: &str = "manifest.json";

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS enforcement_records (
  record_id TEXT PRIMARY KEY,
  position INTEGER NOT NULL,
  notice_number TEXT NOT NULL UNIQUE,
  plot_number TEXT NOT NULL,
  location TEXT NOT NULL,
  sub_county TEXT NOT NULL,
  ward TEXT NOT NULL,
  date_issued TEXT NOT NULL,
  issue_of_concern TEXT NOT NULL,
  process_taken TEXT NOT NULL CHECK (
    process_taken IN ('notice_issued', 'warning', 'arrest_made', 'demolition', 'compliance_verified')
  ),
  recommendations TEXT NOT NULL,
  officer_in_charge TEXT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('open', 'pending_review', 'closed')),
  ai_summary TEXT
);

CREATE TABLE IF NOT EXISTS record_attachments (
  record_id TEXT NOT NULL REFERENCES enforcement_records(record_id) ON DELETE CASCADE,
  ordinal INTEGER NOT NULL,
  name TEXT NOT NULL,
  mime_type TEXT NOT NULL,
  data TEXT NOT NULL,
  PRIMARY KEY (record_id, ordinal)
);

CREATE TABLE IF NOT EXISTS audit_log_entries (
  record_id TEXT NOT NULL REFERENCES enforcement_records(record_id) ON DELETE CASCADE,
  ordinal INTEGER NOT NULL,
  timestamp TEXT NOT NULL,
  action TEXT NOT NULL,
  user TEXT NOT NULL,
  PRIMARY KEY (record_id, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_enforcement_records_position ON enforcement_records(position);
CREATE INDEX IF NOT EXISTS idx_enforcement_records_date_issued ON enforcement_records(date_issued);
";

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportFileDigest {
    pub path: String,
    pub sha256: String,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportManifest {
    pub schema_version: i64,
    pub exported_at: String,
    pub files: Vec<ExportFileDigest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported_records: usize,
    pub skipped_existing_records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: i64,
    pub parent: String,
    pub fk_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub quick_check_ok: bool,
    pub quick_check_message: String,
    pub foreign_key_violations: Vec<ForeignKeyViolation>,
    pub schema_status: SchemaStatus,
}

impl SqliteStore {
    /// Open a SQLite-backed record store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let (current_version, inferred_from_legacy) = detect_effective_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
            inferred_from_legacy,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;
        if version == 0 {
            let tx = self.conn.transaction().context("failed to start migration v1 transaction")?;
            tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
            record_schema_version(&tx, 1)?;
            tx.commit().context("failed to commit migration v1")?;
            tracing::info!(version = 1, "schema migration applied");
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    /// Load every record in stored display order.
    ///
    /// # Errors
    /// Returns an error when a row cannot be read or holds a value the record model rejects.
    pub fn load_records(&self) -> Result<RecordStore> {
        load_records(&self.conn)
    }

    /// Persist the whole ordered collection in one transaction.
    ///
    /// # Errors
    /// Returns an error when any write fails; nothing is committed in that case.
    pub fn save_records(&mut self, store: &RecordStore) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start transaction")?;
        save_records(&tx, store)?;
        tx.commit().context("failed to commit record collection")?;
        Ok(())
    }

    /// Load, mutate and persist under one write-locked transaction, so concurrent
    /// writers never interleave between the read and the write.
    ///
    /// # Errors
    /// Returns an error when loading, `apply`, or persisting fails. Nothing is
    /// written when `apply` returns an error.
    pub fn update_records<T>(
        &mut self,
        apply: impl FnOnce(&mut RecordStore) -> Result<T>,
    ) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to start write transaction")?;
        let mut store = load_records(&tx)?;
        let outcome = apply(&mut store)?;
        save_records(&tx, &store)?;
        tx.commit().context("failed to commit record changes")?;
        Ok(outcome)
    }

    /// Export records as deterministic NDJSON plus manifest.
    ///
    /// # Errors
    /// Returns an error when export files cannot be created, written, or serialized.
    pub fn export_snapshot(&self, out_dir: &Path) -> Result<ExportManifest> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create export directory {}", out_dir.display()))?;

        let records = self.load_records()?.into_records();
        let records_path = out_dir.join(RECORDS_FILE);
        let (sha256, count) = write_ndjson_file(&records_path, &records)?;

        let manifest = ExportManifest {
            schema_version: LATEST_SCHEMA_VERSION,
            exported_at: now_rfc3339()?,
            files: vec![ExportFileDigest {
                path: RECORDS_FILE.to_string(),
                sha256,
                records: count,
            }],
        };

        let manifest_path = out_dir.join(MANIFEST_FILE);
        let manifest_json =
            serde_json::to_vec_pretty(&manifest).context("failed to serialize export manifest")?;
        fs::write(&manifest_path, manifest_json).with_context(|| {
            format!("failed to write export manifest {}", manifest_path.display())
        })?;

        tracing::info!(records = count, dir = %out_dir.display(), "snapshot exported");
        Ok(manifest)
    }

    /// Import an exported snapshot directory into this database. Imported
    /// records keep their exported order, after the records already stored.
    ///
    /// # Errors
    /// Returns an error when migration, manifest validation, parsing, duplicate
    /// handling, or writes fail.
    pub fn import_snapshot(&mut self, in_dir: &Path, skip_existing: bool) -> Result<ImportSummary> {
        self.migrate()?;
        let manifest = read_export_manifest(&in_dir.join(MANIFEST_FILE))?;
        validate_import_manifest(in_dir, &manifest)?;
        let incoming = read_ndjson_file::<EnforcementRecord>(&in_dir.join(RECORDS_FILE))?;

        let summary = self.update_records(|store| {
            let mut summary = ImportSummary { imported_records: 0, skipped_existing_records: 0 };
            let mut merged = store.records().to_vec();
            for record in incoming {
                if store.get(&record.id).is_some() {
                    if skip_existing {
                        summary.skipped_existing_records += 1;
                        continue;
                    }
                    return Err(anyhow!("record already exists: {}", record.id));
                }
                merged.push(record);
                summary.imported_records += 1;
            }
            *store = RecordStore::from_records(merged)
                .map_err(|err| anyhow!("snapshot conflicts with stored records: {err}"))?;
            Ok(summary)
        })?;

        tracing::info!(
            imported = summary.imported_records,
            skipped = summary.skipped_existing_records,
            "snapshot imported"
        );
        Ok(summary)
    }

    /// Create a `SQLite` backup file of the current main database.
    ///
    /// # Errors
    /// Returns an error when backup directories cannot be created or backup fails.
    pub fn backup_database(&self, out_file: &Path) -> Result<()> {
        if let Some(parent) = out_file.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory for backup file {}", out_file.display())
            })?;
        }

        self.conn
            .backup(DatabaseName::Main, out_file, None)
            .with_context(|| format!("failed to create sqlite backup at {}", out_file.display()))
    }

    /// Restore this database from a `SQLite` backup file, then migrate to latest.
    ///
    /// # Errors
    /// Returns an error when the backup file is missing, restore fails, or migrations fail.
    pub fn restore_database(&mut self, in_file: &Path) -> Result<()> {
        if !in_file.exists() {
            return Err(anyhow!("backup file does not exist: {}", in_file.display()));
        }

        self.conn
            .restore(DatabaseName::Main, in_file, None::<fn(rusqlite::backup::Progress)>)
            .with_context(|| {
                format!("failed to restore sqlite backup from {}", in_file.display())
            })?;

        self.migrate()?;
        Ok(())
    }

    /// Run quick-check, foreign-key-check, and schema status health probes.
    ///
    /// # Errors
    /// Returns an error when any integrity probe query fails.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let quick_check_message: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0))
            .context("failed to run PRAGMA quick_check")?;

        let mut stmt = self
            .conn
            .prepare("PRAGMA foreign_key_check")
            .context("failed to prepare PRAGMA foreign_key_check")?;
        let rows = stmt.query_map([], |row| {
            Ok(ForeignKeyViolation {
                table: row.get(0)?,
                rowid: row.get(1)?,
                parent: row.get(2)?,
                fk_index: row.get(3)?,
            })
        })?;

        let mut foreign_key_violations = Vec::new();
        for row in rows {
            foreign_key_violations.push(row?);
        }

        let schema_status = self.schema_status()?;
        Ok(IntegrityReport {
            quick_check_ok: quick_check_message == "ok",
            quick_check_message,
            foreign_key_violations,
            schema_status,
        })
    }
}

struct RecordRow {
    record_id: String,
    notice_number: String,
    plot_number: String,
    location: String,
    sub_county: String,
    ward: String,
    date_issued: String,
    issue_of_concern: String,
    process_taken: String,
    recommendations: String,
    officer_in_charge: String,
    status: String,
    ai_summary: Option<String>,
}

impl RecordRow {
    fn into_record(
        self,
        attachments: Vec<Attachment>,
        audit_log: Vec<AuditLogEntry>,
    ) -> Result<EnforcementRecord> {
        let process_taken = ProcessTaken::parse(&self.process_taken)
            .ok_or_else(|| anyhow!("invalid process_taken in storage: {}", self.process_taken))?;
        let status = RecordStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("invalid status in storage: {}", self.status))?;

        Ok(EnforcementRecord {
            id: RecordId::parse(&self.record_id).map_err(|err| anyhow!("{err}"))?,
            notice_number: NoticeNumber::parse(&self.notice_number)
                .map_err(|err| anyhow!("{err}"))?,
            plot_number: self.plot_number,
            location: self.location,
            sub_county: self.sub_county,
            ward: self.ward,
            date_issued: parse_iso_date(&self.date_issued).map_err(|err| anyhow!("{err}"))?,
            issue_of_concern: self.issue_of_concern,
            process_taken,
            recommendations: self.recommendations,
            officer_in_charge: self.officer_in_charge,
            status,
            attachments,
            ai_summary: self.ai_summary,
            audit_log,
        })
    }
}

fn load_records(conn: &Connection) -> Result<RecordStore> {
    let mut attachments = load_attachments(conn)?;
    let mut audit = load_audit_entries(conn)?;

    let mut stmt = conn
        .prepare(
            "SELECT
                record_id, notice_number, plot_number, location, sub_county, ward,
                date_issued, issue_of_concern, process_taken, recommendations,
                officer_in_charge, status, ai_summary
             FROM enforcement_records
             ORDER BY position ASC",
        )
        .context("failed to prepare record query")?;
    let rows = stmt.query_map([], |row| {
        Ok(RecordRow {
            record_id: row.get(0)?,
            notice_number: row.get(1)?,
            plot_number: row.get(2)?,
            location: row.get(3)?,
            sub_county: row.get(4)?,
            ward: row.get(5)?,
            date_issued: row.get(6)?,
            issue_of_concern: row.get(7)?,
            process_taken: row.get(8)?,
            recommendations: row.get(9)?,
            officer_in_charge: row.get(10)?,
            status: row.get(11)?,
            ai_summary: row.get(12)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        let row = row.context("failed to read record row")?;
        let record_attachments = attachments.remove(&row.record_id).unwrap_or_default();
        let record_audit = audit.remove(&row.record_id).unwrap_or_default();
        let record_id = row.record_id.clone();
        let record = row
            .into_record(record_attachments, record_audit)
            .with_context(|| format!("failed to decode stored record {record_id}"))?;
        records.push(record);
    }

    RecordStore::from_records(records)
        .map_err(|err| anyhow!("stored records are inconsistent: {err}"))
}

fn load_attachments(conn: &Connection) -> Result<BTreeMap<String, Vec<Attachment>>> {
    let mut stmt = conn
        .prepare(
            "SELECT record_id, name, mime_type, data
             FROM record_attachments
             ORDER BY record_id ASC, ordinal ASC",
        )
        .context("failed to prepare attachment query")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            Attachment { name: row.get(1)?, mime_type: row.get(2)?, data: row.get(3)? },
        ))
    })?;

    let mut by_record: BTreeMap<String, Vec<Attachment>> = BTreeMap::new();
    for row in rows {
        let (record_id, attachment) = row.context("failed to read attachment row")?;
        by_record.entry(record_id).or_default().push(attachment);
    }
    Ok(by_record)
}

fn load_audit_entries(conn: &Connection) -> Result<BTreeMap<String, Vec<AuditLogEntry>>> {
    let mut stmt = conn
        .prepare(
            "SELECT record_id, timestamp, action, user
             FROM audit_log_entries
             ORDER BY record_id ASC, ordinal ASC",
        )
        .context("failed to prepare audit query")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            AuditLogEntry { timestamp: row.get(1)?, action: row.get(2)?, user: row.get(3)? },
        ))
    })?;

    let mut by_record: BTreeMap<String, Vec<AuditLogEntry>> = BTreeMap::new();
    for row in rows {
        let (record_id, entry) = row.context("failed to read audit row")?;
        by_record.entry(record_id).or_default().push(entry);
    }
    Ok(by_record)
}

fn save_records(conn: &Connection, store: &RecordStore) -> Result<()> {
    conn.execute("DELETE FROM record_attachments", []).context("failed to clear attachments")?;
    conn.execute("DELETE FROM audit_log_entries", []).context("failed to clear audit entries")?;

    for (position, record) in store.records().iter().enumerate() {
        let position = i64::try_from(position).context("record position overflow")?;
        upsert_record(conn, position, record)?;
    }

    tracing::debug!(records = store.len(), "record collection persisted");
    Ok(())
}

fn upsert_record(conn: &Connection, position: i64, record: &EnforcementRecord) -> Result<()> {
    let record_id = record.id.as_str();
    conn.execute(
        "INSERT INTO enforcement_records(
            record_id, position, notice_number, plot_number, location, sub_county, ward,
            date_issued, issue_of_concern, process_taken, recommendations,
            officer_in_charge, status, ai_summary
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(record_id) DO UPDATE SET
            position = excluded.position,
            plot_number = excluded.plot_number,
            location = excluded.location,
            sub_county = excluded.sub_county,
            ward = excluded.ward,
            date_issued = excluded.date_issued,
            issue_of_concern = excluded.issue_of_concern,
            process_taken = excluded.process_taken,
            recommendations = excluded.recommendations,
            officer_in_charge = excluded.officer_in_charge,
            status = excluded.status,
            ai_summary = excluded.ai_summary",
        params![
            record_id,
            position,
            record.notice_number.as_str(),
            record.plot_number,
            record.location,
            record.sub_county,
            record.ward,
            format_iso_date(record.date_issued),
            record.issue_of_concern,
            record.process_taken.as_str(),
            record.recommendations,
            record.officer_in_charge,
            record.status.as_str(),
            record.ai_summary,
        ],
    )
    .with_context(|| format!("failed to write record {record_id}"))?;

    for (ordinal, attachment) in record.attachments.iter().enumerate() {
        conn.execute(
            "INSERT INTO record_attachments(record_id, ordinal, name, mime_type, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record_id,
                i64::try_from(ordinal).context("attachment ordinal overflow")?,
                attachment.name,
                attachment.mime_type,
                attachment.data,
            ],
        )
        .with_context(|| format!("failed to write attachment for {record_id}"))?;
    }

    for (ordinal, entry) in record.audit_log.iter().enumerate() {
        conn.execute(
            "INSERT INTO audit_log_entries(record_id, ordinal, timestamp, action, user)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record_id,
                i64::try_from(ordinal).context("audit ordinal overflow")?,
                entry.timestamp,
                entry.action,
                entry.user,
            ],
        )
        .with_context(|| format!("failed to write audit entry for {record_id}"))?;
    }

    Ok(())
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table_name],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("failed to check if table exists: {table_name}"))?;
    Ok(exists == 1)
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .optional()
        .context("failed to read current schema version")?;
    Ok(version.unwrap_or(0))
}

fn detect_effective_schema_version(conn: &Connection) -> Result<(i64, bool)> {
    let recorded = current_schema_version(conn)?;
    if recorded > 0 {
        return Ok((recorded, false));
    }

    if table_exists(conn, "enforcement_records")? {
        return Ok((1, true));
    }

    Ok((0, false))
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = now_rfc3339()?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn write_ndjson_file<T: Serialize>(path: &Path, values: &[T]) -> Result<(String, usize)> {
    let file = File::create(path)
        .with_context(|| format!("failed to create export file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();

    for value in values {
        let line = serde_json::to_string(value).context("failed to serialize NDJSON row")?;
        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .with_context(|| format!("failed to write export file {}", path.display()))?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }

    writer.flush().with_context(|| format!("failed to flush export file {}", path.display()))?;

    Ok((format!("{:x}", hasher.finalize()), values.len()))
}

fn read_ndjson_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open NDJSON file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut values = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!("failed to read line {} from {}", index + 1, path.display())
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = serde_json::from_str(trimmed).with_context(|| {
            format!("failed to parse NDJSON row {} from {}", index + 1, path.display())
        })?;
        values.push(value);
    }

    Ok(values)
}

fn read_export_manifest(path: &Path) -> Result<ExportManifest> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read manifest file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse manifest JSON {}", path.display()))
}

fn ndjson_digest_and_records(path: &Path) -> Result<(String, usize)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open NDJSON file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut records = 0_usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!("failed to read line {} from {}", index + 1, path.display())
        })?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
        if !line.trim().is_empty() {
            records += 1;
        }
    }

    Ok((format!("{:x}", hasher.finalize()), records))
}

fn validate_import_manifest(in_dir: &Path, manifest: &ExportManifest) -> Result<()> {
    if manifest.schema_version <= 0 || manifest.schema_version > LATEST_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported export schema version {}; supported range is 1..={}",
            manifest.schema_version,
            LATEST_SCHEMA_VERSION
        ));
    }

    let Some(expected) = manifest.files.iter().find(|file| file.path == RECORDS_FILE) else {
        return Err(anyhow!("manifest is missing required file entry: {RECORDS_FILE}"));
    };
    if manifest.files.iter().filter(|file| file.path == RECORDS_FILE).count() > 1 {
        return Err(anyhow!("manifest contains duplicate file entry: {RECORDS_FILE}"));
    }

    let file_path = in_dir.join(RECORDS_FILE);
    if !file_path.exists() {
        return Err(anyhow!("manifest references missing file {}", file_path.display()));
    }

    let (actual_sha256, actual_records) = ndjson_digest_and_records(&file_path)?;
    if actual_sha256 != expected.sha256 {
        return Err(anyhow!(
            "manifest digest mismatch for {RECORDS_FILE}: expected {}, got {}",
            expected.sha256,
            actual_sha256
        ));
    }
    if actual_records != expected.records {
        return Err(anyhow!(
            "manifest record count mismatch for {RECORDS_FILE}: expected {}, got {}",
            expected.records,
            actual_records
        ));
    }

    Ok(())
}
