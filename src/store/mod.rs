//! Persistence: the `Store` interface the crawl engine saves through, backed
//! by SQLite, plus the employee history diff.

mod db;
mod diff;

pub use db::{SqliteStore, open_db, open_db_in_memory};
pub use diff::{FieldChange, FieldValue, TRACKED_FIELDS, diff_employees};

use anyhow::Result;

use crate::error::CrawlError;
use crate::types::Record;

/// Idempotent record sink. `save` upserts with dedup/history semantics;
/// `flush` is the durability barrier, invoked by the ingestion path after a
/// batch, never by the crawl engine itself.
pub trait Store: Send + Sync {
    fn save(&self, record: &Record) -> Result<()>;
    fn flush(&self) -> Result<()>;
}

/// Department query fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepartmentField {
    Idr,
    Parent,
}

impl DepartmentField {
    pub fn parse(name: &str) -> Result<Self, CrawlError> {
        match name {
            "idr" => Ok(DepartmentField::Idr),
            "parent" => Ok(DepartmentField::Parent),
            _ => Err(CrawlError::InvalidField {
                name: name.to_string(),
            }),
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            DepartmentField::Idr => "idr",
            DepartmentField::Parent => "parent",
        }
    }
}

/// Employee query fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmployeeField {
    Tabnum,
    Idr,
    Name,
    Email,
}

impl EmployeeField {
    pub fn parse(name: &str) -> Result<Self, CrawlError> {
        match name {
            "tabnum" => Ok(EmployeeField::Tabnum),
            "idr" => Ok(EmployeeField::Idr),
            "name" | "fio" => Ok(EmployeeField::Name),
            "email" => Ok(EmployeeField::Email),
            _ => Err(CrawlError::InvalidField {
                name: name.to_string(),
            }),
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            EmployeeField::Tabnum => "tabnum",
            EmployeeField::Idr => "idr",
            EmployeeField::Name => "name",
            EmployeeField::Email => "email",
        }
    }
}

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Applied
/// after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Schema: departments (dedup triple), employees (tabnum natural key),
/// history (one row per changed field per re-observation).
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS departments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    idr TEXT NOT NULL,
    parent TEXT NOT NULL,
    text TEXT NOT NULL,
    children INTEGER NOT NULL,
    UNIQUE(idr, parent, text)
);
CREATE INDEX IF NOT EXISTS idx_departments_idr ON departments(idr);

CREATE TABLE IF NOT EXISTS employees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    idr TEXT NOT NULL,
    tabnum TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    mid_name TEXT NOT NULL,
    phone TEXT NOT NULL,
    mobile TEXT NOT NULL,
    email TEXT NOT NULL,
    avatar TEXT NOT NULL,
    grade TEXT NOT NULL,
    parent_idr TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_employees_tabnum ON employees(tabnum);

CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date INTEGER NOT NULL,
    field TEXT NOT NULL,
    old_value TEXT NOT NULL,
    employee_id INTEGER NOT NULL REFERENCES employees(id)
);
"#;
