//! SQLite-backed store: open/schema, dedup upserts, history diff, queries.

use anyhow::{Context, Result};
use log::{debug, warn};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{DepartmentField, EmployeeField, SCHEMA, Store, WAL_PRAGMAS, diff_employees};
use crate::types::{Department, Employee, HistoryEntry, Record, unix_now};

const INSERT_DEPARTMENT_SQL: &str = "INSERT OR IGNORE INTO departments \
     (idr, parent, text, children) VALUES (?1, ?2, ?3, ?4)";

const INSERT_EMPLOYEE_SQL: &str = "INSERT INTO employees \
     (idr, tabnum, name, mid_name, phone, mobile, email, avatar, grade, parent_idr, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const UPDATE_EMPLOYEE_SQL: &str = "UPDATE employees SET \
     idr = ?1, name = ?2, mid_name = ?3, phone = ?4, mobile = ?5, email = ?6, \
     avatar = ?7, grade = ?8, parent_idr = ?9, created_at = ?10 WHERE id = ?11";

const INSERT_HISTORY_SQL: &str =
    "INSERT INTO history (date, field, old_value, employee_id) VALUES (?1, ?2, ?3, ?4)";

const SELECT_EMPLOYEE_COLS: &str = "id, idr, tabnum, name, mid_name, phone, mobile, email, \
     avatar, grade, parent_idr, created_at";

/// Open (or create) the store database at `path` with schema and WAL applied.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("open store db at {}", path.display()))?;
    init_connection(&conn)?;
    Ok(conn)
}

/// In-memory connection with the same schema. Test entry point.
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory store db")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}

fn init_connection(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("apply WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

/// SQLite store. A single connection behind a mutex: workers save from many
/// threads but writes are serialized anyway, and SQLite prefers one writer.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(SqliteStore {
            conn: Mutex::new(open_db(path)?),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(SqliteStore {
            conn: Mutex::new(open_db_in_memory()?),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn save_department(&self, dep: &Department) -> Result<()> {
        let conn = self.conn();
        let inserted = conn
            .execute(
                INSERT_DEPARTMENT_SQL,
                params![dep.idr, dep.parent, dep.text, dep.children],
            )
            .context("insert department")?;
        if inserted == 0 {
            debug!("department duplicate skipped: idr={}", dep.idr);
        }
        Ok(())
    }

    /// Upsert one employee by tabnum. First observation inserts; a
    /// re-observation is diffed against the most recently dated stored row,
    /// writing one history entry per changed field before updating in place.
    fn save_employee(&self, emp: &Employee) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("begin save transaction")?;
        let now = unix_now();

        let prior = tx
            .query_row(
                &format!(
                    "SELECT {SELECT_EMPLOYEE_COLS} FROM employees \
                     WHERE tabnum = ?1 ORDER BY created_at DESC LIMIT 1"
                ),
                params![emp.tabnum],
                row_to_employee_with_id,
            )
            .optional()
            .context("query prior employee")?;

        match prior {
            None => {
                tx.execute(
                    INSERT_EMPLOYEE_SQL,
                    params![
                        emp.idr,
                        emp.tabnum,
                        emp.name,
                        emp.mid_name,
                        emp.phone.join(","),
                        emp.mobile.join(","),
                        emp.email,
                        emp.avatar,
                        emp.grade,
                        emp.parent_idr,
                        now,
                    ],
                )
                .context("insert employee")?;
            }
            Some((id, old)) => {
                let changes = diff_employees(&old, emp);
                if changes.is_empty() {
                    debug!("employee unchanged: tabnum={}", emp.tabnum);
                    tx.commit().context("commit save transaction")?;
                    return Ok(());
                }
                debug!(
                    "employee changed: tabnum={} fields={}",
                    emp.tabnum,
                    changes.len()
                );
                for ch in &changes {
                    tx.execute(INSERT_HISTORY_SQL, params![now, ch.field, ch.old_value, id])
                        .context("insert history entry")?;
                }
                tx.execute(
                    UPDATE_EMPLOYEE_SQL,
                    params![
                        emp.idr,
                        emp.name,
                        emp.mid_name,
                        emp.phone.join(","),
                        emp.mobile.join(","),
                        emp.email,
                        emp.avatar,
                        emp.grade,
                        emp.parent_idr,
                        now,
                        id,
                    ],
                )
                .context("update employee")?;
            }
        }

        tx.commit().context("commit save transaction")?;
        Ok(())
    }

    /// Departments matching `field = value`.
    pub fn departments_by(&self, field: DepartmentField, value: &str) -> Result<Vec<Department>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT idr, parent, text, children FROM departments WHERE {} = ?1",
                field.column()
            ))
            .context("prepare department query")?;
        let rows = stmt
            .query_map(params![value], |row| {
                Ok(Department {
                    idr: row.get(0)?,
                    parent: row.get(1)?,
                    text: row.get(2)?,
                    children: row.get(3)?,
                })
            })
            .context("query departments")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read department rows")
    }

    /// Employees matching `field = value`.
    pub fn employees_by(&self, field: EmployeeField, value: &str) -> Result<Vec<Employee>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_EMPLOYEE_COLS} FROM employees WHERE {} = ?1",
                field.column()
            ))
            .context("prepare employee query")?;
        let rows = stmt
            .query_map(params![value], |row| {
                row_to_employee_with_id(row).map(|(_, e)| e)
            })
            .context("query employees")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read employee rows")
    }

    /// History rows for the employee with the given tabnum, oldest first.
    pub fn history_for(&self, tabnum: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT h.date, h.field, h.old_value, h.employee_id \
                 FROM history h JOIN employees e ON e.id = h.employee_id \
                 WHERE e.tabnum = ?1 ORDER BY h.id",
            )
            .context("prepare history query")?;
        let rows = stmt
            .query_map(params![tabnum], |row| {
                Ok(HistoryEntry {
                    date: row.get(0)?,
                    field: row.get(1)?,
                    old_value: row.get(2)?,
                    employee_id: row.get(3)?,
                })
            })
            .context("query history")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read history rows")
    }
}

impl Store for SqliteStore {
    fn save(&self, record: &Record) -> Result<()> {
        match record {
            Record::Branch(dep) => self.save_department(dep),
            Record::Leaf(emp) => {
                if emp.tabnum.is_empty() {
                    warn!("skip employee with empty tabnum: idr={}", emp.idr);
                    return Ok(());
                }
                self.save_employee(emp)
            }
        }
    }

    fn flush(&self) -> Result<()> {
        let conn = self.conn();
        // PRAGMA wal_checkpoint returns a status row; discard it.
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .optional()
            .context("checkpoint WAL")?;
        Ok(())
    }
}

fn row_to_employee_with_id(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, Employee)> {
    let split = |s: String| -> Vec<String> {
        if s.is_empty() {
            Vec::new()
        } else {
            s.split(',').map(String::from).collect()
        }
    };
    Ok((
        row.get(0)?,
        Employee {
            idr: row.get(1)?,
            tabnum: row.get(2)?,
            name: row.get(3)?,
            mid_name: row.get(4)?,
            phone: split(row.get(5)?),
            mobile: split(row.get(6)?),
            email: row.get(7)?,
            avatar: row.get(8)?,
            grade: row.get(9)?,
            parent_idr: row.get(10)?,
            created_at: row.get(11)?,
            children: false,
        },
    ))
}
