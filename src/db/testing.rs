//! In-memory stand-in for MySQL used by the importer and orchestrator tests.
//! It understands exactly the statements this crate generates, and commits
//! DDL immediately the way MySQL does, including an implicit commit of any
//! open transaction on the same session.

use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use super::import::{ImportTarget, SqlTransaction};
use crate::error::ImportError;
use crate::schema::{ColumnSchema, SchemaInspector};

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static COLUMN_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^`([^`]+)` (\S+)( NOT NULL)?").unwrap());

#[derive(Debug, Clone, Default)]
struct FakeTable {
    columns: Vec<ColumnSchema>,
    rows: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, FakeTable>,
    committed: Vec<String>,
    attempted: Vec<String>,
    fail_schema: bool,
    fail_begin: bool,
    fail_patterns: Vec<String>,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct MemoryDb {
    state: Arc<Mutex<State>>,
}

fn ddl(name: &str, columns: &[ColumnSchema]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| {
            let null = if c.nullable { "DEFAULT NULL" } else { "NOT NULL" };
            format!("  `{}` {} {}", c.name, c.declared_type, null)
        })
        .collect();
    format!("CREATE TABLE `{}` (\n{}\n)", name, defs.join(",\n"))
}

fn parse_ddl(sql: &str) -> Option<(String, Vec<ColumnSchema>)> {
    let name = IDENT.captures(sql)?.get(1)?.as_str().to_string();
    let columns = sql
        .lines()
        .skip(1)
        .filter_map(|line| {
            let caps = COLUMN_DEF.captures(line.trim().trim_end_matches(','))?;
            let nullable = if caps.get(3).is_some() { "NO" } else { "YES" };
            Some(ColumnSchema::from_show_columns(&caps[1], &caps[2], nullable, ""))
        })
        .collect();
    Some((name, columns))
}

fn db_err(msg: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Protocol(msg.into())
}

fn idents(sql: &str) -> Vec<String> {
    IDENT
        .captures_iter(sql)
        .map(|c| c[1].to_string())
        .collect()
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_table(self, name: &str, columns: &[(&str, &str, bool)]) -> Self {
        let columns = columns
            .iter()
            .map(|(n, ty, nullable)| {
                ColumnSchema::from_show_columns(n, ty, if *nullable { "YES" } else { "NO" }, "")
            })
            .collect();
        self.lock().tables.insert(
            name.to_string(),
            FakeTable {
                columns,
                rows: Vec::new(),
            },
        );
        self
    }

    pub fn with_rows(self, name: &str, n: usize) -> Self {
        if let Some(t) = self.lock().tables.get_mut(name) {
            t.rows.extend((0..n).map(|i| format!("(pre{})", i)));
        }
        self
    }

    pub fn fail_schema_queries(self) -> Self {
        self.lock().fail_schema = true;
        self
    }

    pub fn fail_begin(self) -> Self {
        self.lock().fail_begin = true;
        self
    }

    /// Any statement containing `pattern` errors.
    pub fn fail_statements_containing(self, pattern: &str) -> Self {
        self.lock().fail_patterns.push(pattern.to_string());
        self
    }

    /// Every statement sleeps this long before running.
    pub fn with_statement_delay(self, delay: Duration) -> Self {
        self.lock().delay = Some(delay);
        self
    }

    pub fn create_definition_of(&self, name: &str) -> Option<String> {
        self.lock().tables.get(name).map(|t| ddl(name, &t.columns))
    }

    pub fn row_count(&self, name: &str) -> Option<usize> {
        self.lock().tables.get(name).map(|t| t.rows.len())
    }

    pub fn rows_of(&self, name: &str) -> Vec<String> {
        self.lock()
            .tables
            .get(name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn columns_of(&self, name: &str) -> Vec<ColumnSchema> {
        self.lock()
            .tables
            .get(name)
            .map(|t| t.columns.clone())
            .unwrap_or_default()
    }

    pub fn column_names(&self, name: &str) -> Vec<String> {
        self.columns_of(name).into_iter().map(|c| c.name).collect()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    /// Statements that are part of a committed transaction.
    pub fn committed_statements(&self) -> Vec<String> {
        self.lock().committed.clone()
    }

    /// Every statement executed, including rolled-back ones.
    pub fn attempted_statements(&self) -> Vec<String> {
        self.lock().attempted.clone()
    }
}

impl SchemaInspector for MemoryDb {
    async fn table_exists(&self, table: &str) -> Result<bool, ImportError> {
        let state = self.lock();
        if state.fail_schema {
            return Err(ImportError::SchemaQuery {
                table: table.to_string(),
                source: db_err("connection reset"),
            });
        }
        Ok(state.tables.contains_key(table))
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnSchema>, ImportError> {
        let state = self.lock();
        match state.tables.get(table) {
            Some(t) if !state.fail_schema => Ok(t.columns.clone()),
            _ => Err(ImportError::SchemaQuery {
                table: table.to_string(),
                source: db_err("columns unavailable"),
            }),
        }
    }

    async fn create_definition(&self, table: &str) -> Result<String, ImportError> {
        let state = self.lock();
        match state.tables.get(table) {
            Some(t) if !state.fail_schema => Ok(ddl(table, &t.columns)),
            _ => Err(ImportError::SchemaQuery {
                table: table.to_string(),
                source: db_err("create definition unavailable"),
            }),
        }
    }
}

impl State {
    fn apply_ddl(&mut self, sql: &str) -> Result<u64, String> {
        let names = idents(sql);
        if sql.starts_with("RENAME TABLE") {
            let (from, to) = (&names[0], &names[1]);
            if self.tables.contains_key(to) {
                return Err(format!("Table '{}' already exists", to));
            }
            let table = self
                .tables
                .remove(from)
                .ok_or_else(|| format!("Table '{}' doesn't exist", from))?;
            self.tables.insert(to.clone(), table);
            Ok(0)
        } else if sql.starts_with("DROP TABLE IF EXISTS") {
            self.tables.remove(&names[0]);
            Ok(0)
        } else if sql.starts_with("CREATE TABLE") {
            let (name, columns) = parse_ddl(sql).ok_or("unparseable CREATE TABLE")?;
            if self.tables.contains_key(&name) {
                return Err(format!("Table '{}' already exists", name));
            }
            self.tables.insert(
                name,
                FakeTable {
                    columns,
                    rows: Vec::new(),
                },
            );
            Ok(0)
        } else {
            Err(format!("unsupported statement: {}", sql))
        }
    }

    /// Target table and row tuples of an `INSERT`, checked against the
    /// current tables.
    fn parse_insert(&self, sql: &str) -> Result<(String, Vec<String>), String> {
        let name = idents(sql)
            .into_iter()
            .next()
            .ok_or("INSERT without table")?;
        let values = sql
            .split_once(" VALUES ")
            .map(|(_, v)| v.trim_end_matches(';'))
            .ok_or("INSERT without VALUES")?;
        if !self.tables.contains_key(&name) {
            return Err(format!("Table '{}' doesn't exist", name));
        }
        let rows = values
            .split("),(")
            .map(|r| format!("({})", r.trim_start_matches('(').trim_end_matches(')')))
            .collect();
        Ok((name, rows))
    }

    fn append(&mut self, table: &str, rows: Vec<String>) {
        if let Some(t) = self.tables.get_mut(table) {
            t.rows.extend(rows);
        }
    }
}

impl MemoryDb {
    /// Delay, record and fault-inject one statement.
    async fn gate(&self, sql: &str) -> Result<(), sqlx::Error> {
        let delay = self.lock().delay;
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let mut state = self.lock();
        state.attempted.push(sql.to_string());
        match state.fail_patterns.iter().find(|p| sql.contains(p.as_str())) {
            Some(p) => Err(db_err(format!("injected failure on {:?}", p))),
            None => Ok(()),
        }
    }

    /// Run `sql` outside any transaction.
    fn autocommit(&self, sql: &str) -> Result<u64, sqlx::Error> {
        let mut state = self.lock();
        let n = if sql.starts_with("INSERT INTO") {
            let (table, rows) = state.parse_insert(sql).map_err(db_err)?;
            let n = rows.len() as u64;
            state.append(&table, rows);
            n
        } else {
            state.apply_ddl(sql).map_err(db_err)?
        };
        state.committed.push(sql.to_string());
        Ok(n)
    }
}

/// Inserts are buffered until commit; DDL flushes them first.
pub struct MemoryTx {
    db: MemoryDb,
    pending: Vec<(String, Vec<String>)>,
    executed: Vec<String>,
}

impl MemoryTx {
    fn flush(&mut self) {
        let mut state = self.db.lock();
        for (table, rows) in self.pending.drain(..) {
            state.append(&table, rows);
        }
        state.committed.append(&mut self.executed);
    }
}

impl SqlTransaction for MemoryTx {
    async fn execute<'a>(&'a mut self, sql: &'a str) -> Result<u64, sqlx::Error> {
        self.db.gate(sql).await?;
        if !sql.starts_with("INSERT INTO") {
            self.flush();
            return self.db.autocommit(sql);
        }
        let (table, rows) = self.db.lock().parse_insert(sql).map_err(db_err)?;
        let n = rows.len() as u64;
        self.pending.push((table, rows));
        self.executed.push(sql.to_string());
        Ok(n)
    }

    async fn commit(mut self) -> Result<(), sqlx::Error> {
        self.flush();
        Ok(())
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

impl ImportTarget for MemoryDb {
    type Tx = MemoryTx;

    async fn execute<'a>(&'a self, sql: &'a str) -> Result<u64, sqlx::Error> {
        self.gate(sql).await?;
        self.autocommit(sql)
    }

    async fn begin(&self) -> Result<MemoryTx, sqlx::Error> {
        if self.lock().fail_begin {
            return Err(db_err("too many connections"));
        }
        Ok(MemoryTx {
            db: self.clone(),
            pending: Vec::new(),
            executed: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> MemoryDb {
        MemoryDb::new().with_table("t", &[("id", "int", false)])
    }

    #[tokio::test]
    async fn rollback_discards_buffered_inserts() {
        let db = db();
        let mut tx = db.begin().await.unwrap();
        tx.execute("INSERT INTO `t` VALUES (1),(2);").await.unwrap();
        assert_eq!(db.row_count("t"), Some(0));
        tx.rollback().await.unwrap();
        assert_eq!(db.row_count("t"), Some(0));
        assert!(db.committed_statements().is_empty());
    }

    #[tokio::test]
    async fn ddl_in_a_transaction_commits_it() {
        let db = db();
        let mut tx = db.begin().await.unwrap();
        tx.execute("INSERT INTO `t` VALUES (1);").await.unwrap();
        tx.execute("DROP TABLE IF EXISTS `t_old`;").await.unwrap();
        tx.execute("INSERT INTO `t` VALUES (2);").await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(db.rows_of("t"), vec!["(1)"]);
    }

    #[tokio::test]
    async fn ddl_outside_a_transaction_is_immediate() {
        let db = db();
        db.execute("RENAME TABLE `t` TO `t_bak`;").await.unwrap();
        assert_eq!(db.table_names(), vec!["t_bak"]);
        let err = db.execute("INSERT INTO `t` VALUES (1);").await.unwrap_err();
        assert!(err.to_string().contains("doesn't exist"));
    }
}
