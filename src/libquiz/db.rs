use crate::libquiz::flag::{FlagError, FlagRecord, FlagSink};
use log::{debug, error, info};
use rusqlite::{params, Connection, Result, Row};
use std::path::Path;
use std::time::Instant;

/// A row of the `Flag` table.
#[derive(Debug, Clone)]
pub struct Flag {
    pub id: i64,
    pub flagged_at: String,
    pub domain: String,
    pub question: String,
    pub source: String,
    pub notes: String,
}

impl Flag {
    pub fn add(connection: &Connection, src: &FlagRecord) -> Result<i64> {
        match connection.execute(
            "INSERT INTO \
            Flag(flaggedAt, domain, question, source, notes) \
            VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                src.timestamp(),
                src.domain_label(),
                src.question,
                src.source,
                src.notes
            ],
        ) {
            Ok(_) => {
                let id = connection.last_insert_rowid();
                debug!("[DB] Created new Flag {} in domain '{}'", id, src.domain_label());
                Ok(id)
            }
            Err(err) => {
                error!("[DB] Error while creating new Flag: {:?}", err);
                Err(err)
            }
        }
    }

    fn from_row(row: &Row) -> Result<Flag> {
        Ok(Flag {
            id: row.get(0)?,
            flagged_at: row.get(1)?,
            domain: row.get(2)?,
            question: row.get(3)?,
            source: row.get(4)?,
            notes: row.get(5)?,
        })
    }

    pub fn get_all(connection: &Connection) -> Result<Vec<Flag>> {
        let mut statement = connection.prepare("SELECT * FROM Flag ORDER BY id")?;
        let rows = statement.query_map([], |row| Self::from_row(row))?;

        rows.collect()
    }

    pub fn get_in_domain(connection: &Connection, domain: &str) -> Result<Vec<Flag>> {
        let mut statement =
            connection.prepare("SELECT * FROM Flag WHERE domain = :domain ORDER BY id")?;
        let rows = statement.query_map(&[(":domain", &domain)], |row| Self::from_row(row))?;

        rows.collect()
    }
}

/// Keeps flagged questions in a local SQLite table.
#[derive(Debug)]
pub struct SqliteFlagSink {
    connection: Connection,
}

impl SqliteFlagSink {
    pub fn open(path: &Path) -> Result<SqliteFlagSink> {
        Ok(SqliteFlagSink {
            connection: create_or_open(path)?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn close(self) -> Result<()> {
        close_db(self.connection)
    }
}

impl FlagSink for SqliteFlagSink {
    fn append(&mut self, flag: &FlagRecord) -> std::result::Result<(), FlagError> {
        Flag::add(&self.connection, flag)?;
        Ok(())
    }
}

/// Existing files still get the schema; it may be empty or belong to something else.
pub(crate) fn create_or_open(src: &Path) -> Result<Connection> {
    if src.exists() {
        info!("[DB] Opening existing flag database");
        init_db(open_db(src)?)
    } else {
        info!("[DB] Creating new flag database");
        create_db(src)
    }
}

pub(crate) fn create_db(dest: &Path) -> Result<Connection> {
    let now = Instant::now();
    let db = init_db(Connection::open(dest)?)?;
    debug!(
        "[DB] Creating and Saving took {} ms.",
        now.elapsed().as_millis()
    );
    Ok(db)
}

pub(crate) fn open_db(src: &Path) -> Result<Connection> {
    let now = Instant::now();
    let db = Connection::open(src)?;
    debug!("[DB] Opening took {} ms.", now.elapsed().as_millis());
    Ok(db)
}

pub(crate) fn close_db(connection: Connection) -> Result<()> {
    info!("[DB] Closing flag database");
    match connection.close() {
        Ok(_) => Ok(()),
        Err((conn, _)) => {
            error!("[DB] Cannot close connection. Retrying 1/1...");
            conn.close().map_err(|(_, err)| err)
        }
    }
}

fn init_db(conn: Connection) -> Result<Connection> {
    info!("[DB INIT] Creating tables");
    conn.execute(
        "CREATE TABLE IF NOT EXISTS Flag (
              id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
              flaggedAt TEXT NOT NULL,
              domain TEXT NOT NULL,
              question TEXT NOT NULL,
              source TEXT NOT NULL,
              notes TEXT NOT NULL
            )",
        (),
    )?;
    info!("[DB INIT] Created table Flag");
    conn.execute(
        "CREATE INDEX IF NOT EXISTS Flag_domain_idx ON Flag(domain)",
        (),
    )?;
    info!("[DB INIT] Created index Flag_domain_idx");

    Ok(conn)
}
