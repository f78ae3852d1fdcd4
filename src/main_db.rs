use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::cmp::Ordering;
use std::error::Error;
use std::path::Path;
use std::str::FromStr;

use crate::utils;

/* The main database. It is mostly a key-value record with transactions:
`kv_store` holds serialized values keyed by a fixed identifier (the route
history lives under one key), `setting` holds typed user overrides.
*/

#[allow(clippy::type_complexity)]
fn run_migration(
    conn: &mut Connection,
    migrations: &[&dyn Fn(&Transaction) -> Result<()>],
) -> Result<()> {
    let tx = conn.transaction()?;

    let version = utils::db::init_metadata_and_get_version(&tx)? as usize;
    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for (i, f) in migrations.iter().enumerate().skip(version) {
                info!("running migration for version: {}", i + 1);
                f(&tx)?;
            }
            utils::db::set_version_in_metadata(&tx, target_version as i32)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(())
}

fn migration_v1(tx: &Transaction) -> Result<()> {
    let sql = "
    CREATE TABLE kv_store (
        key               TEXT    PRIMARY KEY
                                  NOT NULL
                                  UNIQUE,
        value             TEXT    NOT NULL
    );
    CREATE TABLE setting (
        key               TEXT    PRIMARY KEY
                                  NOT NULL
                                  UNIQUE,
        value             TEXT
    );
    ";
    for s in sql_split::split(sql) {
        tx.execute(&s, ())?;
    }
    Ok(())
}

pub struct Txn<'a> {
    db_txn: rusqlite::Transaction<'a>,
}

impl Txn<'_> {
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let mut query = self
            .db_txn
            .prepare_cached("SELECT value FROM kv_store WHERE key = ?1;")?;
        Ok(query.query_row([key], |row| row.get(0)).optional()?)
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.db_txn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?1, ?2);",
            (key, value),
        )?;
        Ok(())
    }

    // returns whether there was something to remove
    pub fn remove_value(&self, key: &str) -> Result<bool> {
        let changes = self
            .db_txn
            .execute("DELETE FROM kv_store WHERE key = ?1;", (key,))?;
        Ok(changes > 0)
    }
}

pub struct MainDb {
    conn: Connection,
}

impl MainDb {
    pub fn open(support_dir: &str) -> Result<MainDb> {
        let file_name = "main.db";
        debug!("open and run migration for {}", file_name);
        let conn = Connection::open(Path::new(support_dir).join(file_name))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<MainDb> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<MainDb> {
        run_migration(&mut conn, &[&migration_v1])?;
        Ok(MainDb { conn })
    }

    pub fn with_txn<F, O>(&mut self, f: F) -> Result<O>
    where
        F: FnOnce(&mut Txn) -> Result<O>,
    {
        let mut txn = Txn {
            db_txn: self.conn.transaction()?,
        };
        let output = f(&mut txn)?;
        txn.db_txn.commit()?;
        Ok(output)
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }

    fn get_setting<T: FromStr>(&mut self, setting: Setting) -> Result<Option<T>>
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        let tx = self.conn.transaction()?;
        let mut query = tx.prepare("SELECT value FROM setting WHERE key = ?1;")?;
        let result: Option<String> = query
            .query_row([setting.to_db_key()], |row| row.get(0))
            .optional()?;
        match result {
            None => Ok(None),
            Some(s) => {
                let v = FromStr::from_str(&s)?;
                Ok(Some(v))
            }
        }
    }

    pub fn get_setting_with_default<T: FromStr>(&mut self, setting: Setting, default: T) -> T
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        match self.get_setting(setting) {
            Ok(v) => v,
            Err(error) => {
                warn!(
                    "[main_db.get_setting_with_default] setting:{:?}, error:{}",
                    setting, error
                );
                None
            }
        }
        .unwrap_or(default)
    }

    pub fn set_setting<T: ToString>(&mut self, setting: Setting, value: T) -> Result<()> {
        let tx = self.conn.transaction()?;
        let sql = "INSERT OR REPLACE INTO setting (key, value) VALUES (?1, ?2);";
        tx.execute(sql, (setting.to_db_key(), value.to_string()))?;
        tx.commit()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Setting {
    SampleIntervalMs,
    ThrottleIntervalMs,
    // Keep the old behavior where stopping a session also wipes the history.
    StopClearsHistory,
    LocationAccuracy,
}

impl Setting {
    fn to_db_key(self) -> &'static str {
        match self {
            Self::SampleIntervalMs => "SAMPLE_INTERVAL_MS",
            Self::ThrottleIntervalMs => "THROTTLE_INTERVAL_MS",
            Self::StopClearsHistory => "STOP_CLEARS_HISTORY",
            Self::LocationAccuracy => "LOCATION_ACCURACY",
        }
    }
}
