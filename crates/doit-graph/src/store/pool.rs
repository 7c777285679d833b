//! Fixed-size SQLite connection pool with bounded checkout.

use rusqlite::{Connection, OpenFlags};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{Result, StoreError};

pub(crate) struct Pool {
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
    timeout: Duration,
}

impl Pool {
    pub(crate) fn open(path: &Path, size: usize, timeout: Duration) -> Result<Self> {
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            configure(&conn, timeout, true)?;
            connections.push(conn);
        }
        Ok(Self::from_connections(connections, timeout))
    }

    /// A single private in-memory database.
    pub(crate) fn in_memory(timeout: Duration) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn, timeout, false)?;
        Ok(Self::from_connections(vec![conn], timeout))
    }

    fn from_connections(connections: Vec<Connection>, timeout: Duration) -> Self {
        Self {
            idle: Mutex::new(connections),
            available: Condvar::new(),
            timeout,
        }
    }

    /// Waits at most the configured timeout for an idle connection.
    pub(crate) fn get(&self) -> Result<PooledConnection<'_>> {
        let deadline = Instant::now() + self.timeout;
        let mut idle = self.lock();
        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StoreError::Transient(format!(
                    "timed out after {}ms waiting for a database connection",
                    self.timeout.as_millis()
                )));
            }
            idle = match self.available.wait_timeout(idle, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn put_back(&self, conn: Connection) {
        self.lock().push(conn);
        self.available.notify_one();
    }
}

fn configure(conn: &Connection, timeout: Duration, file_backed: bool) -> Result<()> {
    conn.busy_timeout(timeout)?;
    if file_backed {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    }
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(())
}

/// Connection on loan from the pool; returned on drop.
pub(crate) struct PooledConnection<'a> {
    pool: &'a Pool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_times_out_when_exhausted() {
        let pool = Pool::in_memory(Duration::from_millis(20)).unwrap();
        let held = pool.get().unwrap();
        let err = pool.get().err().unwrap();
        assert!(err.is_retryable());
        drop(held);
        assert!(pool.get().is_ok());
    }

    #[test]
    fn connections_enforce_foreign_keys() {
        let pool = Pool::in_memory(Duration::from_millis(100)).unwrap();
        let conn = pool.get().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
