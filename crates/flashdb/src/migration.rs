//! Pre/post-migration hooks: foreign-key enforcement off while a migration runs

use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{Error, Result};

impl Connection {
    /// Turn foreign-key enforcement off before running migrations
    pub fn before_migration(&mut self) -> Result<()> {
        self.set_foreign_keys(false)
    }

    /// Turn foreign-key enforcement back on
    pub fn after_migration(&mut self) -> Result<()> {
        self.set_foreign_keys(true)
    }

    pub fn foreign_keys_enabled(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.engine_mut()
            .foreign_keys_enabled()
            .map_err(|e| Error::query_failed("PRAGMA foreign_keys", &[], e))
    }

    /// Disable enforcement until the returned guard is dropped or restored.
    /// The previous setting is restored, not unconditionally enabled.
    pub fn disable_foreign_keys(&mut self) -> Result<ForeignKeyGuard<'_>> {
        let previous = self.foreign_keys_enabled()?;
        self.before_migration()?;
        Ok(ForeignKeyGuard {
            conn: self,
            previous,
            restored: false,
        })
    }

    /// Run `f` with enforcement disabled. The setting is restored whether or not `f` succeeds.
    pub fn with_foreign_keys_disabled<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut guard = self.disable_foreign_keys()?;
        let result = f(&mut *guard);
        let restored = guard.restore();
        let value = result?;
        restored?;
        Ok(value)
    }

    fn set_foreign_keys(&mut self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        match self.engine_mut().foreign_keys_directive(enabled) {
            Some(directive) => {
                self.execute(directive, &[], false)?;
                Ok(())
            }
            None => {
                debug!(
                    engine = self.engine_name(),
                    enabled, "engine cannot toggle foreign keys, skipping"
                );
                Ok(())
            }
        }
    }
}

/// Restores the foreign-key setting captured by [`Connection::disable_foreign_keys`]
pub struct ForeignKeyGuard<'a> {
    conn: &'a mut Connection,
    previous: bool,
    restored: bool,
}

impl ForeignKeyGuard<'_> {
    /// Restore now, surfacing the error that `Drop` could only log
    pub fn restore(mut self) -> Result<()> {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> Result<()> {
        if self.restored || self.conn.is_released() {
            self.restored = true;
            return Ok(());
        }
        self.restored = true;
        if self.previous {
            self.conn.after_migration()
        } else {
            Ok(())
        }
    }
}

impl Deref for ForeignKeyGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl DerefMut for ForeignKeyGuard<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
    }
}

impl Drop for ForeignKeyGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore_inner() {
            warn!(error = %e, "failed to restore foreign key enforcement");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{connect, ConnectionOptions, ErrorKind};

    fn connection() -> crate::Connection {
        connect(ConnectionOptions::new()).unwrap()
    }

    #[test]
    fn test_hooks_toggle_enforcement() {
        let mut conn = connection();
        assert!(conn.foreign_keys_enabled().unwrap());

        conn.before_migration().unwrap();
        assert!(!conn.foreign_keys_enabled().unwrap());
        conn.after_migration().unwrap();
        assert!(conn.foreign_keys_enabled().unwrap());
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mut conn = connection();
        {
            let mut guard = conn.disable_foreign_keys().unwrap();
            assert!(!guard.foreign_keys_enabled().unwrap());
        }
        assert!(conn.foreign_keys_enabled().unwrap());
    }

    #[test]
    fn test_guard_keeps_disabled_setting() {
        let mut conn = connection();
        conn.before_migration().unwrap();

        let guard = conn.disable_foreign_keys().unwrap();
        guard.restore().unwrap();
        assert!(!conn.foreign_keys_enabled().unwrap());
    }

    #[test]
    fn test_restored_after_failure() {
        let mut conn = connection();
        conn.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (parent_id INTEGER REFERENCES parent(id));",
        )
        .unwrap();

        let err = conn
            .with_foreign_keys_disabled(|conn| {
                conn.execute("INSERT INTO child VALUES (42)", &[], false)?;
                conn.execute("SELECT * FROM missing_table", &[], false)?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryExecution);

        assert!(conn.foreign_keys_enabled().unwrap());
        let err = conn
            .execute("INSERT INTO child VALUES (7)", &[], false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryExecution);
    }

    #[test]
    fn test_hooks_after_release() {
        let mut conn = connection();
        conn.release().unwrap();
        let err = conn.before_migration().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandleAlreadyReleased);
    }
}
