//! Test utilities for database setup.
//!
//! Reuses the authoritative schema initialization so test code never
//! duplicates table definitions.

use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;

use crate::auth::db as auth_db;
use crate::db;
use crate::domain::{AccountStatus, Role};

/// Test environment with a migrated, seeded database in a temp directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for database file persistence)
    pub temp: TempDir,
    /// Connection with full schema and default stages
    pub conn: Connection,
    admin_id: i64,
}

impl TestEnv {
    /// Create a database with all migrations, default stages and one approved admin.
    pub fn new() -> rusqlite::Result<Self> {
        let temp =
            TempDir::new().map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let conn = Connection::open(temp.path().join("yaqeen.db"))?;
        db::configure_connection(&conn)?;
        db::run_migrations(&conn)?;
        db::stages::seed_default_stages(&conn)?;

        let admin_id = auth_db::create_user(
            &conn,
            "admin",
            "not-a-real-hash",
            "Administrator",
            Role::Admin,
            AccountStatus::Approved,
        )?;

        Ok(Self {
            temp,
            conn,
            admin_id,
        })
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn admin_id(&self) -> i64 {
        self.admin_id
    }

    /// Create an approved user; students are enrolled on the first stage.
    pub fn approved_user(&self, username: &str, role: Role) -> i64 {
        let id = auth_db::create_user(
            &self.conn,
            username,
            "not-a-real-hash",
            username,
            role,
            AccountStatus::Approved,
        )
        .unwrap();
        if role == Role::Student {
            db::stages::ensure_student_profile(&self.conn, id).unwrap();
        }
        id
    }

    /// Create a group led by `teacher_id` containing `students`.
    pub fn group_with(&self, name: &str, teacher_id: i64, students: &[i64]) -> i64 {
        let group_id = db::groups::create_group(&self.conn, name, None, teacher_id).unwrap();
        for student in students {
            db::groups::add_member(&self.conn, group_id, *student).unwrap();
        }
        group_id
    }
}
