//! Stage completion certificates.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

use super::{now_rfc3339, stages};
use crate::domain::{CertificateStatus, Stage};

#[derive(Debug, Clone, Serialize)]
pub struct Certificate {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub stage_id: i64,
    pub stage_name: String,
    pub status: CertificateStatus,
    pub reached_page: i64,
    pub requested_by: Option<i64>,
    pub created_at: String,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<String>,
    pub rejection_reason: Option<String>,
}

/// Which certificates a listing should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateScope {
    All,
    /// Certificates of students in groups this teacher leads
    Teacher(i64),
    Student(i64),
}

const CERTIFICATE_SELECT: &str = r#"
    SELECT c.id, c.student_id, u.full_name, c.stage_id, s.name, c.status,
           c.reached_page, c.requested_by, c.created_at, c.reviewed_by,
           c.reviewed_at, c.rejection_reason
    FROM certificates c
    JOIN users u ON u.id = c.student_id
    JOIN stages s ON s.id = c.stage_id
"#;

fn certificate_from_row(row: &Row<'_>) -> Result<Certificate> {
    Ok(Certificate {
        id: row.get(0)?,
        student_id: row.get(1)?,
        student_name: row.get(2)?,
        stage_id: row.get(3)?,
        stage_name: row.get(4)?,
        status: row.get(5)?,
        reached_page: row.get(6)?,
        requested_by: row.get(7)?,
        created_at: row.get(8)?,
        reviewed_by: row.get(9)?,
        reviewed_at: row.get(10)?,
        rejection_reason: row.get(11)?,
    })
}

pub fn create_certificate(
    conn: &Connection,
    student_id: i64,
    stage_id: i64,
    reached_page: i64,
    requested_by: Option<i64>,
) -> Result<i64> {
    conn.execute(
        r#"INSERT INTO certificates (student_id, stage_id, status, reached_page, requested_by, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        params![
            student_id,
            stage_id,
            CertificateStatus::Pending,
            reached_page,
            requested_by,
            now_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Issue a pending certificate if `current_page` completes the stage and the
/// student has none for it yet. Returns the new certificate.
pub fn generate_if_completed(
    conn: &Connection,
    student_id: i64,
    stage: &Stage,
    current_page: Option<i64>,
) -> Result<Option<Certificate>> {
    let Some(page) = current_page.filter(|_| stage.is_completed(current_page)) else {
        return Ok(None);
    };
    let inserted = conn.execute(
        r#"INSERT OR IGNORE INTO certificates (student_id, stage_id, status, reached_page, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
        params![student_id, stage.id, CertificateStatus::Pending, page, now_rfc3339()],
    )?;
    if inserted == 0 {
        return Ok(None);
    }
    get_certificate(conn, conn.last_insert_rowid())
}

pub fn get_certificate(conn: &Connection, certificate_id: i64) -> Result<Option<Certificate>> {
    conn.query_row(
        &format!("{} WHERE c.id = ?1", CERTIFICATE_SELECT),
        params![certificate_id],
        certificate_from_row,
    )
    .optional()
}

pub fn list_certificates(
    conn: &Connection,
    scope: CertificateScope,
    status: Option<CertificateStatus>,
) -> Result<Vec<Certificate>> {
    let (filter, id) = match scope {
        CertificateScope::All => ("?1 IS NULL", None),
        CertificateScope::Teacher(id) => (
            r#"c.student_id IN (
                 SELECT m.student_id FROM group_members m
                 JOIN study_groups g ON g.id = m.group_id
                 WHERE g.teacher_id = ?1)"#,
            Some(id),
        ),
        CertificateScope::Student(id) => ("c.student_id = ?1", Some(id)),
    };
    let mut stmt = conn.prepare(&format!(
        "{} WHERE {} AND (?2 IS NULL OR c.status = ?2) ORDER BY c.created_at DESC, c.id DESC",
        CERTIFICATE_SELECT, filter
    ))?;
    let certificates = stmt
        .query_map(params![id, status], certificate_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(certificates)
}

pub fn count_pending(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM certificates WHERE status = ?1",
        params![CertificateStatus::Pending],
        |row| row.get(0),
    )
}

/// Approve a pending certificate and move the student on to the next stage
/// if they are still enrolled on the certified one.
///
/// Returns false if the certificate is not pending; otherwise the stage the
/// student was advanced to, if any.
pub fn approve_certificate(
    conn: &Connection,
    certificate: &Certificate,
    reviewer_id: i64,
) -> Result<(bool, Option<Stage>)> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        r#"UPDATE certificates SET status = ?1, reviewed_by = ?2, reviewed_at = ?3
           WHERE id = ?4 AND status = ?5"#,
        params![
            CertificateStatus::Approved,
            reviewer_id,
            now_rfc3339(),
            certificate.id,
            CertificateStatus::Pending
        ],
    )?;
    if changed == 0 {
        return Ok((false, None));
    }

    let mut advanced = None;
    let current = stages::get_student_stage(&tx, certificate.student_id)?;
    if let Some(current) = current.filter(|s| s.id == certificate.stage_id) {
        if let Some(next) = stages::next_stage(&tx, &current)? {
            stages::set_student_stage(&tx, certificate.student_id, next.id)?;
            advanced = Some(next);
        }
    }
    tx.commit()?;
    Ok((true, advanced))
}

/// Returns false if the certificate is not pending
pub fn reject_certificate(
    conn: &Connection,
    certificate_id: i64,
    reviewer_id: i64,
    reason: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        r#"UPDATE certificates SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, rejection_reason = ?4
           WHERE id = ?5 AND status = ?6"#,
        params![
            CertificateStatus::Rejected,
            reviewer_id,
            now_rfc3339(),
            reason,
            certificate_id,
            CertificateStatus::Pending
        ],
    )?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::testing::TestEnv;

    #[test]
    fn test_generate_only_when_stage_completed() {
        let env = TestEnv::new().unwrap();
        let student = env.approved_user("student", Role::Student);
        let stage = stages::get_student_stage(&env.conn, student).unwrap().unwrap();

        assert!(generate_if_completed(&env.conn, student, &stage, None).unwrap().is_none());
        assert!(generate_if_completed(&env.conn, student, &stage, Some(100)).unwrap().is_none());

        let cert = generate_if_completed(&env.conn, student, &stage, Some(101))
            .unwrap()
            .unwrap();
        assert_eq!(cert.stage_id, stage.id);
        assert_eq!(cert.student_name, "student");
        assert!(generate_if_completed(&env.conn, student, &stage, Some(101)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_manual_request_conflicts() {
        let env = TestEnv::new().unwrap();
        let student = env.approved_user("student", Role::Student);
        let stage = stages::get_student_stage(&env.conn, student).unwrap().unwrap();
        create_certificate(&env.conn, student, stage.id, 101, Some(env.admin_id())).unwrap();
        assert!(create_certificate(&env.conn, student, stage.id, 101, None).is_err());
    }

    #[test]
    fn test_approval_advances_stage() {
        let env = TestEnv::new().unwrap();
        let student = env.approved_user("student", Role::Student);
        let stage = stages::get_student_stage(&env.conn, student).unwrap().unwrap();
        let cert = generate_if_completed(&env.conn, student, &stage, Some(101))
            .unwrap()
            .unwrap();

        let (approved, advanced) = approve_certificate(&env.conn, &cert, env.admin_id()).unwrap();
        assert!(approved);
        let next = advanced.unwrap();
        assert_eq!(next.start_page, 102);
        assert_eq!(stages::get_student_stage(&env.conn, student).unwrap().unwrap().id, next.id);

        // A second approval is refused
        let (again, _) = approve_certificate(&env.conn, &cert, env.admin_id()).unwrap();
        assert!(!again);
        assert_eq!(count_pending(&env.conn).unwrap(), 0);
    }

    #[test]
    fn test_rejection_and_scoped_listing() {
        let env = TestEnv::new().unwrap();
        let teacher = env.approved_user("teacher", Role::Teacher);
        let mine = env.approved_user("mine", Role::Student);
        let other = env.approved_user("other", Role::Student);
        env.group_with("Halaqa", teacher, &[mine]);
        let stage = stages::get_student_stage(&env.conn, mine).unwrap().unwrap();

        let c1 = create_certificate(&env.conn, mine, stage.id, 101, Some(teacher)).unwrap();
        create_certificate(&env.conn, other, stage.id, 101, None).unwrap();

        assert_eq!(list_certificates(&env.conn, CertificateScope::All, None).unwrap().len(), 2);
        let teacher_view = list_certificates(&env.conn, CertificateScope::Teacher(teacher), None).unwrap();
        assert_eq!(teacher_view.len(), 1);
        assert_eq!(teacher_view[0].student_id, mine);

        assert!(reject_certificate(&env.conn, c1, env.admin_id(), Some("incomplete")).unwrap());
        assert!(!reject_certificate(&env.conn, c1, env.admin_id(), None).unwrap());
        let rejected = list_certificates(
            &env.conn,
            CertificateScope::Student(mine),
            Some(CertificateStatus::Rejected),
        )
        .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].rejection_reason.as_deref(), Some("incomplete"));
    }
}
