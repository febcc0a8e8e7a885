/// Implements `Display`, `ToSql` and `FromSql` for an enum stored as text.
///
/// The type must provide `as_str()` and `FromStr<Err = String>`.
macro_rules! text_column {
  ($ty:ty) => {
    impl std::fmt::Display for $ty {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
      }
    }

    impl rusqlite::types::ToSql for $ty {
      fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
      }
    }

    impl rusqlite::types::FromSql for $ty {
      fn column_result(
        value: rusqlite::types::ValueRef<'_>,
      ) -> rusqlite::types::FromSqlResult<Self> {
        value
          .as_str()?
          .parse()
          .map_err(|e: String| rusqlite::types::FromSqlError::Other(e.into()))
      }
    }
  };
}

pub(crate) use text_column;

pub mod grade;
pub mod role;
pub mod stage;
pub mod status;

pub use grade::Grade;
pub use role::{AccountStatus, Role};
pub use stage::{Stage, FIRST_PAGE, LAST_PAGE};
pub use status::{CertificateStatus, ComplaintStatus, SubmissionStatus};
