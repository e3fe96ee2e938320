//! Postgres-backed profile store.
//!
//! Used when profiles are kept in the clinic's own database instead of the
//! hosted document store. Single-fetch only; see `ProfileStore::watch_profile`.

use sqlx::{PgPool, Row};

use super::{Profile, ProfileStore, StoreError};
use crate::role::Role;

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Build a profile from stored columns. Unknown role tokens load as `None`.
fn profile_from_columns(
    uid: String,
    email: Option<String>,
    role: Option<&str>,
    display_name: Option<String>,
    patient_doc_id: Option<String>,
    doctor_doc_id: Option<String>,
) -> Profile {
    Profile { uid, email, role: role.and_then(Role::parse_token), display_name, patient_doc_id, doctor_doc_id }
}

#[async_trait::async_trait]
impl ProfileStore for PgProfileStore {
    async fn fetch_profile(&self, uid: &str) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(
            r"SELECT uid, email, role, display_name, patient_doc_id, doctor_doc_id
              FROM profiles
              WHERE uid = $1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let role: Option<String> = r.get("role");
            profile_from_columns(
                r.get("uid"),
                r.get("email"),
                role.as_deref(),
                r.get("display_name"),
                r.get("patient_doc_id"),
                r.get("doctor_doc_id"),
            )
        }))
    }

    async fn put_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO profiles (uid, email, role, display_name, patient_doc_id, doctor_doc_id)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (uid) DO UPDATE SET
                  email = EXCLUDED.email,
                  role = EXCLUDED.role,
                  display_name = EXCLUDED.display_name,
                  patient_doc_id = EXCLUDED.patient_doc_id,
                  doctor_doc_id = EXCLUDED.doctor_doc_id,
                  updated_at = now()",
        )
        .bind(&profile.uid)
        .bind(&profile.email)
        .bind(profile.role.map(Role::as_str))
        .bind(&profile.display_name)
        .bind(&profile.patient_doc_id)
        .bind(&profile.doctor_doc_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
