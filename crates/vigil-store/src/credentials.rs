//! Credential profile accessors

use sqlx::Row;
use tracing::{debug, info};
use vigil_core::{CredentialProfile, Error, NewCredentialProfile, Result};

use crate::{is_foreign_key_violation, is_unique_violation, persistence, PgStore};

impl PgStore {
    /// Create a credential profile, returning its generated id.
    pub async fn create_credential_profile(
        &self,
        profile: &NewCredentialProfile,
    ) -> Result<i32> {
        let row = sqlx::query(
            "INSERT INTO credential_profiles (name, system_type, config) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&profile.name)
        .bind(&profile.system_type)
        .bind(&profile.config)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Validation(format!(
                    "credential profile name already in use: {}",
                    profile.name
                ))
            } else {
                persistence(e)
            }
        })?;

        let id: i32 = row.try_get("id").map_err(persistence)?;
        info!(id, name = %profile.name, "Credential profile created");
        Ok(id)
    }

    /// All credential profiles, oldest first.
    pub async fn credential_profiles(&self) -> Result<Vec<CredentialProfile>> {
        let rows = sqlx::query(
            "SELECT id, name, system_type, config FROM credential_profiles ORDER BY id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(persistence)?;

        rows.iter().map(credential_from_row).collect()
    }

    pub async fn credential_profile(&self, id: i32) -> Result<CredentialProfile> {
        let row = sqlx::query(
            "SELECT id, name, system_type, config FROM credential_profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(persistence)?
        .ok_or_else(|| Error::NotFound(format!("credential profile {id}")))?;

        credential_from_row(&row)
    }

    pub async fn update_credential_profile(
        &self,
        id: i32,
        profile: &NewCredentialProfile,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE credential_profiles SET name = $1, system_type = $2, config = $3 \
             WHERE id = $4",
        )
        .bind(&profile.name)
        .bind(&profile.system_type)
        .bind(&profile.config)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Validation(format!(
                    "credential profile name already in use: {}",
                    profile.name
                ))
            } else {
                persistence(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("credential profile {id}")));
        }
        debug!(id, "Credential profile updated");
        Ok(())
    }

    /// Delete a credential profile. Rejected while any discovery profile
    /// still references it.
    pub async fn delete_credential_profile(&self, id: i32) -> Result<()> {
        let result = sqlx::query("DELETE FROM credential_profiles WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::Validation(format!(
                        "credential profile {id} is referenced by discovery profiles"
                    ))
                } else {
                    persistence(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("credential profile {id}")));
        }
        info!(id, "Credential profile deleted");
        Ok(())
    }
}

fn credential_from_row(row: &sqlx::postgres::PgRow) -> Result<CredentialProfile> {
    Ok(CredentialProfile {
        id: row.try_get("id").map_err(persistence)?,
        name: row.try_get("name").map_err(persistence)?,
        system_type: row.try_get("system_type").map_err(persistence)?,
        config: row.try_get("config").map_err(persistence)?,
    })
}
