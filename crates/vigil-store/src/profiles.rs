//! Discovery profile accessors and the `ProfileStore` implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use tracing::{debug, info};
use vigil_core::{
    DiscoveryProfile, DiscoveryTarget, Error, NewDiscoveryProfile, ProfileStore, Result,
    DISCOVERED,
};

use crate::{is_foreign_key_violation, is_unique_violation, parse_ip, persistence, PgStore};

impl PgStore {
    /// Create a discovery profile, returning its generated id. The target
    /// address is stored as text; callers validate it as an `IpAddr`.
    pub async fn create_discovery_profile(&self, profile: &NewDiscoveryProfile) -> Result<i32> {
        let row = sqlx::query(
            "INSERT INTO discovery_profiles (name, ip, credential_profile_id) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&profile.name)
        .bind(profile.ip.to_string())
        .bind(profile.credential_profile_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Validation(format!(
                    "discovery profile name already in use: {}",
                    profile.name
                ))
            } else if is_foreign_key_violation(&e) {
                Error::Validation(format!(
                    "credential profile {} does not exist",
                    profile.credential_profile_id
                ))
            } else {
                persistence(e)
            }
        })?;

        let id: i32 = row.try_get("id").map_err(persistence)?;
        info!(id, name = %profile.name, ip = %profile.ip, "Discovery profile created");
        Ok(id)
    }

    /// All discovery profiles, oldest first.
    pub async fn discovery_profiles(&self) -> Result<Vec<DiscoveryProfile>> {
        let rows = sqlx::query(
            "SELECT id, name, ip, credential_profile_id, discovery_status, provision_status \
             FROM discovery_profiles ORDER BY id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(persistence)?;

        rows.iter().map(profile_from_row).collect()
    }

    pub async fn discovery_profile(&self, id: i32) -> Result<DiscoveryProfile> {
        let row = sqlx::query(
            "SELECT id, name, ip, credential_profile_id, discovery_status, provision_status \
             FROM discovery_profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(persistence)?
        .ok_or_else(|| Error::profile_not_found(id))?;

        profile_from_row(&row)
    }

    /// Update a profile's target address and credential reference.
    pub async fn update_discovery_profile(
        &self,
        id: i32,
        ip: std::net::IpAddr,
        credential_profile_id: i32,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE discovery_profiles SET ip = $1, credential_profile_id = $2 WHERE id = $3",
        )
        .bind(ip.to_string())
        .bind(credential_profile_id)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                Error::Validation(format!(
                    "credential profile {credential_profile_id} does not exist"
                ))
            } else {
                persistence(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::profile_not_found(id));
        }
        debug!(id, "Discovery profile updated");
        Ok(())
    }

    pub async fn delete_discovery_profile(&self, id: i32) -> Result<()> {
        let result = sqlx::query("DELETE FROM discovery_profiles WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(persistence)?;

        if result.rows_affected() == 0 {
            return Err(Error::profile_not_found(id));
        }
        info!(id, "Discovery profile deleted");
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn discovery_target(&self, id: i32) -> Result<DiscoveryTarget> {
        let row = sqlx::query(
            "SELECT dp.id, dp.name, dp.ip, cp.system_type, cp.config \
             FROM discovery_profiles dp \
             JOIN credential_profiles cp ON dp.credential_profile_id = cp.id \
             WHERE dp.id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(persistence)?
        .ok_or_else(|| Error::profile_not_found(id))?;

        target_from_row(&row)
    }

    async fn set_discovery_status(&self, id: i32, status: i16) -> Result<()> {
        let result =
            sqlx::query("UPDATE discovery_profiles SET discovery_status = $1 WHERE id = $2")
                .bind(status)
                .bind(id)
                .execute(self.pool())
                .await
                .map_err(persistence)?;

        if result.rows_affected() == 0 {
            return Err(Error::profile_not_found(id));
        }
        info!(id, status, "Discovery status updated");
        Ok(())
    }

    async fn set_provision_status(&self, id: i32, status: i16) -> Result<()> {
        // The gate lives in the WHERE clause: an undiscovered profile can
        // never become provisioned.
        let result = sqlx::query(
            "UPDATE discovery_profiles SET provision_status = $1 \
             WHERE id = $2 AND discovery_status = $3",
        )
        .bind(status)
        .bind(id)
        .bind(DISCOVERED)
        .execute(self.pool())
        .await
        .map_err(persistence)?;

        if result.rows_affected() == 0 {
            return Err(Error::Validation(format!(
                "discovery profile {id} is not discovered or does not exist"
            )));
        }
        info!(id, status, "Provision status updated");
        Ok(())
    }

    async fn provisioned_targets(&self) -> Result<Vec<DiscoveryTarget>> {
        let rows = sqlx::query(
            "SELECT dp.id, dp.name, dp.ip, cp.system_type, cp.config \
             FROM discovery_profiles dp \
             JOIN credential_profiles cp ON dp.credential_profile_id = cp.id \
             WHERE dp.provision_status = 1 ORDER BY dp.id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(persistence)?;

        rows.iter().map(target_from_row).collect()
    }

    async fn append_system_data(
        &self,
        discovery_profile_id: i32,
        payload: &Value,
        captured_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO system_data (discovery_profile_id, system_info, captured_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(discovery_profile_id)
        .bind(payload)
        .bind(captured_at)
        .execute(self.pool())
        .await
        .map_err(persistence)?;

        debug!(discovery_profile_id, "System data appended");
        Ok(())
    }
}

fn profile_from_row(row: &sqlx::postgres::PgRow) -> Result<DiscoveryProfile> {
    let raw_ip: String = row.try_get("ip").map_err(persistence)?;
    Ok(DiscoveryProfile {
        id: row.try_get("id").map_err(persistence)?,
        name: row.try_get("name").map_err(persistence)?,
        ip: parse_ip(&raw_ip)?,
        credential_profile_id: row.try_get("credential_profile_id").map_err(persistence)?,
        discovery_status: row.try_get("discovery_status").map_err(persistence)?,
        provision_status: row.try_get("provision_status").map_err(persistence)?,
    })
}

fn target_from_row(row: &sqlx::postgres::PgRow) -> Result<DiscoveryTarget> {
    let raw_ip: String = row.try_get("ip").map_err(persistence)?;
    Ok(DiscoveryTarget {
        profile_id: row.try_get("id").map_err(persistence)?,
        name: row.try_get("name").map_err(persistence)?,
        ip: parse_ip(&raw_ip)?,
        system_type: row.try_get("system_type").map_err(persistence)?,
        credentials: row.try_get("config").map_err(persistence)?,
    })
}
