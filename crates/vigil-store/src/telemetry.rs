//! Telemetry history reads

use sqlx::Row;
use vigil_core::{Error, Result, SystemData};

use crate::{persistence, PgStore};

impl PgStore {
    /// Every telemetry row captured for a profile, oldest first.
    ///
    /// An empty history for an existing profile is reported as not found,
    /// matching the API's "no system info" behavior.
    pub async fn system_data(&self, discovery_profile_id: i32) -> Result<Vec<SystemData>> {
        let rows = sqlx::query(
            "SELECT discovery_profile_id, system_info, captured_at \
             FROM system_data WHERE discovery_profile_id = $1 ORDER BY captured_at",
        )
        .bind(discovery_profile_id)
        .fetch_all(self.pool())
        .await
        .map_err(persistence)?;

        if rows.is_empty() {
            return Err(Error::NotFound(format!(
                "system data for discovery profile {discovery_profile_id}"
            )));
        }

        rows.iter()
            .map(|row| {
                Ok(SystemData {
                    discovery_profile_id: row
                        .try_get("discovery_profile_id")
                        .map_err(persistence)?,
                    system_info: row.try_get("system_info").map_err(persistence)?,
                    captured_at: row.try_get("captured_at").map_err(persistence)?,
                })
            })
            .collect()
    }
}
