// Preflight validation shared by construction and state re-validation

use crate::cluster::{ClusterEnv, RegionInfo, TableName};

use super::error::MoveError;

/// Refuse to touch a table while the cluster is hostile to region moves:
/// cluster going down, leader stopping, table disabled or missing.
pub fn preflight_checks(env: &dyn ClusterEnv, table: &TableName) -> Result<(), MoveError> {
    if !env.is_cluster_up() {
        return Err(MoveError::ClusterUnavailable {
            reason: "cluster is shutting down".to_string(),
        });
    }
    if env.is_stopping() {
        return Err(MoveError::ClusterUnavailable {
            reason: "control-plane leader is stopping".to_string(),
        });
    }
    match env.table_state(table) {
        None => Err(MoveError::TableNotFound(table.clone())),
        Some(state) if state.is_disabled_or_disabling() => {
            Err(MoveError::TableDisabled(table.clone()))
        }
        Some(_) => Ok(()),
    }
}

/// Fail with a do-not-retry error when the region cannot be moved because
/// it is gone or already offline.
pub fn check_online(env: &dyn ClusterEnv, region: &RegionInfo) -> Result<(), MoveError> {
    match env.region_state(region) {
        None => Err(MoveError::RegionUnknown {
            region: region.encoded_name(),
        }),
        Some(state) if !state.is_online() => Err(MoveError::RegionOffline {
            region: region.encoded_name(),
        }),
        Some(_) => Ok(()),
    }
}
