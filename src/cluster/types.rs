// Core identity types shared by the procedure framework and the move workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace that holds the cluster's own system tables
pub const SYSTEM_NAMESPACE: &str = "system";

/// Identity of a node that can host regions.
///
/// The start code distinguishes two incarnations of a server on the same
/// host and port, so a restarted node is a different `ServerName`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerName {
    pub host: String,
    pub port: u16,
    pub start_code: u64,
}

impl ServerName {
    pub fn new(host: impl Into<String>, port: u16, start_code: u64) -> Self {
        Self {
            host: host.into(),
            port,
            start_code,
        }
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.host, self.port, self.start_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    pub namespace: String,
    pub qualifier: String,
}

impl TableName {
    pub fn new(namespace: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            qualifier: qualifier.into(),
        }
    }

    /// The catalog table that records where every region lives
    pub fn meta() -> Self {
        Self::new(SYSTEM_NAMESPACE, "meta")
    }

    /// The table that registers namespaces
    pub fn namespace_registry() -> Self {
        Self::new(SYSTEM_NAMESPACE, "namespace")
    }

    pub fn is_meta(&self) -> bool {
        *self == Self::meta()
    }

    pub fn is_namespace_registry(&self) -> bool {
        *self == Self::namespace_registry()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.qualifier)
    }
}

/// A contiguous key range of a table; the unit of placement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionInfo {
    pub table: TableName,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub region_id: u64,
}

impl RegionInfo {
    pub fn new(table: TableName, start_key: &[u8], end_key: &[u8], region_id: u64) -> Self {
        Self {
            table,
            start_key: start_key.to_vec(),
            end_key: end_key.to_vec(),
            region_id,
        }
    }

    /// Unique name used in logs, as the region lock key and as the key of
    /// region state. Daughters of a split share the parent's region id, so
    /// the start key is part of the name: `table,hex(start_key),region_id`.
    pub fn encoded_name(&self) -> String {
        let start_key: String = self.start_key.iter().map(|b| format!("{:02x}", b)).collect();
        format!("{},{},{:016x}", self.table, start_key, self.region_id)
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }
}

impl fmt::Display for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encoded_name())
    }
}

/// Table states as tracked by the table-state registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableState {
    Enabled,
    Enabling,
    Disabled,
    Disabling,
}

impl TableState {
    /// Disabled or on its way there
    pub fn is_disabled_or_disabling(self) -> bool {
        matches!(self, TableState::Disabled | TableState::Disabling)
    }
}

/// Region states as tracked by the region-state registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionState {
    Open,
    Opening,
    Closing,
    Closed,
    Offline,
    Split,
    Merged,
}

impl RegionState {
    /// Whether a region in this state can still be reached for a move
    pub fn is_online(self) -> bool {
        matches!(
            self,
            RegionState::Open | RegionState::Opening | RegionState::Closing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_table_detection() {
        assert!(TableName::meta().is_meta());
        assert!(TableName::namespace_registry().is_namespace_registry());
        assert!(!TableName::namespace_registry().is_meta());

        let users = TableName::new("default", "users");
        assert!(!users.is_namespace_registry());
        assert!(!users.is_meta());
        assert_eq!(users.to_string(), "default:users");
    }

    #[test]
    fn test_region_encoded_name() {
        let region = RegionInfo::new(TableName::new("default", "users"), b"a", b"m", 255);
        assert_eq!(region.encoded_name(), "default:users,61,00000000000000ff");
        assert_eq!(region.to_string(), region.encoded_name());

        let first = RegionInfo::new(TableName::new("default", "users"), b"", b"a", 255);
        assert_eq!(first.encoded_name(), "default:users,,00000000000000ff");
    }

    #[test]
    fn test_split_daughters_sharing_an_id_have_distinct_names() {
        let table = TableName::new("default", "t");
        let left = RegionInfo::new(table.clone(), b"", b"k", 0x6a4);
        let right = RegionInfo::new(table, b"k", b"", 0x6a4);

        assert_ne!(left.encoded_name(), right.encoded_name());
    }

    #[test]
    fn test_server_name_display() {
        let server = ServerName::new("rs1.example.org", 16020, 1700000000000);
        assert_eq!(server.to_string(), "rs1.example.org,16020,1700000000000");
    }

    #[test]
    fn test_region_state_online_classification() {
        assert!(RegionState::Open.is_online());
        assert!(RegionState::Closing.is_online());
        assert!(!RegionState::Offline.is_online());
        assert!(!RegionState::Split.is_online());
        assert!(!RegionState::Merged.is_online());
        assert!(TableState::Disabling.is_disabled_or_disabling());
        assert!(!TableState::Enabling.is_disabled_or_disabling());
    }
}
