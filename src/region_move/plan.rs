use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cluster::{RegionInfo, ServerName};

/// A single region move: where the region is and where it should go.
///
/// A missing destination means the assign step picks one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlan {
    region: RegionInfo,
    source: ServerName,
    destination: Option<ServerName>,
}

impl MovePlan {
    pub fn new(region: RegionInfo, source: ServerName, destination: Option<ServerName>) -> Self {
        Self {
            region,
            source,
            destination,
        }
    }

    pub fn region(&self) -> &RegionInfo {
        &self.region
    }

    pub fn source(&self) -> &ServerName {
        &self.source
    }

    pub fn destination(&self) -> Option<&ServerName> {
        self.destination.as_ref()
    }
}

impl fmt::Display for MovePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region={}, source={}, destination=", self.region, self.source)?;
        match &self.destination {
            Some(destination) => write!(f, "{}", destination),
            None => write!(f, "auto"),
        }
    }
}
