use std::fmt;

use serde::Serialize;

use crate::constants::{ClusterId, SatelliteId};

/// Cluster membership of a detection.
///
/// A detection starts [`ClusterLabel::Unassigned`], receives a [`ClusterLabel::Live`] id during
/// clustering (possibly relabeled when two clusters merge) and may end
/// [`ClusterLabel::Rejected`] when a filter discards its cluster. A rejected detection is
/// never relabeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ClusterLabel {
    #[default]
    Unassigned,
    Live(ClusterId),
    Rejected,
}

impl ClusterLabel {
    pub fn live_id(&self) -> Option<ClusterId> {
        match self {
            ClusterLabel::Live(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_live(&self, id: ClusterId) -> bool {
        matches!(self, ClusterLabel::Live(current) if *current == id)
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterLabel::Unassigned => write!(f, "unassigned"),
            ClusterLabel::Live(id) => write!(f, "{id}"),
            ClusterLabel::Rejected => write!(f, "rejected"),
        }
    }
}

/// Key of the per (cluster, satellite) caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClusterSatKey {
    pub cluster: ClusterId,
    pub satellite: SatelliteId,
}

#[cfg(test)]
mod cluster_label_test {
    use super::*;

    #[test]
    fn test_live_id() {
        assert_eq!(ClusterLabel::Live(4).live_id(), Some(4));
        assert_eq!(ClusterLabel::Rejected.live_id(), None);
        assert_eq!(ClusterLabel::default(), ClusterLabel::Unassigned);
        assert!(ClusterLabel::Live(4).is_live(4));
        assert!(!ClusterLabel::Live(4).is_live(5));
        assert_eq!(ClusterLabel::Live(12).to_string(), "12");
    }

    #[test]
    fn test_key_ordering() {
        let a = ClusterSatKey {
            cluster: 1,
            satellite: 18,
        };
        let b = ClusterSatKey {
            cluster: 2,
            satellite: 16,
        };
        assert!(a < b);
    }
}
