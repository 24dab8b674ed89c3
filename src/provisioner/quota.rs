use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::proto;

/// Subscription tier controlling a tenant's namespace quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTier {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl PlanTier {
    /// Parses the wire enum; anything unknown or unspecified is rejected.
    pub fn from_proto(value: i32) -> Result<Self> {
        match proto::PlanTier::try_from(value) {
            Ok(proto::PlanTier::Free) => Ok(Self::Free),
            Ok(proto::PlanTier::Starter) => Ok(Self::Starter),
            Ok(proto::PlanTier::Pro) => Ok(Self::Pro),
            Ok(proto::PlanTier::Enterprise) => Ok(Self::Enterprise),
            _ => Err(Error::InvalidTier(value)),
        }
    }

    /// Fixed quota record for this tier.
    pub fn quota(self) -> QuotaSpec {
        match self {
            PlanTier::Free => QuotaSpec {
                requests_cpu: "2".to_string(),
                requests_memory: "4Gi".to_string(),
                limits_cpu: "4".to_string(),
                limits_memory: "8Gi".to_string(),
                max_pvcs: 5,
                max_services: 10,
                max_deployments: 5,
                max_statefulsets: 2,
            },
            PlanTier::Starter => QuotaSpec {
                requests_cpu: "5".to_string(),
                requests_memory: "10Gi".to_string(),
                limits_cpu: "10".to_string(),
                limits_memory: "20Gi".to_string(),
                max_pvcs: 10,
                max_services: 20,
                max_deployments: 10,
                max_statefulsets: 5,
            },
            PlanTier::Pro => QuotaSpec {
                requests_cpu: "20".to_string(),
                requests_memory: "40Gi".to_string(),
                limits_cpu: "40".to_string(),
                limits_memory: "80Gi".to_string(),
                max_pvcs: 30,
                max_services: 50,
                max_deployments: 25,
                max_statefulsets: 10,
            },
            PlanTier::Enterprise => QuotaSpec {
                requests_cpu: "100".to_string(),
                requests_memory: "200Gi".to_string(),
                limits_cpu: "200".to_string(),
                limits_memory: "400Gi".to_string(),
                max_pvcs: 100,
                max_services: 200,
                max_deployments: 100,
                max_statefulsets: 50,
            },
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanTier::Free => write!(f, "free"),
            PlanTier::Starter => write!(f, "starter"),
            PlanTier::Pro => write!(f, "pro"),
            PlanTier::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// Hard limits applied to a tenant namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSpec {
    pub requests_cpu: String,
    pub requests_memory: String,
    pub limits_cpu: String,
    pub limits_memory: String,
    pub max_pvcs: i32,
    pub max_services: i32,
    pub max_deployments: i32,
    pub max_statefulsets: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_table_matches_plan() {
        let free = PlanTier::Free.quota();
        assert_eq!(free.requests_cpu, "2");
        assert_eq!(free.max_statefulsets, 2);

        let enterprise = PlanTier::Enterprise.quota();
        assert_eq!(enterprise.limits_memory, "400Gi");
        assert_eq!(enterprise.max_deployments, 100);
    }

    #[test]
    fn test_unknown_tier_is_rejected() {
        assert!(matches!(
            PlanTier::from_proto(0),
            Err(Error::InvalidTier(0))
        ));
        assert!(matches!(
            PlanTier::from_proto(99),
            Err(Error::InvalidTier(99))
        ));
        assert_eq!(
            PlanTier::from_proto(proto::PlanTier::Pro as i32).unwrap(),
            PlanTier::Pro
        );
    }
}
