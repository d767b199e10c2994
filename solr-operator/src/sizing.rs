//! Size classes and the resource profile each one maps to.

use crate::error::{OperatorError, OperatorResult};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::fmt;
use std::str::FromStr;

/// Abstract size of a Solr deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    /// Development and low-traffic cores.
    Small,
    /// Moderate indexes.
    Medium,
    /// Large indexes and heavy query load.
    Large,
}

impl SizeClass {
    /// Every declared size class, smallest first.
    pub const ALL: [SizeClass; 3] = [SizeClass::Small, SizeClass::Medium, SizeClass::Large];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::Small => "small",
            SizeClass::Medium => "medium",
            SizeClass::Large => "large",
        }
    }

    /// Resource profile for this class.
    pub fn profile(&self) -> ResourceProfile {
        match self {
            SizeClass::Small => ResourceProfile {
                cpu_request_millis: 100,
                cpu_limit_millis: 1000,
                memory_mib: 256,
                heap: "256m",
            },
            SizeClass::Medium => ResourceProfile {
                cpu_request_millis: 500,
                cpu_limit_millis: 1000,
                memory_mib: 512,
                heap: "512m",
            },
            SizeClass::Large => ResourceProfile {
                cpu_request_millis: 1000,
                cpu_limit_millis: 2000,
                memory_mib: 1024,
                heap: "1024m",
            },
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeClass {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "small" => Ok(SizeClass::Small),
            "medium" => Ok(SizeClass::Medium),
            "large" => Ok(SizeClass::Large),
            _ => Err(OperatorError::UnknownSizeClass(s.to_string())),
        }
    }
}

/// Compute resources for one Solr pod.
///
/// Memory request and limit are always identical; the CPU request may be
/// lower than the limit so cores can burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceProfile {
    /// CPU request in millicores.
    pub cpu_request_millis: u32,
    /// CPU limit in millicores.
    pub cpu_limit_millis: u32,
    /// Memory request and limit in MiB.
    pub memory_mib: u32,
    /// JVM heap size passed through `SOLR_HEAP`.
    pub heap: &'static str,
}

impl ResourceProfile {
    /// CPU request as a Kubernetes quantity.
    pub fn cpu_request(&self) -> Quantity {
        Quantity(format!("{}m", self.cpu_request_millis))
    }

    /// CPU limit as a Kubernetes quantity.
    pub fn cpu_limit(&self) -> Quantity {
        Quantity(format!("{}m", self.cpu_limit_millis))
    }

    /// Memory as a Kubernetes quantity.
    pub fn memory(&self) -> Quantity {
        Quantity(format!("{}Mi", self.memory_mib))
    }
}

/// Resolve a size class name to its resource profile.
pub fn resolve(size: &str) -> OperatorResult<ResourceProfile> {
    size.parse::<SizeClass>().map(|class| class.profile())
}
