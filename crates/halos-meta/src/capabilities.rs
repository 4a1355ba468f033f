//! Capability registry and management model version

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use halos_dmr::ModelNode;
use indexmap::IndexSet;
use parking_lot::RwLock;

use crate::error::MetadataError;
use crate::template::AddressTemplate;

/// Version of the management model, e.g. `20.0.0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManagementVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl ManagementVersion {
    /// First version with the capabilities registry
    pub const CAPABILITIES_REGISTRY: Self = Self::new(5, 0, 0);

    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self { major, minor, micro }
    }

    /// Read `management-{major,minor,micro}-version` from a root resource
    pub fn from_root_resource(root: &ModelNode) -> Option<Self> {
        let part = |name: &str| {
            root.child(name)
                .and_then(|n| n.as_int().ok())
                .and_then(|v| u32::try_from(v).ok())
        };
        Some(Self::new(
            part("management-major-version")?,
            part("management-minor-version").unwrap_or(0),
            part("management-micro-version").unwrap_or(0),
        ))
    }
}

impl fmt::Display for ManagementVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl FromStr for ManagementVersion {
    type Err = MetadataError;

    /// Parse `major[.minor[.micro]]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MetadataError::Dmr(halos_dmr::DmrError::invalid_value(format!("management version '{s}'")));
        let mut parts = s.trim().splitn(3, '.').map(str::parse::<u32>);
        let major = parts.next().and_then(Result::ok).ok_or_else(invalid)?;
        let minor = parts.next().map_or(Ok(0), |p| p.map_err(|_| invalid()))?;
        let micro = parts.next().map_or(Ok(0), |p| p.map_err(|_| invalid()))?;
        Ok(Self::new(major, minor, micro))
    }
}

/// Thread safe map from capability name to the templates providing it
#[derive(Debug, Default)]
pub struct Capabilities {
    version: Option<ManagementVersion>,
    registry: RwLock<HashMap<String, IndexSet<AddressTemplate>>>,
}

impl Capabilities {
    /// Empty registry for a server with the given management version
    pub fn new(version: Option<ManagementVersion>) -> Self {
        Self {
            version,
            registry: RwLock::default(),
        }
    }

    /// Management version of the connected server
    pub fn version(&self) -> Option<ManagementVersion> {
        self.version
    }

    /// Whether the server can suggest capability references
    pub fn supports_suggestions(&self) -> bool {
        self.version
            .is_some_and(|v| v >= ManagementVersion::CAPABILITIES_REGISTRY)
    }

    /// Add templates for `name`. Duplicates are ignored.
    pub fn register<I>(&self, name: &str, templates: I)
    where
        I: IntoIterator<Item = AddressTemplate>,
    {
        self.registry
            .write()
            .entry(name.to_string())
            .or_default()
            .extend(templates);
    }

    /// Templates registered for `name`, empty if unknown
    pub fn lookup(&self, name: &str) -> Vec<AddressTemplate> {
        self.registry
            .read()
            .get(name)
            .map(|templates| templates.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.read().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!("5.0.0".parse::<ManagementVersion>().unwrap(), ManagementVersion::new(5, 0, 0));
        assert_eq!("20.1".parse::<ManagementVersion>().unwrap(), ManagementVersion::new(20, 1, 0));
        assert_eq!("4".parse::<ManagementVersion>().unwrap().to_string(), "4.0.0");
        assert!("x.1".parse::<ManagementVersion>().is_err());
        assert!("5.y".parse::<ManagementVersion>().is_err());
    }

    #[test]
    fn test_version_from_root_resource() {
        let mut root = ModelNode::new();
        root.get("management-major-version").unwrap().set(20).unwrap();
        root.get("management-minor-version").unwrap().set(0).unwrap();
        assert_eq!(ManagementVersion::from_root_resource(&root), Some(ManagementVersion::new(20, 0, 0)));
        assert_eq!(ManagementVersion::from_root_resource(&ModelNode::new()), None);
    }

    #[test]
    fn test_suggestions() {
        assert!(!Capabilities::new(None).supports_suggestions());
        assert!(!Capabilities::new(Some(ManagementVersion::new(4, 2, 0))).supports_suggestions());
        assert!(Capabilities::new(Some(ManagementVersion::new(5, 0, 0))).supports_suggestions());
    }

    #[test]
    fn test_register_and_lookup() {
        let capabilities = Capabilities::default();
        let socket = AddressTemplate::of("socket-binding-group=*/socket-binding=*");
        capabilities.register("org.wildfly.network.socket-binding", [socket.clone()]);
        capabilities.register("org.wildfly.network.socket-binding", [socket.clone()]);
        assert!(capabilities.contains("org.wildfly.network.socket-binding"));
        assert_eq!(capabilities.lookup("org.wildfly.network.socket-binding"), vec![socket]);
        assert!(capabilities.lookup("unknown").is_empty());
    }
}
