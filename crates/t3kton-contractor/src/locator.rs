//! CInP object locators.

use std::fmt;
use std::str::FromStr;

use crate::ContractorError;

/// URI prefix of every Contractor API object.
pub const API_NAMESPACE: &str = "/api/v1";

/// Object classes the controller reads or mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Structure,
    Foundation,
    StructureBlueprint,
    FoundationBlueprint,
    StructureJob,
}

impl ObjectKind {
    /// Application (namespace segment) the class lives in.
    pub fn group(&self) -> &'static str {
        match self {
            ObjectKind::Structure | ObjectKind::Foundation => "Building",
            ObjectKind::StructureBlueprint | ObjectKind::FoundationBlueprint => "BluePrint",
            ObjectKind::StructureJob => "Foreman",
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            ObjectKind::Structure => "Structure",
            ObjectKind::Foundation => "Foundation",
            ObjectKind::StructureBlueprint => "StructureBluePrint",
            ObjectKind::FoundationBlueprint => "FoundationBluePrint",
            ObjectKind::StructureJob => "StructureJob",
        }
    }
}

/// Parsed `/<namespace>/<group>/<class>:<id>:` URI.
///
/// # Examples
///
/// ```
/// use t3kton_contractor::{Locator, ObjectKind};
///
/// let loc: Locator = "/api/v1/BluePrint/StructureBluePrint:base-linux:".parse().unwrap();
/// assert_eq!(loc.id(), "base-linux");
/// assert_eq!(Locator::of(ObjectKind::Structure, 42).to_string(), "/api/v1/Building/Structure:42:");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    namespace: String,
    group: String,
    class: String,
    id: String,
}

impl Locator {
    pub fn new(
        namespace: impl Into<String>,
        group: impl Into<String>,
        class: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            group: group.into(),
            class: class.into(),
            id: id.into(),
        }
    }

    /// Locator of `kind` with `id` under [`API_NAMESPACE`].
    pub fn of(kind: ObjectKind, id: impl fmt::Display) -> Self {
        Self::new(API_NAMESPACE, kind.group(), kind.class(), id.to_string())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Primary key segment; for blueprints this is the blueprint name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// URI for invoking `method` on this object.
    pub fn method(&self, method: &str) -> String {
        format!("{self}({method})")
    }

    pub fn is_kind(&self, kind: ObjectKind) -> bool {
        self.group == kind.group() && self.class == kind.class()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}:{}:", self.namespace, self.group, self.class, self.id)
    }
}

impl FromStr for Locator {
    type Err = ContractorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ContractorError::InvalidLocator(s.to_string());

        if !s.starts_with('/') {
            return Err(invalid());
        }
        let body = s.strip_suffix(':').ok_or_else(invalid)?;
        let (path, id) = body.rsplit_once(':').ok_or_else(invalid)?;
        let (prefix, class) = path.rsplit_once('/').ok_or_else(invalid)?;
        let (namespace, group) = prefix.rsplit_once('/').ok_or_else(invalid)?;

        if id.is_empty() || class.is_empty() || group.is_empty() || class.contains(':') {
            return Err(invalid());
        }

        Ok(Self::new(namespace, group, class, id))
    }
}
