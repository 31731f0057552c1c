//! Category descriptors.

use serde_json::Value;

/// The REST endpoints for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSet {
    /// Endpoint listing all items of the category (the index).
    pub index: &'static str,
    /// Endpoint for item writes; the item id is appended for PUT/DELETE.
    pub object: &'static str,
}

impl PathSet {
    /// Creates a path set where index and object endpoints coincide.
    pub const fn single(path: &'static str) -> Self {
        Self {
            index: path,
            object: path,
        }
    }

    /// Creates a path set with distinct index and object endpoints.
    pub const fn split(index: &'static str, object: &'static str) -> Self {
        Self { index, object }
    }
}

/// REST path selection for a category.
///
/// Most categories use one fixed path set. A few expose two endpoint
/// families and select between them per item; the discriminant is a payload
/// field read once when the item is loaded, never at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiPaths {
    /// One path set for every item of the category.
    Fixed(PathSet),
    /// Two path sets; `field == selector` in the payload picks `alternate`.
    Split {
        /// Payload field carrying the discriminant.
        field: &'static str,
        /// Discriminant value that selects the alternate path set.
        selector: &'static str,
        /// Path set used when the discriminant does not match.
        primary: PathSet,
        /// Path set used when the discriminant matches.
        alternate: PathSet,
    },
}

impl ApiPaths {
    /// Resolves the path set for one item payload.
    ///
    /// For `Fixed` categories the payload is not consulted. For `Split`
    /// categories the discriminant field is read here, once, at item
    /// construction time.
    pub fn resolve(&self, payload: &Value) -> PathSet {
        match self {
            ApiPaths::Fixed(paths) => *paths,
            ApiPaths::Split {
                field,
                selector,
                primary,
                alternate,
            } => {
                let discriminant = payload.get(*field).and_then(Value::as_str);
                if discriminant == Some(*selector) {
                    *alternate
                } else {
                    *primary
                }
            }
        }
    }

    /// The index path set, independent of any one item.
    pub fn index(&self) -> PathSet {
        match self {
            ApiPaths::Fixed(paths) => *paths,
            ApiPaths::Split { primary, .. } => *primary,
        }
    }
}

/// Descriptor for one configuration item category.
///
/// Descriptors are static registry data: the engine consults them for REST
/// paths, payload field names, and the dependency rank implied by their
/// position in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDescriptor {
    /// Tag selecting the category on the command line; several categories
    /// may share one tag.
    pub tag: &'static str,
    /// Unique category name.
    pub category: &'static str,
    /// Human-facing title used in logs and reports.
    pub title: &'static str,
    /// Payload field carrying the item id.
    pub id_field: &'static str,
    /// Payload field carrying the item name.
    pub name_field: &'static str,
    /// REST endpoints.
    pub paths: ApiPaths,
    /// Minimum backend version the category exists on.
    pub min_version: Option<&'static str>,
}

impl CategoryDescriptor {
    /// Returns true if the backend version supports this category.
    ///
    /// A descriptor without `min_version` is supported everywhere. Versions
    /// compare component-wise on dotted integers; a malformed component
    /// compares as zero.
    pub fn supported_on(&self, backend_version: &str) -> bool {
        match self.min_version {
            None => true,
            Some(min) => version_components(backend_version) >= version_components(min),
        }
    }
}

fn version_components(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FEATURE: PathSet = PathSet::split("template/device", "template/device/feature");
    const CLI: PathSet = PathSet::split("template/device", "template/device/cli");

    #[test]
    fn fixed_paths_ignore_payload() {
        let paths = ApiPaths::Fixed(PathSet::single("template/policy/list/site"));
        let resolved = paths.resolve(&json!({"configType": "file"}));
        assert_eq!(resolved.object, "template/policy/list/site");
    }

    #[test]
    fn split_paths_resolve_by_discriminant() {
        let paths = ApiPaths::Split {
            field: "configType",
            selector: "file",
            primary: FEATURE,
            alternate: CLI,
        };

        assert_eq!(
            paths.resolve(&json!({"configType": "template"})).object,
            "template/device/feature"
        );
        assert_eq!(
            paths.resolve(&json!({"configType": "file"})).object,
            "template/device/cli"
        );
        // Missing discriminant falls back to the primary set.
        assert_eq!(paths.resolve(&json!({})).object, "template/device/feature");
    }

    #[test]
    fn version_gating() {
        let descriptor = CategoryDescriptor {
            tag: "policy_security",
            category: "policy_security",
            title: "security policy",
            id_field: "policyId",
            name_field: "policyName",
            paths: ApiPaths::Fixed(PathSet::single("template/policy/security")),
            min_version: Some("18.2.0"),
        };

        assert!(descriptor.supported_on("18.2.0"));
        assert!(descriptor.supported_on("19.1.0"));
        assert!(descriptor.supported_on("18.10.1"));
        assert!(!descriptor.supported_on("18.1.9"));
    }
}
