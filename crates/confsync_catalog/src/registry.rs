//! The catalog registry.

use crate::descriptor::{ApiPaths, CategoryDescriptor, PathSet};
use thiserror::Error;

/// Tag selecting every category.
pub const WILDCARD_TAG: &str = "all";

/// Result type for catalog lookups.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by catalog lookups.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    /// The requested tag is not registered.
    #[error("unknown category tag '{0}'")]
    UnknownTag(String),
}

/// The static item-type registry.
///
/// Descriptors are held most-dependent first: the first entry depends
/// (transitively) on everything after it. That order is the safe deletion
/// order; its reverse is the safe creation order. The registry is built
/// once at startup and owned by the application context, never mutated.
#[derive(Debug, Clone)]
pub struct Catalog {
    descriptors: Vec<CategoryDescriptor>,
}

impl Catalog {
    /// Builds the built-in registry.
    ///
    /// Registration order is the dependency order: device templates sit on
    /// top of feature templates and the policy families, central policies
    /// sit on top of definitions, definitions on top of lists.
    pub fn builtin() -> Self {
        let descriptors = vec![
            CategoryDescriptor {
                tag: "template_device",
                category: "template_device",
                title: "device template",
                id_field: "templateId",
                name_field: "templateName",
                paths: ApiPaths::Split {
                    field: "configType",
                    selector: "file",
                    primary: PathSet::split("template/device", "template/device/feature"),
                    alternate: PathSet::split("template/device", "template/device/cli"),
                },
                min_version: None,
            },
            CategoryDescriptor {
                tag: "template_feature",
                category: "template_feature",
                title: "feature template",
                id_field: "templateId",
                name_field: "templateName",
                paths: ApiPaths::Fixed(PathSet::single("template/feature")),
                min_version: None,
            },
            CategoryDescriptor {
                tag: "policy_vsmart",
                category: "policy_vsmart",
                title: "centralized policy",
                id_field: "policyId",
                name_field: "policyName",
                paths: ApiPaths::Fixed(PathSet::single("template/policy/vsmart")),
                min_version: None,
            },
            CategoryDescriptor {
                tag: "policy_vedge",
                category: "policy_vedge",
                title: "localized policy",
                id_field: "policyId",
                name_field: "policyName",
                paths: ApiPaths::Fixed(PathSet::single("template/policy/vedge")),
                min_version: None,
            },
            CategoryDescriptor {
                tag: "policy_security",
                category: "policy_security",
                title: "security policy",
                id_field: "policyId",
                name_field: "policyName",
                paths: ApiPaths::Fixed(PathSet::single("template/policy/security")),
                min_version: Some("18.2.0"),
            },
            CategoryDescriptor {
                tag: "policy_definition",
                category: "policy_definition",
                title: "policy definition",
                id_field: "definitionId",
                name_field: "name",
                paths: ApiPaths::Fixed(PathSet::single("template/policy/definition/data")),
                min_version: None,
            },
            CategoryDescriptor {
                tag: "policy_list",
                category: "policy_list_prefix",
                title: "prefix list",
                id_field: "listId",
                name_field: "name",
                paths: ApiPaths::Fixed(PathSet::single("template/policy/list/prefix")),
                min_version: None,
            },
            CategoryDescriptor {
                tag: "policy_list",
                category: "policy_list_site",
                title: "site list",
                id_field: "listId",
                name_field: "name",
                paths: ApiPaths::Fixed(PathSet::single("template/policy/list/site")),
                min_version: None,
            },
            CategoryDescriptor {
                tag: "policy_list",
                category: "policy_list_vpn",
                title: "VPN list",
                id_field: "listId",
                name_field: "name",
                paths: ApiPaths::Fixed(PathSet::single("template/policy/list/vpn")),
                min_version: None,
            },
        ];

        Self { descriptors }
    }

    /// All descriptors in dependency order (most-dependent first).
    pub fn descriptors(&self) -> &[CategoryDescriptor] {
        &self.descriptors
    }

    /// Registered tags, deduplicated, in dependency order.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        for descriptor in &self.descriptors {
            if !tags.contains(&descriptor.tag) {
                tags.push(descriptor.tag);
            }
        }
        tags
    }

    /// Returns true if `tag` is the wildcard or a registered tag.
    pub fn is_tag(&self, tag: &str) -> bool {
        tag == WILDCARD_TAG || self.descriptors.iter().any(|d| d.tag == tag)
    }

    /// Descriptors matching a tag filter (wildcard-aware).
    pub fn descriptors_for(&self, tag: &str) -> Vec<&CategoryDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| tag == WILDCARD_TAG || d.tag == tag)
            .collect()
    }

    /// Looks up a descriptor by category name.
    pub fn descriptor(&self, category: &str) -> Option<&CategoryDescriptor> {
        self.descriptors.iter().find(|d| d.category == category)
    }

    /// Enumerates descriptors in dependency order starting at a tag.
    ///
    /// The result is the suffix of the fixed order beginning at the first
    /// descriptor of `start` (the whole order for the wildcard), so it
    /// covers the requested categories plus everything they can depend on.
    /// With `reverse` the suffix is returned leaf-first (creation order).
    pub fn ordered(&self, start: &str, reverse: bool) -> CatalogResult<Vec<&CategoryDescriptor>> {
        if !self.is_tag(start) {
            return Err(CatalogError::UnknownTag(start.to_string()));
        }

        let skip = if start == WILDCARD_TAG {
            0
        } else {
            self.descriptors
                .iter()
                .position(|d| d.tag == start)
                .unwrap_or(0)
        };

        let mut ordered: Vec<&CategoryDescriptor> = self.descriptors[skip..].iter().collect();
        if reverse {
            ordered.reverse();
        }
        Ok(ordered)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_order_is_dependency_order() {
        let catalog = Catalog::builtin();
        let tags = catalog.tags();

        assert_eq!(
            tags,
            vec![
                "template_device",
                "template_feature",
                "policy_vsmart",
                "policy_vedge",
                "policy_security",
                "policy_definition",
                "policy_list",
            ]
        );
    }

    #[test]
    fn tag_can_cover_multiple_categories() {
        let catalog = Catalog::builtin();
        let lists = catalog.descriptors_for("policy_list");

        assert_eq!(lists.len(), 3);
        assert!(lists.iter().all(|d| d.tag == "policy_list"));
    }

    #[test]
    fn wildcard_matches_everything() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.descriptors_for(WILDCARD_TAG).len(),
            catalog.descriptors().len()
        );
    }

    #[test]
    fn ordered_starts_at_requested_tag() {
        let catalog = Catalog::builtin();

        let from_features = catalog.ordered("template_feature", false).unwrap();
        assert_eq!(from_features[0].category, "template_feature");
        // Everything a feature template can depend on follows it.
        assert!(from_features.iter().any(|d| d.tag == "policy_list"));
        // Nothing more dependent is included.
        assert!(from_features.iter().all(|d| d.category != "template_device"));
    }

    #[test]
    fn reversed_order_is_creation_order() {
        let catalog = Catalog::builtin();
        let creation = catalog.ordered(WILDCARD_TAG, true).unwrap();

        assert_eq!(creation.first().unwrap().tag, "policy_list");
        assert_eq!(creation.last().unwrap().category, "template_device");
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.ordered("nonsense", false),
            Err(CatalogError::UnknownTag("nonsense".into()))
        );
    }

    #[test]
    fn descriptor_lookup_by_category() {
        let catalog = Catalog::builtin();
        let descriptor = catalog.descriptor("policy_list_site").unwrap();
        assert_eq!(descriptor.title, "site list");
        assert!(catalog.descriptor("missing").is_none());
    }
}
