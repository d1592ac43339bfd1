//! Static category catalog.
//!
//! Expenses reference categories by name only. Names missing from the catalog
//! are tolerated and get a fallback definition.

use serde::Serialize;

pub const UNKNOWN_CATEGORY: &str = "unknown";

const FALLBACK_ICON: &str = "mdi-help-circle";

/// Display metadata of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryDef {
    pub name: String,
    pub icon: String,
    /// Rarely used; pickers list it after the common ones.
    pub infrequent: bool,
    /// Excluded from budget aggregations.
    pub exceptional: bool,
}

struct StaticDef {
    name: &'static str,
    icon: &'static str,
    infrequent: bool,
    exceptional: bool,
}

const fn def(name: &'static str, icon: &'static str) -> StaticDef {
    StaticDef {
        name,
        icon,
        infrequent: false,
        exceptional: false,
    }
}

const fn rare(name: &'static str, icon: &'static str) -> StaticDef {
    StaticDef {
        name,
        icon,
        infrequent: true,
        exceptional: false,
    }
}

const fn exceptional(name: &'static str, icon: &'static str) -> StaticDef {
    StaticDef {
        name,
        icon,
        infrequent: true,
        exceptional: true,
    }
}

const CATALOG: &[StaticDef] = &[
    def("food", "mdi-cart"),
    def("restaurant", "mdi-silverware-fork-knife"),
    def("rent", "mdi-home"),
    def("transport", "mdi-train-car"),
    def("fun", "mdi-party-popper"),
    def("shopping", "mdi-shopping"),
    def("health", "mdi-medical-bag"),
    def("subscriptions", "mdi-repeat"),
    def("bills", "mdi-file-document"),
    def("salary", "mdi-cash-multiple"),
    rare("gifts", "mdi-gift"),
    rare("travel", "mdi-airplane"),
    rare("taxes", "mdi-bank"),
    rare("insurance", "mdi-shield-check"),
    exceptional("exceptional", "mdi-star-shooting"),
    exceptional("savings", "mdi-piggy-bank"),
];

impl From<&StaticDef> for CategoryDef {
    fn from(value: &StaticDef) -> Self {
        Self {
            name: value.name.to_string(),
            icon: value.icon.to_string(),
            infrequent: value.infrequent,
            exceptional: value.exceptional,
        }
    }
}

/// Every catalog entry, in display order.
pub fn category_defs() -> Vec<CategoryDef> {
    CATALOG.iter().map(CategoryDef::from).collect()
}

/// Looks up `name`, falling back to a generic definition for unknown names.
pub fn category_def(name: &str) -> CategoryDef {
    CATALOG
        .iter()
        .find(|def| def.name == name)
        .map(CategoryDef::from)
        .unwrap_or_else(|| CategoryDef {
            name: name.to_string(),
            icon: FALLBACK_ICON.to_string(),
            infrequent: false,
            exceptional: false,
        })
}

pub fn is_exceptional(name: &str) -> bool {
    CATALOG
        .iter()
        .any(|def| def.name == name && def.exceptional)
}
