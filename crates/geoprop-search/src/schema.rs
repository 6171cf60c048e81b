//! Index settings for property documents.

use serde::Serialize;

pub const PRIMARY_KEY: &str = "id";

pub const SEARCHABLE_ATTRIBUTES: [&str; 7] = [
    "title",
    "description",
    "city",
    "country",
    "region",
    "street",
    "postalCode",
];

/// `_geo` enables the radius and bounding-box predicates.
pub const FILTERABLE_ATTRIBUTES: [&str; 8] = [
    "status", "type", "country", "city", "region", "currency", "ownerId", "_geo",
];

pub const SORTABLE_ATTRIBUTES: [&str; 4] = ["price", "createdAt", "updatedAt", "publishedAt"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    pub searchable_attributes: Vec<String>,
    pub filterable_attributes: Vec<String>,
    pub sortable_attributes: Vec<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        let owned = |fields: &[&str]| fields.iter().map(|f| (*f).to_string()).collect();
        Self {
            searchable_attributes: owned(&SEARCHABLE_ATTRIBUTES),
            filterable_attributes: owned(&FILTERABLE_ATTRIBUTES),
            sortable_attributes: owned(&SORTABLE_ATTRIBUTES),
        }
    }
}

impl IndexSettings {
    #[must_use]
    pub fn is_sortable(&self, attribute: &str) -> bool {
        self.sortable_attributes.iter().any(|a| a == attribute)
    }
}

#[cfg(test)]
mod tests {
    use geoprop_core::SortField;

    use super::*;

    #[test]
    fn every_sort_field_is_sortable() {
        let settings = IndexSettings::default();
        for field in SortField::ALL {
            assert!(settings.is_sortable(field.attribute()), "{field:?}");
        }
    }

    #[test]
    fn settings_serialize_with_index_attribute_names() {
        let json = serde_json::to_value(IndexSettings::default()).unwrap();
        assert_eq!(json["searchableAttributes"][6], "postalCode");
        assert_eq!(json["filterableAttributes"][7], "_geo");
        assert_eq!(json["sortableAttributes"][0], "price");
    }
}
