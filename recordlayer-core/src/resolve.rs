//! Collection name resolution.
//!
//! An explicit override is used verbatim. Otherwise the simple type name (module path and
//! generic arguments stripped) is tableized: `app::model::TestEntityThree` resolves to
//! `test_entity_threes`.

use recordlayer_inflect::tableize;

/// Strips module paths and generic arguments from a Rust type name.
pub fn simple_type_name(type_name: &str) -> &str {
    let without_generics = match type_name.find('<') {
        Some(index) => &type_name[..index],
        None => type_name,
    };

    match without_generics.rfind("::") {
        Some(index) => &without_generics[index + 2..],
        None => without_generics,
    }
}

/// Resolves the collection a record type's documents live in.
pub fn resolve_collection_name(type_name: &str, collection_override: Option<&str>) -> String {
    match collection_override {
        Some(name) => name.to_string(),
        None => tableize(simple_type_name(type_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_is_used_verbatim() {
        assert_eq!(resolve_collection_name("User", Some("Accounts")), "Accounts");
    }

    #[test]
    fn derives_from_simple_type_name() {
        assert_eq!(resolve_collection_name("TestEntityThree", None), "test_entity_threes");
        assert_eq!(
            resolve_collection_name("crate::models::TestEntityThree", None),
            "test_entity_threes"
        );
        assert_eq!(resolve_collection_name("Person", None), "people");
    }

    #[test]
    fn strips_generic_arguments() {
        assert_eq!(simple_type_name("a::Wrapper<b::Inner>"), "Wrapper");
        assert_eq!(simple_type_name("Plain"), "Plain");
    }
}
