//! Scoped variable store and the `${name}` / `<name>` / `[name]` substitution
//! grammar used to render block properties and, for interpreters that opt in,
//! block content before it reaches an interpreter.

mod error;
mod render;
mod store;
mod tag;

pub use error::TemplateError;
pub use render::{render, BlockInfo};
pub use store::{PropertyBag, Scope, VariableStore};
pub use tag::TagStyle;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_unresolved_left_unchanged() {
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let out = render("x=${missing}", &store, &bag, TagStyle::Brace, None).unwrap();
        assert_eq!(out, "x=${missing}");
    }

    #[test]
    fn defaulted_unresolved_uses_fallback() {
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let out = render("x=${missing:42}", &store, &bag, TagStyle::Brace, None).unwrap();
        assert_eq!(out, "x=42");
    }

    #[test]
    fn query_scope_shadows_global() {
        let store = VariableStore::new();
        store.set(Scope::Global, "name", "global-val");
        store.set(Scope::Query, "name", "query-val");
        let bag = PropertyBag::new();
        let out = render("${name}", &store, &bag, TagStyle::Brace, None).unwrap();
        assert_eq!(out, "query-val");
    }

    #[test]
    fn property_bag_used_when_no_scope_defines() {
        let store = VariableStore::new();
        let mut bag = PropertyBag::new();
        bag.insert("host".into(), "localhost".into());
        let out = render("${host}", &store, &bag, TagStyle::Brace, None).unwrap();
        assert_eq!(out, "localhost");
    }

    #[test]
    fn angle_and_square_styles_are_equivalent() {
        let store = VariableStore::new();
        store.set(Scope::Query, "x", "1");
        let bag = PropertyBag::new();
        assert_eq!(
            render("<x>", &store, &bag, TagStyle::Angle, None).unwrap(),
            "1"
        );
        assert_eq!(
            render("[x]", &store, &bag, TagStyle::Square, None).unwrap(),
            "1"
        );
    }

    #[test]
    fn pseudo_variable_resolves_block_name_and_props() {
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let mut props = PropertyBag::new();
        props.insert("id".into(), "x1".into());
        let block = BlockInfo {
            extension_name: "shell",
            properties: &props,
        };
        let out = render("${_} ${_.id}", &store, &bag, TagStyle::Brace, Some(&block)).unwrap();
        assert_eq!(out, "shell x1");
    }

    #[test]
    fn unrelated_delimiter_family_not_consumed() {
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        // Active style is Angle, so "${name}" (brace family) must be left alone.
        store.set(Scope::Query, "name", "ignored");
        let out = render("${name}<name>", &store, &bag, TagStyle::Angle, None).unwrap();
        assert_eq!(out, "${name}ignored");
    }

    #[test]
    fn thread_scope_fork_is_isolated() {
        let store = VariableStore::new();
        store.set(Scope::Thread, "t", "parent");
        let forked = store.fork_thread_scope();
        forked.set(Scope::Thread, "t", "child");
        assert_eq!(store.get("t", &PropertyBag::new()), Some("parent".into()));
        assert_eq!(
            forked.get("t", &PropertyBag::new()),
            Some("child".into())
        );
    }
}
