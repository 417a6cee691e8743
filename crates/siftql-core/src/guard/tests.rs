use super::*;
use crate::{
    expr::{CompareOp, IterMode},
    vault::Vault,
};

#[test]
fn safe_tokens_are_recognized() {
    for token in ["null", "true", "false", "undefined", "42", "-1.5", "0x1f", "'a'", "\"b\""] {
        assert!(is_safe(token), "{token} should be safe");
    }
    for token in ["foo", "item.bar", "'a", "NaN", ""] {
        assert!(!is_safe(token), "{token} should not be safe");
    }
}

#[test]
fn vault_keys_are_safe() {
    let mut vault = Vault::new();
    let key = vault.save("'x'", Some("x".to_string()));

    assert!(is_safe(&key.to_string()));
    assert_eq!(quote(&key.to_string()), Expr::Protected(key));
    assert_eq!(unquote(&key.to_string()), Expr::Protected(key.unquoted()));
}

#[test]
fn quote_wraps_only_unsafe_text() {
    assert_eq!(quote("foo").to_string(), "'foo'");
    assert_eq!(quote("42").to_string(), "42");
    assert_eq!(quote("null").to_string(), "null");
    assert_eq!(quote("it's").to_string(), r"'it\'s'");
}

#[test]
fn safe_variable_defaults_to_its_own_text() {
    assert_eq!(
        safe_variable("foo.bar").to_string(),
        "(typeof foo?.['bar'] === 'undefined' ? 'foo.bar' : foo?.['bar'])"
    );
    assert_eq!(safe_variable(" 7 ").to_string(), "7");
}

#[test]
fn common_guard_defaults_only_the_head() {
    assert_eq!(
        common_guard("item.foo").to_string(),
        "(typeof item === 'undefined' ? 'item' : item)?.['foo']"
    );
    assert_eq!(
        common_guard("a[0]['b']").to_string(),
        "(typeof a === 'undefined' ? 'a' : a)?.['0']?.['b']"
    );
    assert_eq!(common_guard("3").to_string(), "3");
}

#[test]
fn headless_guard_keeps_head_identifier() {
    assert_eq!(headless_common_guard("item.foo").to_string(), "item?.['foo']");
    assert_eq!(headless_common_guard("node"), Expr::ident("node"));
}

#[test]
fn safe_array_name_uses_chain_head() {
    assert_eq!(
        safe_array_name("items.name").to_string(),
        "(items instanceof Array ? items : [])"
    );
}

#[test]
fn safe_list_guards_every_item() {
    assert_eq!(
        safe_list("1 ,foo,  null").to_string(),
        "[1, (typeof foo === 'undefined' ? 'foo' : foo), null]"
    );
}

#[test]
fn raw_leaves_identifiers_unguarded() {
    assert_eq!(raw("true"), Expr::boolean(true));
    assert_eq!(
        raw("a.b"),
        Expr::member(Expr::ident("a"), vec!["b".to_string()])
    );
}

#[test]
fn split_and_join_chain() {
    assert_eq!(split_chain(r#"a.b[0]["c"]"#), vec!["a", "b", "0", "c"]);
    assert_eq!(join_chain(&["a", "b", "c"], false), "a?.['b']?.['c']");
    assert_eq!(join_chain(&["x || y", "b"], true), "(x || y)?.['b']");
    assert!(split_chain("..").is_empty());
}

#[test]
fn tie_lexeme_points_binder_at_chain_tail() {
    let guard = tie_lexeme("key", "item");
    let fragment = Expr::iterate(
        IterMode::Some,
        safe_array_name("items.name"),
        "item",
        Expr::compare(CompareOp::Eq, Expr::local("item"), Expr::number(3.0)),
    );
    let values = LexemeValues::from([("key".to_string(), "items.name".to_string())]);

    let tied = guard(fragment, &values);

    assert_eq!(
        tied.to_string(),
        "(items instanceof Array ? items : []).some(item => item?.['name'] == 3)"
    );
}

#[test]
fn tie_lexeme_never_touches_binder_declarations() {
    let guard = tie_lexeme("key", "item");
    let fragment = Expr::iterate(
        IterMode::Some,
        Expr::ident("item"),
        "item",
        Expr::local("item"),
    );
    let values = LexemeValues::from([("key".to_string(), "item.item".to_string())]);

    let Expr::Iterate { over, binder, body, .. } = guard(fragment, &values) else {
        panic!("fragment shape changed");
    };

    assert_eq!(binder, "item");
    assert_eq!(*over, Expr::ident("item"));
    assert_eq!(
        *body,
        Expr::member(Expr::local("item"), vec!["item".to_string()])
    );
}

#[test]
fn tie_lexeme_without_tail_is_identity() {
    let guard = tie_lexeme("key", "item");
    let fragment = Expr::local("item");
    let values = LexemeValues::from([("key".to_string(), "items".to_string())]);

    assert_eq!(guard(fragment.clone(), &values), fragment);
}
