use super::*;
use crate::{
    expr::Expr,
    vault::{Protected, VaultKey},
};
use serde_json::{Value as JsonValue, json};

#[test]
fn like_and_function_call_filter_records() {
    let records = vec![
        json!({"foo": 1, "a": 1}),
        json!({"bar": 2, "a": 2}),
        json!({"foo": "Barsa", "a": 3}),
        json!({"foo": "bar", "a": 4}),
    ];

    for strict_filter in [false, true] {
        let predicate = compile_with(
            r#"foo like "bar" and today()"#,
            &TranspileOptions::new().strict_filter(strict_filter),
        );

        assert_eq!(picked(&predicate, &records), vec![3, 4]);
    }
}

#[test]
fn quoted_literals_and_fragments_share_one_vault() {
    let mut compiler = compiler();

    compiler
        .transpile(r#"foo like "bar""#, &TranspileOptions::default())
        .expect("compiles");

    let vault = compiler.vault();
    assert_eq!(vault.len(), 3);
    assert_eq!(
        vault.get(VaultKey::new(1).unquoted()),
        Some(&Protected::Text("bar".to_string()))
    );
    assert_eq!(
        vault.get(VaultKey::new(1)),
        Some(&Protected::Text("\"bar\"".to_string()))
    );
    assert!(matches!(
        vault.get(VaultKey::new(3)),
        Some(Protected::Fragment(Expr::Pattern(_)))
    ));
}

#[test]
fn vault_is_reset_between_compiles() {
    let mut compiler = compiler();

    compiler
        .transpile("a in (1, 2) and b is null", &TranspileOptions::default())
        .expect("compiles");
    let first = compiler.vault().len();
    compiler
        .transpile("a in (1, 2) and b is null", &TranspileOptions::default())
        .expect("compiles");

    assert_eq!(compiler.vault().len(), first);
}

#[test]
fn grammar_output_is_not_rematched() {
    // `a is null` becomes a vault key; the trailing `is null` stays residual
    let err = compiler()
        .transpile("a is null is null", &TranspileOptions::default())
        .expect_err("single pass leaves residual words");

    assert!(matches!(err, QueryError::Syntax(_)), "unexpected error: {err:?}");
}

#[test]
fn longer_templates_win_over_shorter_overlaps() {
    let predicate = compile("status not in (open, closed)");

    assert!(predicate.matches(&json!({"status": "pending"})).expect("evaluates"));
    assert!(!predicate.matches(&json!({"status": "open"})).expect("evaluates"));
}

#[test]
fn residual_tokens_are_guarded() {
    let predicate = compile("count > 2 && flag");

    assert!(predicate.matches(&json!({"count": 3, "flag": true})).expect("evaluates"));
    assert!(!predicate.matches(&json!({"count": 3, "flag": 0})).expect("evaluates"));
    // a missing field reads as its own name, so `flag` alone is truthy
    assert!(predicate.matches(&json!({"count": 3})).expect("evaluates"));
    assert!(!predicate.matches(&json!({"flag": true})).expect("evaluates"));
}

#[test]
fn nested_fields_use_optional_chains() {
    let predicate = compile("user.address.city = Paris");

    assert!(predicate.matches(&json!({"user": {"address": {"city": "paris"}}})).is_ok());
    assert!(
        predicate
            .matches(&json!({"user": {"address": {"city": "Paris"}}}))
            .expect("evaluates")
    );
    assert!(!predicate.matches(&json!({"user": {}})).expect("evaluates"));
    assert!(!predicate.matches(&json!({"user": null})).expect("evaluates"));
}

#[test]
fn has_rules_iterate_arrays() {
    let has = compile("tags has red");
    assert!(has.matches(&json!({"tags": ["blue", "red"]})).expect("evaluates"));
    assert!(!has.matches(&json!({"tags": "red"})).expect("evaluates"));

    let nested = compile("items.name has 'lamp'");
    assert!(
        nested
            .matches(&json!({"items": [{"name": "desk"}, {"name": "lamp"}]}))
            .expect("evaluates")
    );

    let all = compile("tags has all of (a, b)");
    assert!(all.matches(&json!({"tags": ["b", "c", "a"]})).expect("evaluates"));
    assert!(!all.matches(&json!({"tags": ["a"]})).expect("evaluates"));
}

#[test]
fn pattern_rules_anchor_and_escape_nothing() {
    let starts = compile("name starts with jo");
    assert!(starts.matches(&json!({"name": "John"})).expect("evaluates"));
    assert!(!starts.matches(&json!({"name": "Bojo"})).expect("evaluates"));

    let ends = compile("name not ends with 'son'");
    assert!(!ends.matches(&json!({"name": "Jackson"})).expect("evaluates"));
    assert!(ends.matches(&json!({"name": "Jack"})).expect("evaluates"));

    let regex = compile("code ~ '^a.c$'");
    assert!(regex.matches(&json!({"code": "abc"})).expect("evaluates"));
}

#[test]
fn empty_and_null_checks() {
    let empty = compile("note is empty or note is null");

    assert!(empty.matches(&json!({"note": ""})).expect("evaluates"));
    assert!(empty.matches(&json!({"note": null})).expect("evaluates"));
    assert!(!empty.matches(&json!({"note": "x"})).expect("evaluates"));
}

#[test]
fn strict_equality_setting_applies_to_rules_and_residual() {
    let settings = Settings {
        strict_equality: true,
        ..Settings::default()
    };
    let mut compiler = Compiler::new(settings, None).expect("compiler builds");
    let predicate = compiler
        .transpile("a = 1", &TranspileOptions::default())
        .expect("compiles")
        .into_predicate();

    assert!(!predicate.matches(&json!({"a": "1"})).expect("evaluates"));
    assert!(predicate.matches(&json!({"a": 1})).expect("evaluates"));
    assert!(compile("a = 1").matches(&json!({"a": "1"})).expect("evaluates"));
}

#[test]
fn case_sensitivity_follows_settings() {
    let record = json!({"name": "Bob"});
    assert!(compile("name like bob").matches(&record).expect("evaluates"));

    let mut compiler = compiler();
    compiler
        .update_settings(Settings {
            case_sensitive: true,
            ..Settings::default()
        })
        .expect("recompiles");
    let predicate = compiler
        .transpile("name like bob", &TranspileOptions::default())
        .expect("compiles")
        .into_predicate();

    assert!(!predicate.matches(&record).expect("evaluates"));
    assert!(compiler.settings().case_sensitive);
}

#[test]
fn options_override_settings_per_call() {
    let mut compiler = compiler();

    let short = compiler
        .transpile("a", &TranspileOptions::new().filter_only(true))
        .expect("compiles");
    assert!(short.is_short());

    let full = compiler
        .transpile("a", &TranspileOptions::new().strict_filter(false))
        .expect("compiles");
    assert!(!full.is_short());
    assert_eq!(full.predicate().mode(), PredicateMode::Generic);

    let Transpiled::Full(result) = full else {
        panic!("expected the full result shape");
    };
    assert!(result.error.is_none());
    assert!(result.sorter.is_none());
    assert!(result.query.is_none());
    assert_eq!(result.meta, SuggestionMeta::default());

    let nested = compiler
        .transpile("x = 1", &TranspileOptions::new().node_name("row.data"))
        .expect("compiles");
    assert!(
        nested
            .predicate()
            .matches(&json!({"data": {"x": 1}}))
            .expect("evaluates")
    );
}

#[test]
fn long_or_chains_compile_and_evaluate() {
    let query = format!("foo = 2{} or foo = 1", " or foo = 2".repeat(9_999));

    for strict_filter in [false, true] {
        let predicate = compile_with(&query, &TranspileOptions::new().strict_filter(strict_filter));

        assert_eq!(predicate.test(&json!({"foo": 1})), Ok(Some(true)));
        assert_eq!(predicate.test(&json!({"foo": 3})), Ok(Some(false)));
    }
}

#[test]
fn unicode_field_names_are_guarded() {
    for strict_filter in [false, true] {
        let options = TranspileOptions::new().strict_filter(strict_filter);

        let eq = compile_with("éclair = 1", &options);
        assert_eq!(eq.test(&json!({"x": 1})), Ok(Some(false)));
        assert_eq!(eq.test(&json!({"éclair": 1})), Ok(Some(true)));

        let listed = compile_with("éclair in (1, 2)", &options);
        assert_eq!(listed.test(&json!({"éclair": 2})), Ok(Some(true)));
        assert_eq!(listed.test(&json!({"x": 2})), Ok(Some(false)));

        let nested = compile_with("größe.wert > 3", &options);
        assert_eq!(nested.test(&json!({"größe": {"wert": 4}})), Ok(Some(true)));
        assert_eq!(nested.test(&json!({})), Ok(Some(false)));
    }
}

#[test]
fn member_steps_on_quoted_literals_read_properties() {
    let missing = compile(r#""my f".x = 1"#);
    assert_eq!(missing.test(&json!({"x": 1})), Ok(Some(false)));

    let length = compile("'abc'.length = 3");
    assert_eq!(length.test(&json!({})), Ok(Some(true)));
}

//
// clauses and errors
//

#[test]
fn order_clause_is_parsed_and_returned() {
    let result = compiler()
        .transpile(
            "a > 1 ORDER BY name desc, 'first name', age ASC",
            &TranspileOptions::default(),
        )
        .expect("compiles");

    let order = result.order().expect("order clause");
    assert_eq!(order.to_string(), "name desc, 'first name' asc, age asc");
    assert_eq!(order.items[0].direction, OrderDirection::Desc);
}

#[test]
fn order_only_query_matches_everything() {
    let result = compiler()
        .transpile("order by name", &TranspileOptions::default())
        .expect("compiles");

    assert!(result.predicate().matches(&json!({})).expect("evaluates"));
    assert!(result.order().is_some());
}

#[test]
fn empty_order_clause_is_ignored() {
    let result = compiler()
        .transpile("a order by", &TranspileOptions::default())
        .expect("compiles");

    assert!(result.order().is_none());
}

#[test]
fn compile_errors_are_typed() {
    let cases = [
        (r#"foo = "bar"#, QueryError::Quotation),
        ("a order by b order by c", QueryError::Ordering),
        ("a order by b sideways", QueryError::Ordering),
        ("a order by b c d", QueryError::Ordering),
        ("a order by 1b", QueryError::Ordering),
        ("", QueryError::EmptyQuery),
        ("   ", QueryError::EmptyQuery),
    ];

    for (query, expected) in cases {
        let err = compiler()
            .transpile(query, &TranspileOptions::default())
            .expect_err(query);
        assert_eq!(err, expected, "query `{query}`");
        assert!(err.is_compile_time());
    }
}

#[test]
fn syntax_errors_quote_the_restored_expression() {
    let err = compiler()
        .transpile("(a > 'x'", &TranspileOptions::default())
        .expect_err("unbalanced parenthesis");

    let QueryError::Syntax(message) = err else {
        panic!("expected a syntax error, got {err:?}");
    };
    assert!(message.contains("'x'"), "message: {message}");
}

#[test]
fn deep_nesting_is_a_syntax_error() {
    let query = format!("{}foo = 1{}", "(".repeat(2_000), ")".repeat(2_000));

    let err = compiler()
        .transpile(&query, &TranspileOptions::default())
        .expect_err("nesting cap");

    assert!(matches!(err, QueryError::Syntax(_)), "unexpected error: {err:?}");
}

#[test]
fn reserved_code_points_are_rejected() {
    let err = compiler()
        .transpile("a = \u{E000}1", &TranspileOptions::default())
        .expect_err("reserved input");

    assert!(matches!(err, QueryError::Syntax(_)));
}

#[test]
fn split_clauses_requires_a_word_boundary() {
    assert_eq!(split_clauses("border by x"), Ok(("border by x", None)));
    assert_eq!(split_clauses("a order   by b"), Ok(("a", Some("b"))));
}

// ---- helpers ----

fn compiler() -> Compiler {
    Compiler::new(Settings::default(), None).expect("compiler builds")
}

fn compile(query: &str) -> FilterPredicate {
    compile_with(query, &TranspileOptions::default())
}

fn compile_with(query: &str, options: &TranspileOptions) -> FilterPredicate {
    compiler()
        .transpile(query, options)
        .unwrap_or_else(|err| panic!("`{query}` failed: {err}"))
        .into_predicate()
}

fn picked(predicate: &FilterPredicate, records: &[JsonValue]) -> Vec<i64> {
    predicate
        .filter(records)
        .expect("evaluates")
        .into_iter()
        .filter_map(|record| record["a"].as_i64())
        .collect()
}
