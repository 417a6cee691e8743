use super::*;
use crate::{
    error::FunctionError,
    expr::{Anchor, CompareOp, IterMode, LogicalOp},
    guard,
    value::TextMode,
    vault::VaultKey,
};
use proptest::prelude::*;
use serde_json::json;

#[test]
fn modes_agree_on_heterogeneous_records() {
    let expr = Expr::logical(
        LogicalOp::Or,
        Expr::compare(CompareOp::Eq, guard::common_guard("foo"), Expr::number(42.0)),
        Expr::compare(CompareOp::Gt, guard::common_guard("size.w"), Expr::number(10.0)),
    );
    let records = vec![
        json!({"foo": 42}),
        json!({"foo": "42", "bar": 1}),
        json!({"size": {"w": 11}}),
        json!({"size": {"h": 11}}),
        json!({"size": null, "foo": null}),
        json!({}),
        json!([1, 2]),
        json!("foo"),
    ];

    let generic = predicate(expr.clone(), PredicateMode::Generic);
    let cached = predicate(expr, PredicateMode::ShapeCached);

    let expected = vec![
        json!({"foo": 42}),
        json!({"foo": "42", "bar": 1}),
        json!({"size": {"w": 11}}),
    ];
    assert_eq!(owned(generic.filter(&records)), expected);
    assert_eq!(owned(cached.filter(&records)), expected);
}

#[test]
fn shape_cache_compiles_once_per_field_set() {
    let predicate = predicate(guard::common_guard("a"), PredicateMode::ShapeCached);

    for record in [
        json!({"a": 1, "b": 2}),
        json!({"b": 5, "a": 0}),
        json!({"a": 1}),
        json!({"a": 1, "b": 2}),
    ] {
        predicate.test(&record).expect("evaluates");
    }

    assert_eq!(predicate.cached_shapes(), 2);
}

#[test]
fn generic_mode_never_caches() {
    let predicate = predicate(guard::common_guard("a"), PredicateMode::Generic);

    predicate.test(&json!({"a": 1})).expect("evaluates");

    assert_eq!(predicate.cached_shapes(), 0);
}

#[test]
fn non_records_yield_undefined() {
    let predicate = predicate(Expr::boolean(true), PredicateMode::ShapeCached);

    assert_eq!(predicate.test(&json!(null)), Ok(None));
    assert_eq!(predicate.test(&json!([{}])), Ok(None));
    assert_eq!(predicate.test(&json!({})), Ok(Some(true)));
    assert_eq!(predicate.matches(&json!(7)), Ok(false));
}

#[test]
fn node_path_reaches_nested_records() {
    let node = NodePath::parse("item.a[0].c").expect("valid node name");

    assert_eq!(node.head(), "item");
    assert_eq!(node.tail(), ["a", "0", "c"]);

    let argument = json!({"a": [{"c": {"foo": 42}}]});
    assert_eq!(node.resolve(&argument), argument["a"][0]["c"].as_object());
    assert_eq!(node.resolve(&json!({"a": []})), None);
    assert_eq!(node.resolve(&json!({"a": [{"c": 5}]})), None);

    assert!(matches!(NodePath::parse(""), Err(QueryError::Syntax(_))));
}

#[test]
fn root_name_reads_the_whole_argument() {
    let expr = Expr::member(Expr::ident("row"), vec!["flag".to_string()]);

    for mode in [PredicateMode::Generic, PredicateMode::ShapeCached] {
        let predicate =
            FilterPredicate::new(expr.clone(), "row.data", FunctionTable::new(), mode).expect("builds");
        assert_eq!(
            predicate.test(&json!({"flag": true, "data": {}})),
            Ok(Some(true)),
            "{mode:?}"
        );
        assert_eq!(
            predicate.test(&json!({"flag": 0, "data": {}})),
            Ok(Some(false)),
            "{mode:?}"
        );
    }
}

#[test]
fn unguarded_names_fail_at_runtime() {
    for mode in [PredicateMode::Generic, PredicateMode::ShapeCached] {
        let predicate = predicate(Expr::ident("missing"), mode);

        assert_eq!(
            predicate.test(&json!({"present": 1})),
            Err(QueryError::Runtime("`missing` is not defined".to_string()))
        );
        assert_eq!(predicate.test(&json!({"missing": 1})), Ok(Some(true)));
    }
}

#[test]
fn filter_stops_at_the_first_runtime_error() {
    let predicate = predicate(
        Expr::includes(Expr::ident("tags"), Expr::text("x")),
        PredicateMode::Generic,
    );
    let records = [json!({"tags": ["x"]}), json!({"tags": "x"})];

    let err = predicate.filter(&records).expect_err("second record fails");

    assert_eq!(err.kind(), crate::error::ErrorKind::Runtime);
}

#[test]
fn functions_are_called_with_json_arguments() {
    let mut functions = FunctionTable::new();
    functions.insert("len", |args: &[JsonValue]| {
        Ok(json!(args.first().and_then(JsonValue::as_str).map_or(0, str::len)))
    });
    functions.insert("fail", |_args: &[JsonValue]| Err(FunctionError::new("boom")));

    let expr = Expr::compare(
        CompareOp::Eq,
        Expr::call("len", vec![guard::common_guard("name")]),
        Expr::number(3.0),
    );
    let predicate =
        FilterPredicate::new(expr, "node", functions.clone(), PredicateMode::ShapeCached)
            .expect("builds");
    assert_eq!(predicate.test(&json!({"name": "abc"})), Ok(Some(true)));
    assert_eq!(predicate.test(&json!({"name": "ab"})), Ok(Some(false)));

    let failing = FilterPredicate::new(
        Expr::call("fail", Vec::new()),
        "node",
        functions,
        PredicateMode::Generic,
    )
    .expect("builds");
    assert!(matches!(failing.test(&json!({})), Err(QueryError::Runtime(message)) if message.contains("boom")));

    let unknown = predicate_with(Expr::call("nope", Vec::new()), PredicateMode::Generic);
    assert!(matches!(unknown.test(&json!({})), Err(QueryError::Runtime(_))));
}

#[test]
fn iteration_binds_and_short_circuits() {
    let expr = Expr::iterate(
        IterMode::Every,
        Expr::ArrayOr(Box::new(Expr::ident("scores"))),
        "score",
        Expr::compare(CompareOp::Gte, Expr::local("score"), Expr::number(5.0)),
    );
    let predicate = predicate(expr, PredicateMode::ShapeCached);

    assert_eq!(predicate.test(&json!({"scores": [5, 9]})), Ok(Some(true)));
    assert_eq!(predicate.test(&json!({"scores": [5, 1]})), Ok(Some(false)));
    // every over an empty array holds
    assert_eq!(predicate.test(&json!({"scores": "n/a"})), Ok(Some(true)));

    let over_text = predicate_with(
        Expr::iterate(IterMode::Some, Expr::ident("s"), "c", Expr::boolean(true)),
        PredicateMode::Generic,
    );
    assert!(matches!(over_text.test(&json!({"s": "abc"})), Err(QueryError::Runtime(_))));
}

#[test]
fn literal_patterns_compile_up_front() {
    let mut expr = Expr::pattern(Expr::ident("name"), Expr::text("^a(b"), Anchor::None);
    assert!(matches!(
        FilterPredicate::new(expr.clone(), "node", FunctionTable::new(), PredicateMode::Generic),
        Err(QueryError::Syntax(_))
    ));

    if let Expr::Pattern(test) = &mut expr {
        test.pattern = Box::new(Expr::text("A.C"));
        test.mode = TextMode::Ci;
    }
    let predicate = predicate(expr, PredicateMode::Generic);
    let Expr::Pattern(test) = predicate.expr() else {
        panic!("pattern expected");
    };
    assert!(test.compiled.is_some());
    assert_eq!(predicate.test(&json!({"name": "xabcx"})), Ok(Some(true)));
}

#[test]
fn dynamic_patterns_compile_per_record() {
    let expr = Expr::pattern(Expr::ident("name"), Expr::ident("pattern"), Anchor::Start);
    let predicate = predicate(expr, PredicateMode::Generic);

    assert_eq!(
        predicate.test(&json!({"name": "abc", "pattern": "ab"})),
        Ok(Some(true))
    );
    assert_eq!(
        predicate.test(&json!({"name": "cab", "pattern": "ab"})),
        Ok(Some(false))
    );
    assert!(matches!(
        predicate.test(&json!({"name": "x", "pattern": "("})),
        Err(QueryError::Runtime(_))
    ));
}

#[test]
fn unresolved_placeholders_are_rejected() {
    for expr in [
        Expr::lexeme("key"),
        Expr::negate(Expr::Protected(VaultKey::new(3))),
    ] {
        assert!(matches!(
            FilterPredicate::new(expr, "node", FunctionTable::new(), PredicateMode::Generic),
            Err(QueryError::Syntax(_))
        ));
    }
}

#[test]
fn source_renders_the_expression() {
    let predicate = predicate(
        Expr::compare(CompareOp::Ne, guard::common_guard("a.b"), Expr::null()),
        PredicateMode::Generic,
    );

    assert_eq!(
        predicate.source(),
        "(typeof a === 'undefined' ? 'a' : a)?.['b'] != null"
    );
}

proptest! {
    #[test]
    fn modes_agree_on_flat_records(a in -5i64..5, b in proptest::option::of(-5i64..5), threshold in -5i32..5) {
        let threshold = f64::from(threshold);
        let expr = Expr::logical(
            LogicalOp::And,
            Expr::compare(CompareOp::Gte, guard::common_guard("a"), Expr::number(threshold)),
            Expr::negate(Expr::compare(CompareOp::Eq, guard::common_guard("b"), Expr::null())),
        );
        let record = match b {
            Some(b) => json!({"a": a, "b": b}),
            None => json!({"a": a, "b": null}),
        };

        let generic = predicate(expr.clone(), PredicateMode::Generic);
        let cached = predicate(expr, PredicateMode::ShapeCached);

        prop_assert_eq!(generic.test(&record), cached.test(&record));
    }
}

// ---- helpers ----

fn predicate(expr: Expr, mode: PredicateMode) -> FilterPredicate {
    FilterPredicate::new(expr, "node", FunctionTable::builtin(), mode).expect("predicate builds")
}

fn predicate_with(expr: Expr, mode: PredicateMode) -> FilterPredicate {
    FilterPredicate::new(expr, "node", FunctionTable::new(), mode).expect("predicate builds")
}

fn owned(result: Result<Vec<&JsonValue>, QueryError>) -> Vec<JsonValue> {
    result
        .expect("evaluates")
        .into_iter()
        .cloned()
        .collect()
}
