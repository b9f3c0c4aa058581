//! End-to-end tests: raw query strings through parse, compile and plan
//! assembly, evaluated against an in-memory book collection.

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use rql::cache::RequestMethod;
use rql::compile::{compile, Lookup, Predicate, Value};
use rql::plan::{BaseQuery, QueryPlan};
use rql::projection::{AppliedDirective, Optimization};
use rql::query::parse_query;
use rql::schema::{Catalog, Declaration, FieldMeta, FilterLookup, FilterSchema, Model};
use rql::service::QueryService;
use rql::RqlError;
use serde_json::{json, Value as Json};

fn schema() -> FilterSchema {
    let catalog = Catalog::new()
        .with_model(
            Model::new("book")
                .field("id", FieldMeta::int().primary_key())
                .field("title", FieldMeta::string())
                .field("subtitle", FieldMeta::string().nullable())
                .field("pages", FieldMeta::int())
                .field("published", FieldMeta::date())
                .relation("author", "author")
                .relation_many("tags", "tag"),
        )
        .with_model(
            Model::new("author")
                .field("name", FieldMeta::string())
                .field("email", FieldMeta::string().nullable()),
        )
        .with_model(
            Model::new("tag")
                .field("name", FieldMeta::string())
                .field("kind", FieldMeta::string()),
        );

    FilterSchema::builder("books", &catalog, "book")
        .declare("id")
        .declare(Declaration::filter("title").ordering().search())
        .declare("subtitle")
        .declare(Declaration::filter("pages").ordering())
        .declare("published")
        .declare(
            Declaration::namespace("author")
                .hidden()
                .qs(Optimization::annotation("author_books", "count(author.books)"))
                .with(Declaration::filter("name").search())
                .with("email"),
        )
        .declare(
            Declaration::namespace("tags")
                .distinct()
                .qs(Optimization::prefetch_related(["tags"]))
                .with("name")
                .with("kind"),
        )
        .build()
        .unwrap()
}

fn books() -> Vec<Json> {
    vec![
        json!({
            "id": 1,
            "title": "banner",
            "subtitle": null,
            "pages": 120,
            "published": "2001-05-01",
            "author": {"name": "Ann", "email": null},
            "tags": [{"name": "a", "kind": "x"}, {"name": "b", "kind": "y"}],
        }),
        json!({
            "id": 2,
            "title": "other",
            "subtitle": "more",
            "pages": 300,
            "published": "1999-01-15",
            "author": {"name": "Bob", "email": "bob@example.com"},
            "tags": [{"name": "a", "kind": "y"}],
        }),
        json!({
            "id": 3,
            "title": "st*r",
            "subtitle": "shine",
            "pages": 50,
            "published": "2010-10-10",
            "author": {"name": "Ann", "email": "ann@example.com"},
            "tags": [],
        }),
    ]
}

fn plan(query: &str) -> QueryPlan {
    let schema = schema();
    let ast = parse_query(query).unwrap();
    let compiled = compile(ast.as_ref(), &schema).unwrap();
    QueryPlan::assemble(compiled, &schema, &BaseQuery::default()).unwrap()
}

fn ids(query: &str) -> Vec<i64> {
    support::run(&books(), &plan(query))
}

#[test]
fn test_parse_is_deterministic() {
    for query in [
        "title=banner",
        "and(ge(pages,100),not(title=other))|author.name=Ann",
        "tags=tuple(name=a,kind=y)&ordering(-pages)&select(author)",
    ] {
        assert_eq!(parse_query(query).unwrap(), parse_query(query).unwrap());
    }
}

#[test]
fn test_comparison_forms_select_same_rows() {
    let function = plan("ge(pages,100)");
    let infix = plan("pages=ge=100");
    assert_eq!(function, infix);
    assert_eq!(support::run(&books(), &function), vec![1, 2]);

    assert_eq!(plan("eq(title,other)"), plan("title=other"));
    assert_eq!(plan("title=eq=other"), plan("title=other"));
}

#[test]
fn test_in_and_out_are_complementary() {
    assert_eq!(ids("in(id,(1,2))"), vec![1, 2]);
    assert_eq!(ids("out(id,(1,2))"), vec![3]);
    assert_eq!(ids("in(pages,(50))"), vec![3]);
}

#[test]
fn test_like_patterns() {
    assert_eq!(ids("like(title,*an*r)"), vec![1]);
    assert_eq!(ids("like(title,ban*)"), vec![1]);
    assert_eq!(ids("ilike(title,*THER)"), vec![2]);
    assert_eq!(ids(r"like(title,*\**)"), vec![3]);
}

#[test]
fn test_null_sentinel() {
    assert_eq!(ids("subtitle=null()"), vec![1]);
    assert_eq!(ids("subtitle=ne=null()"), vec![2, 3]);
    assert_eq!(ids("author.email=null()"), vec![1]);
}

#[test]
fn test_null_sentinel_respects_declared_lookups() {
    let catalog = Catalog::new().with_model(
        Model::new("book")
            .field("id", FieldMeta::int().primary_key())
            .field("subtitle", FieldMeta::string().nullable()),
    );
    let schema = FilterSchema::builder("notes", &catalog, "book")
        .declare(
            Declaration::filter("note")
                .source("subtitle")
                .lookups([FilterLookup::Eq, FilterLookup::Null]),
        )
        .build()
        .unwrap();
    let service = QueryService::new(schema);
    let base = BaseQuery::default();

    let plan = service.apply(RequestMethod::Get, "note=null()", &base).unwrap();
    assert_eq!(support::run(&books(), &plan), vec![1]);

    let err = service
        .apply(RequestMethod::Get, "note=ne=null()", &base)
        .unwrap_err();
    assert_eq!(err, RqlError::lookup("note", "ne", "null()"));
}

#[test]
fn test_logical_combinations() {
    assert_eq!(ids("author.name=Ann&pages=lt=100"), vec![3]);
    assert_eq!(ids("(title=other|pages=50)"), vec![2, 3]);
    assert_eq!(ids("not(author.name=Ann)"), vec![2]);
    assert_eq!(ids("published=gt=2000-01-01"), vec![1, 3]);
}

#[test]
fn test_tuple_matches_within_one_related_row() {
    assert_eq!(ids("tags.name=a&tags.kind=y"), vec![1, 2]);
    assert_eq!(ids("tags=tuple(name=a,kind=y)"), vec![2]);
    assert!(plan("tags=tuple(name=a,kind=y)").distinct);
}

#[test]
fn test_search_covers_search_filters() {
    assert_eq!(ids("search=bob"), vec![2]);
    assert_eq!(ids("search=ANN"), vec![1, 3]);
    assert_eq!(ids("search=b*n"), vec![1]);
}

#[test]
fn test_ordering_and_pagination() {
    assert_eq!(ids("ordering(-pages)"), vec![2, 1, 3]);
    assert_eq!(ids("ordering(title)"), vec![1, 2, 3]);
    assert_eq!(ids("ordering(-pages)&limit=1&offset=1"), vec![1]);
    assert_eq!(plan("ordering(-pages,title)").ordering, vec!["-pages", "title"]);

    let schema = schema();
    let twice = parse_query("ordering(title)&ordering(pages)").unwrap();
    assert_eq!(
        compile(twice.as_ref(), &schema).unwrap_err(),
        RqlError::parsing("Bad ordering filter: query can contain only one ordering operation.")
    );

    let unknown = parse_query("ordering(subtitle)").unwrap();
    assert_eq!(
        compile(unknown.as_ref(), &schema).unwrap_err(),
        RqlError::parsing("Bad ordering filter: subtitle.")
    );
}

#[test]
fn test_base_query_is_combined() {
    let schema = schema();
    let ast = parse_query("author.name=Ann").unwrap();
    let compiled = compile(ast.as_ref(), &schema).unwrap();
    let base = BaseQuery::new(Predicate::condition("pages", Lookup::Gt, Value::Int(100)))
        .ordering(["-pages"]);

    let plan = QueryPlan::assemble(compiled, &schema, &base).unwrap();
    assert_eq!(plan.ordering, vec!["-pages"]);
    assert_eq!(support::run(&books(), &plan), vec![1]);
}

#[test]
fn test_select_hidden_namespace_field() {
    let plan = plan("select(author.name)");

    assert!(plan.is_included("author"));
    assert!(plan.is_included("author.name"));
    assert!(!plan.is_included("author.email"));
    assert!(plan.is_included("title"));
}

#[test]
fn test_hidden_namespace_excluded_by_default() {
    let plan = plan("title=banner");
    assert!(!plan.is_included("author"));
    assert!(plan.is_included("tags"));
    assert_eq!(
        plan.directives,
        vec![AppliedDirective::JoinCollection {
            path: "tags".into(),
            to_attr: None
        }]
    );
}

#[test]
fn test_annotation_applied_once_across_paths() {
    let plan = plan("select(author)&author.name=Ann");

    let annotations: Vec<_> = plan
        .directives
        .iter()
        .filter(|d| matches!(d, AppliedDirective::Annotate { .. }))
        .collect();
    assert_eq!(
        annotations,
        vec![&AppliedDirective::Annotate {
            name: "author_books".into(),
            expression: "count(author.books)".into(),
        }]
    );

    let unique: BTreeSet<String> = plan
        .directives
        .iter()
        .map(|d| serde_json::to_string(d).unwrap())
        .collect();
    assert_eq!(unique.len(), plan.directives.len());
}

#[test]
fn test_excluded_tags_skip_prefetch() {
    let plan = plan("select(-tags)");
    assert!(!plan.is_included("tags"));
    assert!(plan.directives.is_empty());
}

#[test]
fn test_service_caches_plans() {
    let service = QueryService::new(schema());
    let base = BaseQuery::default();
    let query = "like(title,*an*r)&ordering(-pages)";

    let first = service.apply(RequestMethod::Get, query, &base).unwrap();
    let second = service.apply(RequestMethod::Get, query, &base).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(support::run(&books(), &second), vec![1]);

    let stats = service.cache().unwrap().stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));

    service.clear();
    let third = service.apply(RequestMethod::Get, query, &base).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(*first, *third);
    assert_eq!(service.cache().unwrap().stats().misses, 2);
}

#[test]
fn test_errors_surface_from_service() {
    let service = QueryService::new(schema());
    let base = BaseQuery::default();

    let err = service
        .apply(RequestMethod::Get, "pages=many", &base)
        .unwrap_err();
    assert_eq!(err, RqlError::value("pages", "eq", "many"));

    assert!(service.apply(RequestMethod::Get, "and(", &base).is_err());
    assert_eq!(
        service
            .apply(RequestMethod::Get, "like(title,a**)", &base)
            .unwrap_err(),
        RqlError::value("title", "like", "a**")
    );
    assert!(service.cache().unwrap().is_empty());
}
