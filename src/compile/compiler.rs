//! AST compiler
//!
//! Walks a parsed query against a [`FilterSchema`] and produces the
//! predicate tree together with ordering keys, the raw select list and
//! pagination. Per-request state lives in a [`CompileSession`]; the schema
//! itself is never mutated, so one schema serves concurrent requests.
//!
//! # Pipeline
//!
//! ```text
//! Node → resolve filter → check lookup → coerce value → Predicate
//!          ↓                                               ↓
//!     touched names, distinct                 And / Or / Not / Scoped
//! ```

use serde::Serialize;
use std::collections::BTreeSet;

use super::predicate::{Lookup, Predicate, Value};
use super::search::{pattern_lookup, pattern_value};
use super::value::convert_value;
use crate::query::{
    remove_quotes, ComparisonOp, ListOp, LogicalOp, Node, RqlError, RqlResult, SearchOp,
    SignedProp, RESERVED_FILTER_NAMES, RQL_ANY_SYMBOL, RQL_EMPTY, RQL_LIMIT_PARAM, RQL_MINUS,
    RQL_OFFSET_PARAM, RQL_SEARCH_PARAM,
};
use crate::schema::{
    FilterArgs, FilterDescriptor, FilterKind, FilterLookup, FilterSchema, UnknownFilterPolicy,
};

const PAGINATION_ERROR: &str = "Limit and offset are set incorrectly.";

/// Output of compiling one query against one schema
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub predicate: Predicate,
    /// Signed backing keys, `-` for descending
    pub ordering: Vec<String>,
    /// Raw `select()` list, resolved later against the projection tree
    pub select: Vec<SignedProp>,
    /// Every filter name the query referenced
    pub touched: BTreeSet<String>,
    pub distinct: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Compile a parsed query
///
/// `None` (an empty query) compiles to an unconstrained result.
pub fn compile(ast: Option<&Node>, schema: &FilterSchema) -> RqlResult<CompiledQuery> {
    let mut session = CompileSession::new(schema);
    let predicate = match ast {
        Some(node) => session.node(node)?,
        None => Predicate::All,
    };
    Ok(session.finish(predicate))
}

/// Request-scoped compile state
struct CompileSession<'s> {
    schema: &'s FilterSchema,
    touched: BTreeSet<String>,
    distinct: bool,
    ordering: Option<Vec<String>>,
    select: Option<Vec<SignedProp>>,
    limit: Option<String>,
    offset: Option<String>,
}

impl<'s> CompileSession<'s> {
    fn new(schema: &'s FilterSchema) -> Self {
        Self {
            schema,
            touched: BTreeSet::new(),
            distinct: schema.options().distinct,
            ordering: None,
            select: None,
            limit: None,
            offset: None,
        }
    }

    fn finish(self, predicate: Predicate) -> CompiledQuery {
        let compiled = CompiledQuery {
            predicate,
            ordering: self.ordering.unwrap_or_default(),
            select: self.select.unwrap_or_default(),
            touched: self.touched,
            distinct: self.distinct,
            limit: parse_pagination(RQL_LIMIT_PARAM, self.limit.as_deref()),
            offset: parse_pagination(RQL_OFFSET_PARAM, self.offset.as_deref()),
        };

        tracing::debug!(
            schema = %self.schema.name(),
            touched = compiled.touched.len(),
            distinct = compiled.distinct,
            "Compiled query"
        );
        compiled
    }

    fn node(&mut self, node: &Node) -> RqlResult<Predicate> {
        match node {
            Node::Comparison { prop, op, value } => self.comparison(prop, *op, value),
            Node::Listing { op, prop, values } => self.listing(*op, prop, values),
            Node::Searching { op, prop, value } => self.searching(*op, prop, value),
            Node::Logical { op, children } => {
                let children = children
                    .iter()
                    .map(|child| self.node(child))
                    .collect::<RqlResult<Vec<_>>>()?;
                Ok(match op {
                    LogicalOp::And => Predicate::and(children),
                    LogicalOp::Or => Predicate::or(children),
                    LogicalOp::Not => Predicate::not(Predicate::and(children)),
                })
            }
            Node::Ordering { props } => self.ordering(props),
            Node::Select { props } => self.select(props),
            Node::NamespaceTuple { prop, children } => self.tuple(prop, children),
        }
    }

    fn comparison(&mut self, prop: &str, op: ComparisonOp, value: &str) -> RqlResult<Predicate> {
        match prop {
            RQL_LIMIT_PARAM | RQL_OFFSET_PARAM => self.pagination(prop, op, value),
            _ => self.filter(prop, op.into(), value, None),
        }
    }

    /// `in()` is an OR of equalities, `out()` an AND of inequalities
    fn listing(&mut self, op: ListOp, prop: &str, values: &[String]) -> RqlResult<Predicate> {
        let lookup = match op {
            ListOp::In => FilterLookup::Eq,
            ListOp::Out => FilterLookup::Ne,
        };
        let children = values
            .iter()
            .map(|value| self.filter(prop, lookup, value, Some(op)))
            .collect::<RqlResult<Vec<_>>>()?;

        Ok(match op {
            ListOp::In => Predicate::or(children),
            ListOp::Out => Predicate::and(children),
        })
    }

    fn searching(&mut self, op: SearchOp, prop: &str, value: &str) -> RqlResult<Predicate> {
        self.filter(prop, op.into(), value, None)
    }

    /// Build the predicate of one filter test
    fn filter(
        &mut self,
        name: &str,
        op: FilterLookup,
        raw: &str,
        list_op: Option<ListOp>,
    ) -> RqlResult<Predicate> {
        if name == RQL_SEARCH_PARAM {
            return self.search(op, raw);
        }

        let schema = self.schema;
        let Some(descriptor) = schema.filter(name) else {
            return self.unknown(name);
        };
        self.touched.insert(name.to_string());
        self.distinct |= descriptor.distinct;

        if let Some(list_op) = list_op {
            let required = FilterLookup::from(list_op);
            if !descriptor.allows(required) {
                return Err(RqlError::lookup(name, required.as_str(), raw));
            }
        }

        let lookup = resolve_lookup(descriptor, op, raw)?;
        let is_null = descriptor.null_values.contains(raw);
        let backing = if is_null {
            Lookup::IsNull
        } else {
            backing_lookup(lookup, raw)
        };

        let (sources, field) = match &descriptor.kind {
            FilterKind::Custom => {
                return schema.hooks().build_custom_predicate(&FilterArgs {
                    filter_name: name,
                    lookup,
                    backing,
                    raw_value: raw,
                    list_op,
                    descriptor,
                });
            }
            FilterKind::Field { sources, field, .. } => (sources, field),
        };

        let value = match lookup {
            _ if is_null => Value::Bool(true),
            FilterLookup::Like | FilterLookup::ILike => pattern_value(raw, backing)
                .map(Value::String)
                .ok_or_else(|| RqlError::value(name, lookup.as_str(), raw))?,
            _ => convert_value(name, lookup, field, descriptor.use_repr, raw)?,
        };

        let negate = op == FilterLookup::Ne;
        let conditions = sources.iter().map(|source| {
            let condition = Predicate::condition(source.clone(), backing, value.clone());
            if negate {
                Predicate::not(condition)
            } else {
                condition
            }
        });

        Ok(if negate {
            Predicate::and(conditions)
        } else {
            Predicate::or(conditions)
        })
    }

    fn unknown(&self, name: &str) -> RqlResult<Predicate> {
        let policy = self.schema.options().unknown_filters;
        if policy == UnknownFilterPolicy::Reject && !RESERVED_FILTER_NAMES.contains(&name) {
            return Err(RqlError::parsing(format!("Unknown filter: {}.", name)));
        }
        tracing::debug!(schema = %self.schema.name(), filter = %name, "Ignoring unknown filter");
        Ok(Predicate::All)
    }

    /// Case-insensitive search across every searchable filter
    fn search(&mut self, op: FilterLookup, raw: &str) -> RqlResult<Predicate> {
        if op != FilterLookup::Eq {
            return Err(RqlError::parsing(format!("Bad search filter: {}.", op)));
        }

        let unquoted = remove_quotes(raw);
        if unquoted.is_empty() {
            return Ok(Predicate::All);
        }

        let mut pattern = String::with_capacity(unquoted.len() + 2);
        if !unquoted.starts_with(RQL_ANY_SYMBOL) {
            pattern.push(RQL_ANY_SYMBOL);
        }
        pattern.push_str(unquoted);
        if !unquoted.ends_with(RQL_ANY_SYMBOL) {
            pattern.push(RQL_ANY_SYMBOL);
        }

        let schema = self.schema;
        let mut children = Vec::new();

        let backing = pattern_lookup(&pattern, true);
        for route in &schema.options().extended_search_routes {
            let value = pattern_value(&pattern, backing).ok_or_else(|| {
                RqlError::value(RQL_SEARCH_PARAM, FilterLookup::ILike.as_str(), raw)
            })?;
            children.push(Predicate::condition(route.clone(), backing, Value::String(value)));
        }

        for name in schema.search_filters() {
            children.push(self.filter(name, FilterLookup::ILike, &pattern, None)?);
        }

        Ok(Predicate::or(children))
    }

    /// Record `limit`/`offset`; each may appear once and only with `eq`
    fn pagination(&mut self, name: &str, op: ComparisonOp, raw: &str) -> RqlResult<Predicate> {
        let slot = if name == RQL_LIMIT_PARAM {
            &mut self.limit
        } else {
            &mut self.offset
        };
        if op != ComparisonOp::Eq || slot.is_some() {
            return Err(RqlError::parsing(PAGINATION_ERROR));
        }
        *slot = Some(remove_quotes(raw).to_string());
        Ok(Predicate::All)
    }

    fn ordering(&mut self, props: &[SignedProp]) -> RqlResult<Predicate> {
        if self.ordering.is_some() {
            return Err(RqlError::parsing(
                "Bad ordering filter: query can contain only one ordering operation.",
            ));
        }

        let schema = self.schema;
        let mut keys = Vec::with_capacity(props.len());
        for prop in props {
            let name = prop.prop.as_str();
            let descriptor = schema
                .filter(name)
                .filter(|_| schema.is_orderable(name))
                .ok_or_else(|| RqlError::parsing(format!("Bad ordering filter: {}.", name)))?;

            self.touched.insert(name.to_string());
            self.distinct |= descriptor.distinct;

            let sign = if prop.is_minus() {
                RQL_MINUS.to_string()
            } else {
                String::new()
            };
            match &descriptor.kind {
                FilterKind::Custom => {
                    let key = schema.hooks().custom_ordering(name)?;
                    keys.push(format!("{}{}", sign, key));
                }
                FilterKind::Field { sources, .. } => {
                    keys.extend(sources.iter().map(|source| format!("{}{}", sign, source)));
                }
            }
        }

        self.ordering = Some(keys);
        Ok(Predicate::All)
    }

    fn select(&mut self, props: &[SignedProp]) -> RqlResult<Predicate> {
        if self.select.is_some() {
            return Err(RqlError::parsing(
                "Bad select filter: query can contain only one select operation.",
            ));
        }

        self.touched
            .extend(props.iter().filter(|p| !p.is_minus()).map(|p| p.prop.clone()));
        self.select = Some(props.to_vec());
        Ok(Predicate::All)
    }

    /// `ns=tuple(..)`: every child must hold on the same related record
    fn tuple(&mut self, namespace: &str, children: &[Node]) -> RqlResult<Predicate> {
        let schema = self.schema;
        let info = schema
            .namespace(namespace)
            .ok_or_else(|| RqlError::parsing(format!("Bad tuple filter: {}.", namespace)))?;
        self.distinct |= info.distinct;

        let mut predicates = Vec::with_capacity(children.len());
        for child in children {
            let predicate = match child {
                Node::Comparison { prop, op, value } => {
                    self.filter(&format!("{}.{}", namespace, prop), (*op).into(), value, None)?
                }
                Node::Searching { op, prop, value } => {
                    self.filter(&format!("{}.{}", namespace, prop), (*op).into(), value, None)?
                }
                _ => {
                    return Err(RqlError::parsing(format!(
                        "Bad tuple filter: {}.",
                        namespace
                    )))
                }
            };
            predicates.push(predicate);
        }

        Ok(Predicate::scoped(info.route.clone(), Predicate::and(predicates)))
    }
}

/// Check the requested lookup against the descriptor
///
/// Null sentinels and `empty()` only allow equality tests, and a null
/// sentinel also needs the `null` lookup. The operator itself must be allowed
/// in every case and is returned unchanged.
fn resolve_lookup(
    descriptor: &FilterDescriptor,
    op: FilterLookup,
    raw: &str,
) -> RqlResult<FilterLookup> {
    let error = || RqlError::lookup(descriptor.name.as_str(), op.as_str(), raw);
    let equality = matches!(op, FilterLookup::Eq | FilterLookup::Ne);

    if descriptor.null_values.contains(raw) {
        if !equality || !descriptor.allows(FilterLookup::Null) {
            return Err(error());
        }
    } else if raw == RQL_EMPTY && !equality {
        return Err(error());
    }
    if !descriptor.allows(op) {
        return Err(error());
    }
    Ok(op)
}

fn backing_lookup(lookup: FilterLookup, raw: &str) -> Lookup {
    match lookup {
        FilterLookup::Null => Lookup::IsNull,
        FilterLookup::Like => pattern_lookup(raw, false),
        FilterLookup::ILike => pattern_lookup(raw, true),
        FilterLookup::Gt => Lookup::Gt,
        FilterLookup::Ge => Lookup::Gte,
        FilterLookup::Lt => Lookup::Lt,
        FilterLookup::Le => Lookup::Lte,
        FilterLookup::Eq | FilterLookup::Ne | FilterLookup::In | FilterLookup::Out => {
            Lookup::Exact
        }
    }
}

fn parse_pagination(name: &str, raw: Option<&str>) -> Option<u64> {
    let raw = raw?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(param = %name, value = %raw, "Ignoring invalid pagination value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;
    use crate::schema::{
        Catalog, Choice, Declaration, FieldMeta, FilterHooks, Model, SchemaBuilder,
    };

    struct ScoreHooks;

    impl FilterHooks for ScoreHooks {
        fn build_custom_predicate(&self, args: &FilterArgs<'_>) -> RqlResult<Predicate> {
            let value = if args.backing == Lookup::IsNull {
                Value::Bool(true)
            } else {
                Value::String(remove_quotes(args.raw_value).to_string())
            };
            let condition = Predicate::condition("score.total", args.backing, value);
            Ok(if args.lookup == FilterLookup::Ne {
                Predicate::not(condition)
            } else {
                condition
            })
        }

        fn custom_ordering(&self, _filter_name: &str) -> RqlResult<String> {
            Ok("score.total".to_string())
        }
    }

    fn catalog() -> Catalog {
        Catalog::new()
            .with_model(
                Model::new("book")
                    .field("id", FieldMeta::int().primary_key())
                    .field("title", FieldMeta::string().blank())
                    .field("subtitle", FieldMeta::string().nullable())
                    .field("pages", FieldMeta::int())
                    .field("published", FieldMeta::boolean())
                    .field(
                        "status",
                        FieldMeta::int().choices([Choice::new("1", "draft"), Choice::new("2", "final")]),
                    )
                    .relation("author", "author")
                    .relation_many("tags", "tag"),
            )
            .with_model(
                Model::new("author")
                    .field("name", FieldMeta::string())
                    .field("email", FieldMeta::string().nullable()),
            )
            .with_model(Model::new("tag").field("name", FieldMeta::string()))
    }

    fn schema_with(configure: impl FnOnce(SchemaBuilder<'_>) -> SchemaBuilder<'_>) -> FilterSchema {
        let catalog = catalog();
        let builder = FilterSchema::builder("books", &catalog, "book")
            .declare("id")
            .declare(Declaration::filter("title").ordering().search())
            .declare("subtitle")
            .declare(Declaration::filter("pages").ordering())
            .declare("published")
            .declare(Declaration::filter("status").use_repr())
            .declare(Declaration::filter("text").sources(["title", "subtitle"]).ordering())
            .declare(
                Declaration::filter("score")
                    .custom()
                    .lookups([FilterLookup::Eq, FilterLookup::Ge])
                    .ordering(),
            )
            .declare(
                Declaration::namespace("author")
                    .with(Declaration::filter("name").search())
                    .with("email"),
            )
            .declare(Declaration::namespace("tags").distinct().with("name"))
            .hooks(ScoreHooks);
        configure(builder).build().unwrap()
    }

    fn schema() -> FilterSchema {
        schema_with(|b| b)
    }

    fn run(schema: &FilterSchema, query: &str) -> RqlResult<CompiledQuery> {
        let ast = parse_query(query)?;
        compile(ast.as_ref(), schema)
    }

    fn predicate(query: &str) -> Predicate {
        run(&schema(), query).unwrap().predicate
    }

    fn cond(path: &str, lookup: Lookup, value: Value) -> Predicate {
        Predicate::condition(path, lookup, value)
    }

    fn text(value: &str) -> Value {
        Value::String(value.to_string())
    }

    #[test]
    fn test_empty_query() {
        let compiled = compile(None, &schema()).unwrap();
        assert_eq!(compiled, CompiledQuery::default());
    }

    #[test]
    fn test_comparison_forms_are_equivalent() {
        let expected = cond("title", Lookup::Exact, text("book"));
        assert_eq!(predicate("eq(title,book)"), expected);
        assert_eq!(predicate("title=eq=book"), expected);
        assert_eq!(predicate("title=book"), expected);
        assert_eq!(predicate("title='book'"), expected);
    }

    #[test]
    fn test_ordering_comparisons() {
        assert_eq!(predicate("pages=ge=10"), cond("pages", Lookup::Gte, Value::Int(10)));
        assert_eq!(predicate("lt(pages,3)"), cond("pages", Lookup::Lt, Value::Int(3)));
        assert_eq!(
            predicate("ne(pages,3)"),
            Predicate::not(cond("pages", Lookup::Exact, Value::Int(3)))
        );
    }

    #[test]
    fn test_listing_expansion() {
        assert_eq!(
            predicate("in(id,(1,2))"),
            Predicate::or([
                cond("id", Lookup::Exact, Value::Int(1)),
                cond("id", Lookup::Exact, Value::Int(2)),
            ])
        );
        assert_eq!(
            predicate("out(id,(1,2))"),
            Predicate::and([
                Predicate::not(cond("id", Lookup::Exact, Value::Int(1))),
                Predicate::not(cond("id", Lookup::Exact, Value::Int(2))),
            ])
        );
    }

    #[test]
    fn test_listing_mixes_null_sentinel() {
        assert_eq!(
            predicate("in(subtitle,(a,null()))"),
            Predicate::or([
                cond("subtitle", Lookup::Exact, text("a")),
                cond("subtitle", Lookup::IsNull, Value::Bool(true)),
            ])
        );
    }

    #[test]
    fn test_listing_requires_list_lookup() {
        let err = run(&schema(), "in(published,(true))").unwrap_err();
        assert_eq!(err, RqlError::lookup("published", "in", "true"));
    }

    #[test]
    fn test_null_sentinel() {
        assert_eq!(
            predicate("subtitle=null()"),
            cond("subtitle", Lookup::IsNull, Value::Bool(true))
        );
        assert_eq!(
            predicate("subtitle=ne=null()"),
            Predicate::not(cond("subtitle", Lookup::IsNull, Value::Bool(true)))
        );

        let err = run(&schema(), "pages=null()").unwrap_err();
        assert_eq!(err, RqlError::lookup("pages", "eq", "null()"));

        let err = run(&schema(), "ge(subtitle,null())").unwrap_err();
        assert_eq!(err, RqlError::lookup("subtitle", "ge", "null()"));
    }

    #[test]
    fn test_empty_sentinel() {
        assert_eq!(predicate("title=empty()"), cond("title", Lookup::Exact, text("")));

        let err = run(&schema(), "pages=empty()").unwrap_err();
        assert_eq!(err, RqlError::value("pages", "eq", "empty()"));

        let err = run(&schema(), "pages=gt=empty()").unwrap_err();
        assert_eq!(err, RqlError::lookup("pages", "gt", "empty()"));
    }

    #[test]
    fn test_lookup_not_allowed() {
        let err = run(&schema(), "ge(title,a)").unwrap_err();
        assert_eq!(err, RqlError::lookup("title", "ge", "a"));
    }

    #[test]
    fn test_value_error() {
        let err = run(&schema(), "pages=abc").unwrap_err();
        assert_eq!(err, RqlError::value("pages", "eq", "abc"));
        assert_eq!(err.code(), "RQL_VALUE_ERROR");
    }

    #[test]
    fn test_choices_use_repr() {
        assert_eq!(predicate("status=final"), cond("status", Lookup::Exact, Value::Int(2)));
        assert!(run(&schema(), "status=2").is_err());
    }

    #[test]
    fn test_multi_source_fan_out() {
        assert_eq!(
            predicate("text=x"),
            Predicate::or([
                cond("title", Lookup::Exact, text("x")),
                cond("subtitle", Lookup::Exact, text("x")),
            ])
        );
        assert_eq!(
            predicate("text=ne=x"),
            Predicate::and([
                Predicate::not(cond("title", Lookup::Exact, text("x"))),
                Predicate::not(cond("subtitle", Lookup::Exact, text("x"))),
            ])
        );
    }

    #[test]
    fn test_searching_lookups() {
        assert_eq!(
            predicate("like(title,*an*r)"),
            cond("title", Lookup::Regex, text("an(.*?)r$"))
        );
        assert_eq!(
            predicate("ilike(title,abc*)"),
            cond("title", Lookup::IStartsWith, text("abc"))
        );

        let err = run(&schema(), "like(title,a**)").unwrap_err();
        assert_eq!(err, RqlError::value("title", "like", "a**"));
    }

    #[test]
    fn test_logical_combination() {
        assert_eq!(
            predicate("(pages=1|pages=2)&not(id=3)"),
            Predicate::and([
                Predicate::or([
                    cond("pages", Lookup::Exact, Value::Int(1)),
                    cond("pages", Lookup::Exact, Value::Int(2)),
                ]),
                Predicate::not(cond("id", Lookup::Exact, Value::Int(3))),
            ])
        );
    }

    #[test]
    fn test_search_param() {
        let schema = schema_with(|b| b.extended_search_route("author.email"));
        let compiled = run(&schema, "search=ban").unwrap();

        assert_eq!(
            compiled.predicate,
            Predicate::or([
                cond("author.email", Lookup::IContains, text("ban")),
                cond("author.name", Lookup::IContains, text("ban")),
                cond("title", Lookup::IContains, text("ban")),
            ])
        );
        assert!(compiled.touched.contains("title"));
        assert!(!compiled.touched.contains("search"));
    }

    #[test]
    fn test_search_param_edge_cases() {
        assert_eq!(predicate("search=''"), Predicate::All);
        assert_eq!(
            predicate("search=b*n"),
            Predicate::or([
                cond("author.name", Lookup::IRegex, text("b(.*?)n")),
                cond("title", Lookup::IRegex, text("b(.*?)n")),
            ])
        );

        let err = run(&schema(), "ne(search,x)").unwrap_err();
        assert_eq!(err, RqlError::parsing("Bad search filter: ne."));
    }

    #[test]
    fn test_pagination() {
        let compiled = run(&schema(), "limit=10&offset=20&pages=1").unwrap();
        assert_eq!(compiled.limit, Some(10));
        assert_eq!(compiled.offset, Some(20));
        assert_eq!(compiled.predicate, cond("pages", Lookup::Exact, Value::Int(1)));
        assert!(!compiled.touched.contains("limit"));

        let compiled = run(&schema(), "limit=abc").unwrap();
        assert_eq!(compiled.limit, None);

        for query in ["limit=ge=1", "limit=1&offset=1&eq(limit,2)", "offset=1&offset=eq=2"] {
            let err = run(&schema(), query).unwrap_err();
            assert_eq!(err, RqlError::parsing("Limit and offset are set incorrectly."));
        }
    }

    #[test]
    fn test_ordering() {
        let compiled = run(&schema(), "ordering(-title,pages)").unwrap();
        assert_eq!(compiled.ordering, vec!["-title", "pages"]);
        assert!(compiled.touched.contains("title"));

        let compiled = run(&schema(), "ordering(-text)").unwrap();
        assert_eq!(compiled.ordering, vec!["-title", "-subtitle"]);

        let compiled = run(&schema(), "ordering(-score)").unwrap();
        assert_eq!(compiled.ordering, vec!["-score.total"]);
    }

    #[test]
    fn test_ordering_errors() {
        let err = run(&schema(), "ordering(title)&ordering(pages)").unwrap_err();
        assert_eq!(
            err,
            RqlError::parsing("Bad ordering filter: query can contain only one ordering operation.")
        );

        let err = run(&schema(), "ordering(id)").unwrap_err();
        assert_eq!(err, RqlError::parsing("Bad ordering filter: id."));
    }

    #[test]
    fn test_select_is_collected_once() {
        let compiled = run(&schema(), "select(author,-title)").unwrap();
        assert_eq!(
            compiled.select,
            vec![SignedProp::plus("author"), SignedProp::minus("title")]
        );
        assert!(compiled.touched.contains("author"));
        assert!(!compiled.touched.contains("title"));

        let err = run(&schema(), "select(author)&select(id)").unwrap_err();
        assert!(matches!(err, RqlError::Parsing(_)));
    }

    #[test]
    fn test_namespace_tuple() {
        assert_eq!(
            predicate("author=tuple(name=Tolkien,email=null())"),
            Predicate::scoped(
                "author",
                Predicate::and([
                    cond("author.name", Lookup::Exact, text("Tolkien")),
                    cond("author.email", Lookup::IsNull, Value::Bool(true)),
                ])
            )
        );

        let err = run(&schema(), "title=tuple(name=x)").unwrap_err();
        assert_eq!(err, RqlError::parsing("Bad tuple filter: title."));
    }

    #[test]
    fn test_distinct_propagation() {
        assert!(!run(&schema(), "title=a").unwrap().distinct);
        assert!(run(&schema(), "tags.name=a").unwrap().distinct);
        assert!(run(&schema_with(|b| b.distinct(true)), "").unwrap().distinct);
    }

    #[test]
    fn test_custom_filter_uses_hook() {
        assert_eq!(
            predicate("score=ge=10"),
            cond("score.total", Lookup::Gte, text("10"))
        );

        let err = run(&schema(), "score=lt=10").unwrap_err();
        assert_eq!(err, RqlError::lookup("score", "lt", "10"));
    }

    #[test]
    fn test_custom_filter_null_sentinel_keeps_operator() {
        let schema = schema_with(|b| {
            b.declare(
                Declaration::filter("rating")
                    .custom()
                    .lookups([FilterLookup::Eq, FilterLookup::Ne, FilterLookup::Null])
                    .null_values(["null()"]),
            )
        });
        let is_null = cond("score.total", Lookup::IsNull, Value::Bool(true));

        assert_eq!(run(&schema, "rating=null()").unwrap().predicate, is_null);
        assert_eq!(
            run(&schema, "rating=ne=null()").unwrap().predicate,
            Predicate::not(is_null)
        );
        assert_eq!(
            run(&schema, "rating=ne=5").unwrap().predicate,
            Predicate::not(cond("score.total", Lookup::Exact, text("5")))
        );
    }

    #[test]
    fn test_null_sentinel_requires_allowed_operator() {
        let schema = schema_with(|b| {
            b.declare(
                Declaration::filter("note")
                    .source("subtitle")
                    .lookups([FilterLookup::Eq, FilterLookup::Null]),
            )
        });

        assert_eq!(
            run(&schema, "note=null()").unwrap().predicate,
            cond("subtitle", Lookup::IsNull, Value::Bool(true))
        );
        assert_eq!(
            run(&schema, "note=ne=null()").unwrap_err(),
            RqlError::lookup("note", "ne", "null()")
        );
        assert_eq!(
            run(&schema, "out(note,(null()))").unwrap_err(),
            RqlError::lookup("note", "out", "null()")
        );
    }

    #[test]
    fn test_unknown_filter_policy() {
        assert_eq!(predicate("missing=1&pages=1"), cond("pages", Lookup::Exact, Value::Int(1)));

        let strict = schema_with(|b| b.unknown_filters(UnknownFilterPolicy::Reject));
        let err = run(&strict, "missing=1").unwrap_err();
        assert_eq!(err, RqlError::parsing("Unknown filter: missing."));
        assert_eq!(run(&strict, "limit=5").unwrap().limit, Some(5));
    }
}
