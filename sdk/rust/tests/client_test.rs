//! Immediate operations against a recording transport.

mod common;

use common::{Article, Author, MockTransport};
use cuckoo_sdk::{
    columns, Aggregate, Aggregates, Conditions, ErrorCode, GraphQLError, Include, Response,
    SdkError, UpdateEntry, UpdateOps,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[test]
fn test_one_by_pk_with_nested_include() {
    let transport = MockTransport::new();
    transport.respond_data(json!({
        "op0": {"uuid": "ABC", "articles": [{"title": "Hello"}, {"title": "World"}]}
    }));

    let author: Author = transport
        .client()
        .query::<Author>()
        .one_by_pk("ABC")
        .returning(columns![
            "uuid",
            Include::of::<Article>()
                .many(Conditions::new())
                .returning(["title"]),
        ])
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    insta::assert_snapshot!(requests[0].query, @"query Query($uuid: uuid!) { op0: authors_by_pk(uuid: $uuid) { uuid articles { title } } }");
    assert_eq!(requests[0].variables["uuid"], json!("ABC"));
    assert_eq!(requests[0].variables.len(), 1);

    let titles: Vec<_> = author
        .articles
        .unwrap()
        .into_iter()
        .filter_map(|article| article.title)
        .collect();
    assert_eq!(titles, ["Hello", "World"]);
}

#[test]
fn test_by_pk_miss_is_not_found() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": null}));

    let err = transport
        .client()
        .query::<Author>()
        .one_by_pk("missing")
        .returning(["uuid"])
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn test_empty_list_is_not_an_error() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": []}));

    let authors = transport
        .client()
        .query::<Author>()
        .many(Conditions::new().where_(json!({"name": {"_eq": "Nobody"}})))
        .returning(["uuid"])
        .unwrap();

    assert!(authors.is_empty());
    insta::assert_snapshot!(transport.requests()[0].query, @"query Query($name: String_comparison_exp) { op0: authors(where: {name: $name}) { uuid } }");
}

#[test]
fn test_graphql_errors_are_aggregated() {
    let transport = MockTransport::new();
    transport.respond(Ok(Response::errors(vec![
        GraphQLError::new("field 'nope' not found in type: 'authors'"),
        GraphQLError::new("permission denied"),
    ])));

    let err = transport
        .client()
        .query::<Author>()
        .many(Conditions::new())
        .returning(["uuid"])
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::GraphqlErrors);
    assert_eq!(err.graphql_messages().count(), 2);
    assert!(err.message.contains("permission denied"));
}

#[test]
fn test_transport_error_is_returned() {
    let transport = MockTransport::new();
    transport.respond(Err(SdkError::timeout()));

    let err = transport
        .client()
        .query::<Author>()
        .one_by_pk("ABC")
        .returning(["uuid"])
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Timeout);
    assert!(err.is_transport_error());
}

#[test]
fn test_build_error_sends_nothing() {
    let transport = MockTransport::new();

    let err = transport
        .client()
        .query::<Author>()
        .one_by_pk(json!({"id": 1}))
        .returning(["uuid"])
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidOperation);
    assert_eq!(transport.calls(), 0);
}

#[derive(Serialize)]
struct NewAuthor<'a> {
    name: &'a str,
    age: i64,
}

#[test]
fn test_insert_one() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": {"uuid": "N1", "name": "Ann"}}));

    let author = transport
        .client()
        .insert::<Author>()
        .one(NewAuthor {
            name: "Ann",
            age: 40,
        })
        .returning(["uuid", "name"])
        .unwrap();

    assert_eq!(author.uuid.as_deref(), Some("N1"));
    let request = &transport.requests()[0];
    insta::assert_snapshot!(request.query, @"mutation Mutation($object: authors_insert_input!) { op0: insert_authors_one(object: $object) { uuid name } }");
    assert_eq!(request.variables["object"], json!({"name": "Ann", "age": 40}));
}

#[test]
fn test_insert_one_without_record_fails() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": null}));

    let err = transport
        .client()
        .insert::<Author>()
        .on_conflict(json!({"constraint": "authors_pkey", "update_columns": []}))
        .one(json!({"uuid": "ABC"}))
        .returning(columns![])
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InsertFailed);
    let request = &transport.requests()[0];
    assert!(request
        .query
        .contains("$on_conflict: authors_on_conflict"));
}

#[test]
fn test_delete_many_affected_rows() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": {"affected_rows": 3}}));

    let rows = transport
        .client()
        .delete::<Author>()
        .many(json!({"name": {"_eq": "Spam"}}))
        .affected_rows()
        .unwrap();

    assert_eq!(rows, 3);
    let request = &transport.requests()[0];
    insta::assert_snapshot!(request.query, @"mutation Mutation($name: String_comparison_exp) { op0: delete_authors(where: {name: $name}) { affected_rows } }");
    assert_eq!(request.variables["name"], json!({"_eq": "Spam"}));
}

#[test]
fn test_update_many_returning_with_rows() {
    let transport = MockTransport::new();
    transport.respond_data(json!({
        "op0": {"returning": [{"uuid": "A", "age": 31}], "affected_rows": 1}
    }));

    let (authors, rows) = transport
        .client()
        .update::<Author>()
        .many(
            json!({"uuid": {"_eq": "A"}}),
            UpdateOps::new().inc(json!({"age": 1})),
        )
        .returning_with_rows(["uuid", "age"])
        .unwrap();

    assert_eq!(rows, 1);
    assert_eq!(authors[0].age, Some(31));
}

#[test]
fn test_distinct_updates_answer_per_entry() {
    let transport = MockTransport::new();
    transport.respond_data(json!({
        "op0": [{"affected_rows": 2}, {"affected_rows": 0}]
    }));

    let rows = transport
        .client()
        .update::<Author>()
        .many_distinct(vec![
            UpdateEntry::new(
                json!({"age": {"_lt": 18}}),
                UpdateOps::new().set(json!({"name": "minor"})),
            ),
            UpdateEntry::new(
                json!({"age": {"_gt": 120}}),
                UpdateOps::new().set(json!({"name": "unlikely"})),
            ),
        ])
        .affected_rows()
        .unwrap();

    assert_eq!(rows, vec![2, 0]);
    insta::assert_snapshot!(transport.requests()[0].query, @"mutation Mutation($updates: [authors_updates!]!) { op0: update_authors_many(updates: $updates) { affected_rows } }");
}

#[derive(Debug, Deserialize, PartialEq)]
struct ArticleBase {
    likes: Option<i64>,
    title: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct ArticleNumeric {
    likes: Option<f64>,
}

#[test]
fn test_typed_aggregate_fills_only_requested_functions() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": {"aggregate": {"max": {"likes": 12}}}}));

    let aggregate: Aggregate<ArticleBase, ArticleNumeric> = transport
        .client()
        .query::<Article>()
        .aggregate(Conditions::new())
        .on_typed(Aggregates::new().max(["likes"]))
        .unwrap();

    assert_eq!(
        aggregate.max,
        Some(ArticleBase {
            likes: Some(12),
            title: None
        })
    );
    assert!(aggregate.count.is_none());
    assert!(aggregate.avg.is_none());
    insta::assert_snapshot!(transport.requests()[0].query, @"query Query { op0: articles_aggregate { aggregate { max { likes } } } }");
}

#[test]
fn test_count_is_an_integer() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": {"aggregate": {"count": 7}}}));

    let count = transport
        .client()
        .query::<Article>()
        .aggregate(Conditions::new())
        .count()
        .unwrap();

    assert_eq!(count, 7);
}

#[test]
fn test_aggregate_with_nodes() {
    let transport = MockTransport::new();
    transport.respond_data(json!({
        "op0": {
            "aggregate": {"count": 2, "avg": {"likes": 1.5}},
            "nodes": [{"title": "a"}, {"title": "b"}]
        }
    }));

    let (aggregate, articles) = transport
        .client()
        .query::<Article>()
        .aggregate(Conditions::new())
        .with_nodes(Aggregates::new().count().avg(["likes"]), ["title"])
        .unwrap();

    assert_eq!(aggregate.count, Some(2));
    assert_eq!(aggregate.avg.unwrap()["likes"], json!(1.5));
    assert_eq!(articles.len(), 2);
}

#[test]
fn test_typed_aggregate_with_nodes() {
    let transport = MockTransport::new();
    transport.respond_data(json!({
        "op0": {
            "aggregate": {"min": {"likes": 3}, "avg": {"likes": 4.5}},
            "nodes": [{"title": "a"}]
        }
    }));

    let (aggregate, articles): (Aggregate<ArticleBase, ArticleNumeric>, Vec<Article>) = transport
        .client()
        .query::<Article>()
        .aggregate(Conditions::new())
        .with_nodes_typed(Aggregates::new().min(["likes"]).avg(["likes"]), ["title"])
        .unwrap();

    assert_eq!(
        aggregate.min,
        Some(ArticleBase {
            likes: Some(3),
            title: None
        })
    );
    assert_eq!(aggregate.avg, Some(ArticleNumeric { likes: Some(4.5) }));
    assert!(aggregate.max.is_none());
    assert_eq!(articles[0].title.as_deref(), Some("a"));
    insta::assert_snapshot!(transport.requests()[0].query, @"query Query { op0: articles_aggregate { aggregate { avg { likes } min { likes } } nodes { title } } }");
}

#[test]
fn test_function_query() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": [{"uuid": "A"}]}));

    let articles = transport
        .client()
        .query::<Article>()
        .many_function(
            "search_articles",
            json!({"search": "rust", "tags": ["a", "b"]}),
            Conditions::new(),
        )
        .returning(["uuid"])
        .unwrap();

    assert_eq!(articles.len(), 1);
    let request = &transport.requests()[0];
    insta::assert_snapshot!(request.query, @"query Query($args: search_articles_args!) { op0: search_articles(args: $args) { uuid } }");
    assert_eq!(
        request.variables["args"],
        json!({"search": "rust", "tags": "{a,b}"})
    );
}

#[test]
fn test_immediate_yielding_is_already_settled() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": [{"uuid": "A"}, {"uuid": "B"}]}));

    let handle = transport
        .client()
        .query::<Author>()
        .many(Conditions::new())
        .yielding(["uuid"])
        .unwrap();

    assert!(handle.is_fulfilled());
    assert_eq!(handle.iter().unwrap().count(), 2);
    assert_eq!(handle.iter().unwrap().count(), 2);
}

#[tokio::test]
async fn test_returning_async() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": [{"uuid": "A"}]}));

    let authors = transport
        .client()
        .query::<Author>()
        .many(Conditions::new().limit(1))
        .returning_async(["uuid"])
        .await
        .unwrap();

    assert_eq!(authors.len(), 1);
    let request = &transport.requests()[0];
    assert_eq!(request.variables["limit"], json!(1));
}

#[tokio::test]
async fn test_mutation_function_without_record_fails() {
    let transport = MockTransport::new();
    transport.respond_data(json!({"op0": null}));

    let err = transport
        .client()
        .mutation::<Article>()
        .one_function("publish_article", json!({"article_uuid": "A"}))
        .returning_async(["uuid"])
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::MutationFailed);
    assert!(transport.requests()[0].query.starts_with("mutation Mutation("));
}
