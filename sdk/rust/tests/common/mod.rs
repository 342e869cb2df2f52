//! Sample models and a recording transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cuckoo_sdk::{
    Client, FieldDef, Model, ModelSchema, RelationDef, Request, Response, SdkError, SdkResult,
    Transport,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn authors() -> &'static ModelSchema {
    &AUTHORS
}

fn author_details() -> &'static ModelSchema {
    &AUTHOR_DETAILS
}

fn articles() -> &'static ModelSchema {
    &ARTICLES
}

fn comments() -> &'static ModelSchema {
    &COMMENTS
}

static AUTHORS: ModelSchema = ModelSchema::new("authors")
    .fields(&[
        FieldDef::new("uuid", "uuid"),
        FieldDef::new("name", "String"),
        FieldDef::new("age", "Int"),
    ])
    .relations(&[
        RelationDef::many("articles", articles),
        RelationDef::one("detail", author_details),
    ])
    .primary_key(&["uuid"]);

static AUTHOR_DETAILS: ModelSchema = ModelSchema::new("author_details")
    .fields(&[
        FieldDef::new("uuid", "uuid"),
        FieldDef::new("author_uuid", "uuid"),
        FieldDef::new("bio", "String"),
    ])
    .relations(&[RelationDef::one("author", authors)])
    .primary_key(&["uuid"]);

static ARTICLES: ModelSchema = ModelSchema::new("articles")
    .fields(&[
        FieldDef::new("uuid", "uuid"),
        FieldDef::new("author_uuid", "uuid"),
        FieldDef::new("title", "String"),
        FieldDef::new("likes", "Int"),
    ])
    .relations(&[
        RelationDef::one("author", authors),
        RelationDef::many("comments", comments),
    ])
    .primary_key(&["uuid"]);

static COMMENTS: ModelSchema = ModelSchema::new("comments")
    .fields(&[
        FieldDef::new("uuid", "uuid"),
        FieldDef::new("article_uuid", "uuid"),
        FieldDef::new("body", "String"),
    ])
    .relations(&[RelationDef::one("article", articles)])
    .primary_key(&["uuid"]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub uuid: Option<String>,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub articles: Option<Vec<Article>>,
    pub detail: Option<AuthorDetail>,
}

impl Model for Author {
    fn schema() -> &'static ModelSchema {
        &AUTHORS
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorDetail {
    pub uuid: Option<String>,
    pub author_uuid: Option<String>,
    pub bio: Option<String>,
}

impl Model for AuthorDetail {
    fn schema() -> &'static ModelSchema {
        &AUTHOR_DETAILS
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub uuid: Option<String>,
    pub author_uuid: Option<String>,
    pub title: Option<String>,
    pub likes: Option<i64>,
    pub comments: Option<Vec<Comment>>,
}

impl Model for Article {
    fn schema() -> &'static ModelSchema {
        &ARTICLES
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub uuid: Option<String>,
    pub article_uuid: Option<String>,
    pub body: Option<String>,
}

impl Model for Comment {
    fn schema() -> &'static ModelSchema {
        &COMMENTS
    }
}

#[derive(Default)]
struct MockState {
    requests: Vec<Request>,
    responses: VecDeque<SdkResult<Response>>,
}

/// Records every request and answers with canned responses in order.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, response: SdkResult<Response>) -> &Self {
        self.state.lock().unwrap().responses.push_back(response);
        self
    }

    pub fn respond_data(&self, data: Value) -> &Self {
        self.respond(Ok(Response::data(data)))
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn client(&self) -> Client {
        Client::with_transport(self.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &Request) -> SdkResult<Response> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        state
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(SdkError::network("no canned response")))
    }
}

/// Accepts requests and never answers them.
#[derive(Clone, Default)]
pub struct StalledTransport {
    calls: Arc<AtomicUsize>,
}

impl StalledTransport {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> Client {
        Client::with_transport(self.clone())
    }
}

#[async_trait]
impl Transport for StalledTransport {
    async fn execute(&self, _request: &Request) -> SdkResult<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
