//! Scripted collaborators for unit tests

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use sdk::types::{RetrievedDocument, ScoreOrder};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::events::{EventStream, TurnEvent};
use crate::llm::{LLMError, LLMProvider, ResponseFormat, Result, TextStream};
use crate::store::{self, StoreError, VectorStore};

enum Step {
    Reply(String),
    Fail(LLMError),
    Stream(Vec<String>, Option<LLMError>),
    Hang(Vec<String>),
}

/// Provider that answers calls from a fixed script, in order
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    /// Next call returns `text` (or streams it as one chunk)
    pub fn reply(self, text: &str) -> Self {
        self.push(Step::Reply(text.to_string()))
    }

    /// Next call fails with `error`
    pub fn fail(self, error: LLMError) -> Self {
        self.push(Step::Fail(error))
    }

    /// Next call streams `chunks`
    pub fn stream(self, chunks: &[&str]) -> Self {
        self.push(Step::Stream(chunks.iter().map(|c| c.to_string()).collect(), None))
    }

    /// Next call streams `chunks` and then yields `error`
    pub fn stream_then_fail(self, chunks: &[&str], error: LLMError) -> Self {
        self.push(Step::Stream(
            chunks.iter().map(|c| c.to_string()).collect(),
            Some(error),
        ))
    }

    /// Next call streams `chunks` and then never yields again
    pub fn stream_then_hang(self, chunks: &[&str]) -> Self {
        self.push(Step::Hang(chunks.iter().map(|c| c.to_string()).collect()))
    }

    /// Every prompt received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_step(&self, prompt: &str) -> Step {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Fail(LLMError::ProviderUnavailable("script exhausted".into())))
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn complete(&self, prompt: &str, _format: ResponseFormat) -> Result<String> {
        match self.next_step(prompt) {
            Step::Reply(text) => Ok(text),
            Step::Fail(error) => Err(error),
            Step::Stream(chunks, None) => Ok(chunks.concat()),
            Step::Stream(_, Some(error)) => Err(error),
            Step::Hang(_) => futures::future::pending().await,
        }
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream> {
        let (chunks, error) = match self.next_step(prompt) {
            Step::Reply(text) => (vec![text], None),
            Step::Fail(error) => return Err(error),
            Step::Stream(chunks, error) => (chunks, error),
            Step::Hang(chunks) => {
                let chunks = chunks.into_iter().map(Ok);
                return Ok(stream::iter(chunks).chain(stream::pending()).boxed());
            }
        };

        let items: Vec<Result<String>> = chunks
            .into_iter()
            .map(Ok)
            .chain(error.map(Err))
            .collect();
        Ok(stream::iter(items).boxed())
    }
}

/// Store that returns canned results and records the queries it saw
pub struct StaticStore {
    order: ScoreOrder,
    queued: Mutex<VecDeque<Option<Vec<RetrievedDocument>>>>,
    default: Vec<RetrievedDocument>,
    always_fail: bool,
    missing_collection: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl StaticStore {
    pub fn new(order: ScoreOrder) -> Self {
        Self {
            order,
            queued: Mutex::new(VecDeque::new()),
            default: Vec::new(),
            always_fail: false,
            missing_collection: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Results returned once the queue is exhausted
    pub fn with_results(mut self, docs: Vec<RetrievedDocument>) -> Self {
        self.default = docs;
        self
    }

    /// Next search returns `docs`
    pub fn then(self, docs: Vec<RetrievedDocument>) -> Self {
        self.queued.lock().unwrap().push_back(Some(docs));
        self
    }

    /// Next search fails
    pub fn then_fail(self) -> Self {
        self.queued.lock().unwrap().push_back(None);
        self
    }

    /// Every search fails
    pub fn failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// Every search fails because `collection` does not exist
    pub fn missing_collection(mut self, collection: &str) -> Self {
        self.missing_collection = Some(collection.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for StaticStore {
    fn name(&self) -> &str {
        "static"
    }

    fn score_order(&self) -> ScoreOrder {
        self.order
    }

    async fn similarity_search(
        &self,
        query: &str,
        _k: usize,
    ) -> store::Result<Vec<RetrievedDocument>> {
        self.queries.lock().unwrap().push(query.to_string());

        if let Some(collection) = &self.missing_collection {
            return Err(StoreError::CollectionNotFound(collection.clone()));
        }

        if self.always_fail {
            return Err(StoreError::Unavailable("connection refused".into()));
        }

        match self.queued.lock().unwrap().pop_front() {
            Some(Some(docs)) => Ok(docs),
            Some(None) => Err(StoreError::Unavailable("connection refused".into())),
            None => Ok(self.default.clone()),
        }
    }
}

/// Collect every event currently buffered in `rx`
pub fn drain(rx: &mut EventStream) -> Vec<TurnEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
