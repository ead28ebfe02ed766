use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use dl_core::{ChatModel, ChatRequest, Error, Result};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Failure(String),
}

/// Chat model that answers from a queue of canned replies and records every
/// request it receives. Test use only.
pub struct ScriptedModel {
    name: String,
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Reply::Text(text.into()));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Reply::Failure(message.into()));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|replies| replies.len()).unwrap_or(0)
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

impl fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("name", &self.name)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| Error::Inference("scripted model lock poisoned".to_string()))?
            .pop_front();
        match next {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Failure(message)) => Err(Error::Inference(message)),
            None => Err(Error::Inference(format!("{} has no scripted reply left", self.name))),
        }
    }
}
