use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{CompletionClient, CompletionError, CompletionRequest, Delta, DeltaStream};

/// Completion client that replays a fixed script of deltas.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    deltas: Vec<Delta>,
    /// Fail the call itself, before any delta.
    fail_on_open: bool,
    /// Emit an error after this many deltas.
    fail_after: Option<usize>,
    /// Go silent after this many deltas without ending the stream.
    stall_after: Option<usize>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub(crate) fn replying(parts: &[&str]) -> Self {
        Self {
            deltas: parts.iter().map(|p| Delta::text(*p)).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn with_deltas(deltas: Vec<Delta>) -> Self {
        Self {
            deltas,
            ..Default::default()
        }
    }

    pub(crate) fn failing_on_open() -> Self {
        Self {
            fail_on_open: true,
            ..Default::default()
        }
    }

    pub(crate) fn failing_after(parts: &[&str], after: usize) -> Self {
        Self {
            fail_after: Some(after),
            ..Self::replying(parts)
        }
    }

    pub(crate) fn stalling_after(parts: &[&str], after: usize) -> Self {
        Self {
            stall_after: Some(after),
            ..Self::replying(parts)
        }
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, request: CompletionRequest) -> Result<(), CompletionError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(request);
        }
        if self.fail_on_open {
            return Err(upstream_down());
        }
        Ok(())
    }
}

fn upstream_down() -> CompletionError {
    CompletionError::Api {
        status: 503,
        message: "upstream unavailable".into(),
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.record(request)?;
        if self.fail_after.is_some() {
            return Err(upstream_down());
        }
        Ok(self
            .deltas
            .iter()
            .filter_map(|d| d.content.as_deref())
            .collect())
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        self.record(request)?;
        let mut items: Vec<Result<Delta, CompletionError>> = self.deltas.iter().cloned().map(Ok).collect();
        if let Some(after) = self.fail_after {
            items.truncate(after);
            items.push(Err(upstream_down()));
        }
        if let Some(after) = self.stall_after {
            items.truncate(after);
            return Ok(stream::iter(items).chain(stream::pending()).boxed());
        }
        Ok(stream::iter(items).boxed())
    }
}
