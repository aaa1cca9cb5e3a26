//! Scripted in-process OAuth service that records the order of every call.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use oauth_lifecycle::{HandshakeProgress, OAuthService, ProgressStream};
use parking_lot::Mutex;
use tonic::Status;

/// Dependent call kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Introspect,
    UserInfo,
    Revoke,
}

/// Observable service-side events, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StreamOpened,
    Message(String),
    StreamClosed,
    Issued(Call, String),
    Finished(Call),
}

pub struct ScriptedService {
    script: Mutex<Option<Vec<Result<HandshakeProgress, Status>>>>,
    reject: Option<Status>,
    stream_yields: usize,
    yields: HashMap<Call, usize>,
    failures: HashMap<Call, Status>,
    revoked: Arc<AtomicBool>,
    events: Arc<Mutex<Vec<Event>>>,
}

impl ScriptedService {
    pub fn new(script: Vec<Result<HandshakeProgress, Status>>) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            reject: None,
            stream_yields: 0,
            yields: HashMap::new(),
            failures: HashMap::new(),
            revoked: Arc::new(AtomicBool::new(false)),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The device-login script: prompt, wait, success with `A1`/`R1`.
    pub fn login() -> Self {
        Self::new(login_script("A1", "R1"))
    }

    pub fn rejecting(mut self, status: Status) -> Self {
        self.reject = Some(status);
        self
    }

    pub fn failing(mut self, call: Call, status: Status) -> Self {
        self.failures.insert(call, status);
        self
    }

    /// Scheduler yields before each stream message is delivered.
    pub fn with_stream_yields(mut self, yields: usize) -> Self {
        self.stream_yields = yields;
        self
    }

    /// Scheduler yields between issuing and answering `call`.
    pub fn with_yields(mut self, call: Call, yields: usize) -> Self {
        self.yields.insert(call, yields);
        self
    }

    pub fn events_handle(&self) -> Arc<Mutex<Vec<Event>>> {
        Arc::clone(&self.events)
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    async fn answer(&self, call: Call, token: &str) -> Result<(), Status> {
        self.record(Event::Issued(call, token.to_string()));
        for _ in 0..self.yields.get(&call).copied().unwrap_or(0) {
            tokio::task::yield_now().await;
        }
        self.record(Event::Finished(call));
        match self.failures.get(&call) {
            Some(status) => Err(status.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl OAuthService for ScriptedService {
    async fn authenticate(&self) -> Result<ProgressStream, Status> {
        if let Some(status) = &self.reject {
            return Err(status.clone());
        }
        let script = self
            .script
            .lock()
            .take()
            .ok_or_else(|| Status::failed_precondition("authenticate called twice"))?;
        self.record(Event::StreamOpened);

        let yields = self.stream_yields;
        let on_item = Arc::clone(&self.events);
        let on_close = Arc::clone(&self.events);
        let messages = stream::iter(script).then(move |item| {
            let events = Arc::clone(&on_item);
            async move {
                for _ in 0..yields {
                    tokio::task::yield_now().await;
                }
                if let Ok(progress) = &item {
                    events.lock().push(Event::Message(progress.message.clone()));
                }
                item
            }
        });
        let closed = stream::once(async move {
            on_close.lock().push(Event::StreamClosed);
        })
        .filter_map(|()| async { None::<Result<HandshakeProgress, Status>> });

        Ok(messages.chain(closed).boxed())
    }

    async fn introspect(&self, token: &str) -> Result<bool, Status> {
        self.answer(Call::Introspect, token).await?;
        Ok(!self.revoked.load(Ordering::SeqCst))
    }

    async fn user_info(&self, token: &str) -> Result<String, Status> {
        self.answer(Call::UserInfo, token).await?;
        Ok(format!(r#"{{"sub":"alice","token":"{token}"}}"#))
    }

    async fn revoke(&self, token: &str) -> Result<(), Status> {
        self.answer(Call::Revoke, token).await?;
        self.revoked.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn login_script(access: &str, refresh: &str) -> Vec<Result<HandshakeProgress, Status>> {
    vec![
        Ok(HandshakeProgress::message(
            "Go to https://idp.example.com/device to complete login",
        )),
        Ok(HandshakeProgress::message("Waiting for response...")),
        Ok(HandshakeProgress::message("Success")
            .with_access_token(access)
            .with_refresh_token(refresh)),
    ]
}

pub fn position(events: &[Event], wanted: &Event) -> Option<usize> {
    events.iter().position(|e| e == wanted)
}

pub fn issued(events: &[Event], call: Call) -> Vec<usize> {
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Issued(c, _) if *c == call))
        .map(|(i, _)| i)
        .collect()
}

/// Every dependent call was issued after the stream closed.
pub fn all_issued_after_close(events: &[Event]) -> bool {
    let Some(closed) = position(events, &Event::StreamClosed) else {
        return !events.iter().any(|e| matches!(e, Event::Issued(..)));
    };
    events
        .iter()
        .enumerate()
        .all(|(i, e)| !matches!(e, Event::Issued(..)) || i > closed)
}
