use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::thread_pool::ThreadPool;
use crate::{PoolError, Result};

/// A message addressed to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic the message is routed by.
    pub topic: String,
    /// Payload, passed to the handler untouched.
    pub body: String,
}

impl Message {
    /// Creates a message.
    pub fn new(topic: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            body: body.into(),
        }
    }
}

/// A topic handler. Handlers run on pool workers and report their own
/// failures.
pub type Handler = Arc<dyn Fn(Message) + Send + Sync + 'static>;

/// Table mapping topics to the handlers that process their messages.
///
/// Built once and shared read-only with whoever dispatches messages.
#[derive(Clone, Default)]
pub struct Router {
    handlers: HashMap<String, Handler>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic`, replacing any previous one.
    pub fn register<F>(mut self, topic: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.handlers.insert(topic.into(), Arc::new(handler));
        self
    }

    /// Whether a handler is registered for `topic`.
    pub fn contains(&self, topic: &str) -> bool {
        self.handlers.contains_key(topic)
    }

    /// Registered topics, sorted.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    /// Submits the handler call for `message` to `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::UnknownTopic`] if no handler is registered.
    pub fn dispatch<P: ThreadPool>(&self, pool: &P, message: Message) -> Result<()> {
        let handler = self
            .handlers
            .get(&message.topic)
            .cloned()
            .ok_or_else(|| PoolError::UnknownTopic(message.topic.clone()))?;

        debug!("Dispatching message on topic {}", message.topic);
        pool.spawn(move || handler(message));
        Ok(())
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("topics", &self.topics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Runs jobs inline on the calling thread.
    struct InlinePool;

    impl ThreadPool for InlinePool {
        fn new(_threads: u32) -> Result<Self> {
            Ok(InlinePool)
        }

        fn spawn<F>(&self, job: F)
        where
            F: FnOnce() + Send + 'static,
        {
            job()
        }
    }

    #[test]
    fn dispatches_by_topic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let orders = seen.clone();
        let errors = seen.clone();
        let router = Router::new()
            .register("order", move |m: Message| {
                orders.lock().unwrap().push(format!("order:{}", m.body))
            })
            .register("error", move |m: Message| {
                errors.lock().unwrap().push(format!("error:{}", m.body))
            });

        router.dispatch(&InlinePool, Message::new("order", "1")).unwrap();
        router.dispatch(&InlinePool, Message::new("error", "2")).unwrap();
        router.dispatch(&InlinePool, Message::new("order", "3")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["order:1", "error:2", "order:3"]);
        assert_eq!(router.topics(), vec!["error", "order"]);
    }

    #[test]
    fn unknown_topic_is_rejected() {
        let router = Router::new().register("order", |_| {});
        assert!(router.contains("order"));
        assert!(!router.contains("missing"));

        match router.dispatch(&InlinePool, Message::new("missing", "")) {
            Err(PoolError::UnknownTopic(topic)) => assert_eq!(topic, "missing"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
