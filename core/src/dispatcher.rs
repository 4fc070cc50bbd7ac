//! Dispatcher: routes transport events to the engine and owns each call.
//!
//! A transport adapter reports three events per RPC: call start, message
//! received, stream ended. The dispatcher maps them onto
//! [`Dispatcher::start`], [`Call::on_message`] and [`Call::finish`]. `finish`
//! consumes the [`Call`], so no call outlives its RPC.
//!
//! Calls are independent: each owns its [`Session`] and shares only the
//! immutable [`RuleStore`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mockrpc::{Dispatcher, Message, MessageMatcher, Outcome, Rule, RuleStore};
//! use serde_json::json;
//!
//! let store = RuleStore::builder()
//!     .register(Rule::unary(
//!         "goodbye",
//!         MessageMatcher::Any,
//!         Outcome::message(json!({ "message": "Goodbye" })),
//!     ))
//!     .build()
//!     .unwrap();
//! let dispatcher = Dispatcher::new(Arc::new(store));
//!
//! let reply = dispatcher.unary("goodbye", Message::from(json!({ "message": "Bye" }))).unwrap();
//! assert_eq!(reply, vec![Message::from(json!({ "message": "Goodbye" }))]);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    Advance, CallError, Matcher, Message, Responder, Rule, RuleStore, Session, SessionState,
    StreamType,
};

/// Entry point for calls against one [`RuleStore`].
///
/// Cheap to clone; clones share the store and the call id counter.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<RuleStore>,
    next_id: Arc<AtomicU64>,
    responder: Responder,
}

impl Dispatcher {
    /// Create a dispatcher over a built store.
    #[must_use]
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self {
            store,
            next_id: Arc::new(AtomicU64::new(1)),
            responder: Responder,
        }
    }

    /// The rule store.
    #[must_use]
    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Call start: create the call state for one RPC.
    ///
    /// `method` may be bare (`hello`) or a full gRPC path
    /// (`/greeter.Greeter/hello`). Unknown methods surface as
    /// [`CallError::NotFound`] on the first message or at end of stream.
    #[must_use]
    pub fn start(&self, method: &str, stream_type: StreamType) -> Call {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let span = tracing::debug_span!(
            "call",
            call_id = id,
            method = %method,
            stream_type = %stream_type
        );
        span.in_scope(|| tracing::debug!("call started"));
        Call {
            id,
            store: Arc::clone(&self.store),
            responder: self.responder,
            session: Session::new(method, stream_type),
            method: method.to_owned(),
            span,
        }
    }

    /// One-shot unary call.
    ///
    /// # Errors
    ///
    /// See [`Call::on_message`] and [`Call::finish`].
    pub fn unary(&self, method: &str, message: Message) -> Result<Vec<Message>, CallError> {
        self.call(method, StreamType::Unary, [message])
    }

    /// Run a whole call with all inbound messages known up front.
    ///
    /// Returns every emitted message, in emission order.
    ///
    /// # Errors
    ///
    /// The first error the call hits; messages emitted before it are dropped.
    pub fn call(
        &self,
        method: &str,
        stream_type: StreamType,
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<Vec<Message>, CallError> {
        let mut call = self.start(method, stream_type);
        let mut emitted = Vec::new();
        for message in messages {
            emitted.extend(call.on_message(message)?);
        }
        emitted.extend(call.finish()?);
        Ok(emitted)
    }

    /// Drive one call from channels.
    ///
    /// Reads `inbound` until it closes, forwarding each emission to
    /// `outbound` as soon as it is due. An error is sent as the last item.
    /// Returns early if `outbound` is closed.
    pub async fn serve(
        &self,
        method: &str,
        stream_type: StreamType,
        mut inbound: mpsc::Receiver<Message>,
        outbound: mpsc::Sender<Result<Message, CallError>>,
    ) {
        let mut call = self.start(method, stream_type);

        while let Some(message) = inbound.recv().await {
            match call.on_message(message) {
                Ok(messages) => {
                    for message in messages {
                        if outbound.send(Ok(message)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    let _ = outbound.send(Err(err)).await;
                    return;
                }
            }
        }

        match call.finish() {
            Ok(messages) => {
                for message in messages {
                    if outbound.send(Ok(message)).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                let _ = outbound.send(Err(err)).await;
            }
        }
    }

    /// Spawn [`serve`](Self::serve) on the current tokio runtime.
    pub fn spawn(
        &self,
        method: impl Into<String>,
        stream_type: StreamType,
        inbound: mpsc::Receiver<Message>,
        outbound: mpsc::Sender<Result<Message, CallError>>,
    ) -> tokio::task::JoinHandle<()> {
        let dispatcher = self.clone();
        let method = method.into();
        tokio::spawn(async move {
            dispatcher
                .serve(&method, stream_type, inbound, outbound)
                .await;
        })
    }
}

/// One in-flight RPC.
///
/// Owned by whoever drives the RPC. Dropping it abandons the call.
#[derive(Debug)]
pub struct Call {
    id: u64,
    method: String,
    store: Arc<RuleStore>,
    responder: Responder,
    session: Session,
    span: tracing::Span,
}

impl Call {
    /// Process-unique call id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Method as addressed by the client.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Stream type of the call.
    #[must_use]
    pub fn stream_type(&self) -> StreamType {
        self.session.stream_type()
    }

    /// Session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Number of accepted messages.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.session.cursor()
    }

    /// Messages accepted so far.
    #[must_use]
    pub fn received(&self) -> &[Message] {
        self.session.received()
    }

    /// The rule this call resolved to, once known.
    #[must_use]
    pub fn matched_rule(&self) -> Option<&Arc<Rule>> {
        self.session.rule()
    }

    /// Message received: returns the messages to emit right now.
    ///
    /// # Errors
    ///
    /// - [`CallError::NotFound`] if no rule matches.
    /// - [`CallError::SequenceMismatch`] if the message is out of sequence.
    /// - [`CallError::Configured`] if the resolved rule answers with an error.
    ///
    /// After an error the call is closed: every later event returns the
    /// same error.
    pub fn on_message(&mut self, message: Message) -> Result<Vec<Message>, CallError> {
        let _enter = self.span.enter();
        if let Some(err) = self.session.failure() {
            return Err(err.clone());
        }
        tracing::trace!(step = self.session.cursor(), message = %message, "message received");

        let matcher = Matcher::new(&self.store);
        let result = self
            .session
            .accept(&matcher, message)
            .and_then(|advance| emit(self.responder, advance));
        if let Err(err) = &result {
            report(&matcher, &self.method, &self.session, err);
            self.session.fail(err.clone());
        }
        result
    }

    /// Stream ended: returns the final messages to emit and ends the call.
    ///
    /// # Errors
    ///
    /// - [`CallError::NotFound`] if no rule fits the messages received.
    /// - [`CallError::SequenceMismatch`] if the stream ended early.
    /// - [`CallError::Configured`] if the resolved rule answers with an error.
    /// - The earlier error, if the call already failed.
    pub fn finish(mut self) -> Result<Vec<Message>, CallError> {
        let _enter = self.span.enter();
        if let Some(err) = self.session.failure() {
            return Err(err.clone());
        }
        let matcher = Matcher::new(&self.store);
        let result = self
            .session
            .end(&matcher)
            .and_then(|advance| emit(self.responder, advance));
        match &result {
            Ok(messages) => tracing::debug!(emitted = messages.len(), "call finished"),
            Err(err) => report(&matcher, &self.method, &self.session, err),
        }
        result
    }
}

fn emit(responder: Responder, advance: Advance) -> Result<Vec<Message>, CallError> {
    match advance {
        Advance::Pending | Advance::Done => Ok(Vec::new()),
        Advance::Respond(rule) => responder.respond(&rule).into_result(),
        Advance::Step { rule, index } => Ok(responder.respond_step(&rule, index).into_iter().collect()),
    }
}

fn report(matcher: &Matcher<'_>, method: &str, session: &Session, err: &CallError) {
    match err {
        CallError::Configured(descriptor) => {
            tracing::debug!(code = descriptor.code, "call answered with configured error");
        }
        CallError::NotFound { .. } => {
            tracing::debug!(code = err.code(), error = %err, "call failed");
            if tracing::enabled!(tracing::Level::TRACE) {
                let trace =
                    matcher.find_with_trace(method, session.stream_type(), session.received());
                tracing::trace!(?trace, "rule evaluation");
            }
        }
        CallError::SequenceMismatch { .. } => {
            tracing::debug!(code = err.code(), error = %err, "call failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{status, ErrorDescriptor, Exchange, MessageMatcher, Outcome, RuleStoreBuilder};
    use serde_json::json;

    fn m(text: &str) -> Message {
        Message::from(json!({ "message": text }))
    }

    fn exact(text: &str) -> MessageMatcher {
        MessageMatcher::exact(m(text))
    }

    fn dispatcher() -> Dispatcher {
        let store = RuleStoreBuilder::new()
            .register(Rule::unary("hello", exact("Hello"), Outcome::message(m("Hello"))))
            .register(Rule::unary(
                "hello",
                exact("Hi"),
                Outcome::message(m("A little familar, are't you")),
            ))
            .register(Rule::unary("goodbye", MessageMatcher::Any, Outcome::message(m("Goodbye"))))
            .register(Rule::client_stream(
                "howAreYou",
                vec![exact("Hi"), exact("How are you?")],
                Outcome::message(m("I'm fine, thank you")),
            ))
            .register(Rule::server_stream(
                "niceToMeetYou",
                exact("Hi. I'm John. Nice to meet you"),
                Outcome::Messages(vec![m("Hi, I'm Sana"), m("Nice to meet you too")]),
            ))
            .register(Rule::mutual_stream(
                "chat",
                vec![
                    Exchange { input: exact("Hi"), output: m("Hi there") },
                    Exchange { input: exact("How are you?"), output: m("I'm fine, thank you.") },
                ],
            ))
            .register(Rule::unary(
                "returnsError",
                MessageMatcher::Any,
                Outcome::Error(ErrorDescriptor::new(
                    status::INVALID_ARGUMENT,
                    "Message text is required",
                )),
            ))
            .build()
            .unwrap();
        Dispatcher::new(Arc::new(store))
    }

    #[test]
    fn unary_is_idempotent() {
        let d = dispatcher();
        let first = d.unary("hello", m("Hi")).unwrap();
        let second = d.unary("hello", m("Hi")).unwrap();
        assert_eq!(first, vec![m("A little familar, are't you")]);
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_method_is_unimplemented() {
        let err = dispatcher().unary("nope", m("Hi")).unwrap_err();
        assert_eq!(err.code(), status::UNIMPLEMENTED);
    }

    #[test]
    fn configured_error_regardless_of_input() {
        let d = dispatcher();
        for input in [Message::empty(), m("anything")] {
            let err = d.unary("returnsError", input).unwrap_err();
            assert_eq!(
                err,
                CallError::Configured(ErrorDescriptor::new(3, "Message text is required"))
            );
        }
    }

    #[test]
    fn call_lifecycle() {
        let d = dispatcher();
        let mut call = d.start("/greeter.Greeter/howAreYou", StreamType::ClientStream);
        assert_eq!(call.state(), SessionState::Open);
        assert!(call.on_message(m("Hi")).unwrap().is_empty());
        assert!(call.matched_rule().is_none());
        assert!(call.on_message(m("How are you?")).unwrap().is_empty());
        assert_eq!(call.cursor(), 2);
        assert_eq!(call.finish().unwrap(), vec![m("I'm fine, thank you")]);
    }

    #[test]
    fn client_stream_mismatch_emits_nothing() {
        let err = dispatcher()
            .call("howAreYou", StreamType::ClientStream, [m("How are you?"), m("Hi")])
            .unwrap_err();
        assert!(matches!(err, CallError::SequenceMismatch { step: 0, .. }));
        assert_eq!(err.code(), status::FAILED_PRECONDITION);

        let err = dispatcher()
            .call("chat", StreamType::MutualStream, [m("Bye")])
            .unwrap_err();
        assert!(matches!(err, CallError::SequenceMismatch { step: 0, .. }));

        let err = dispatcher()
            .call("howAreYou", StreamType::MutualStream, [m("Hi")])
            .unwrap_err();
        assert_eq!(err.code(), status::UNIMPLEMENTED);

        let err = dispatcher()
            .call("howAreYou", StreamType::ClientStream, [m("Hi"), m("Hi")])
            .unwrap_err();
        assert_eq!(err.code(), status::FAILED_PRECONDITION);
    }

    #[test]
    fn failed_call_stays_failed() {
        let d = dispatcher();
        let mut call = d.start("hello", StreamType::Unary);
        let err = call.on_message(m("Yo")).unwrap_err();
        assert!(matches!(err, CallError::NotFound { .. }));
        assert_eq!(call.state(), SessionState::Closed);
        assert_eq!(call.on_message(m("Hello")).unwrap_err(), err);
        assert_eq!(call.finish().unwrap_err(), err);

        let mut call = d.start("returnsError", StreamType::Unary);
        let err = call.on_message(m("anything")).unwrap_err();
        assert_eq!(err.code(), status::INVALID_ARGUMENT);
        assert_eq!(call.finish().unwrap_err(), err);

        let mut call = d.start("niceToMeetYou", StreamType::ServerStream);
        call.on_message(m("Hi. I'm John. Nice to meet you")).unwrap();
        let err = call.on_message(m("Again")).unwrap_err();
        assert!(matches!(err, CallError::SequenceMismatch { step: 1, .. }));
        assert_eq!(call.finish().unwrap_err(), err);
    }

    #[test]
    fn server_stream_emits_all_in_order() {
        let out = dispatcher()
            .call(
                "niceToMeetYou",
                StreamType::ServerStream,
                [m("Hi. I'm John. Nice to meet you")],
            )
            .unwrap();
        assert_eq!(out, vec![m("Hi, I'm Sana"), m("Nice to meet you too")]);
    }

    #[test]
    fn mutual_stream_emits_per_step() {
        let d = dispatcher();
        let mut call = d.start("chat", StreamType::MutualStream);
        assert_eq!(call.on_message(m("Hi")).unwrap(), vec![m("Hi there")]);
        assert!(call.matched_rule().is_some());
        assert_eq!(
            call.on_message(m("How are you?")).unwrap(),
            vec![m("I'm fine, thank you.")]
        );
        assert!(call.finish().unwrap().is_empty());
    }

    #[test]
    fn call_ids_are_unique() {
        let d = dispatcher();
        let a = d.start("hello", StreamType::Unary);
        let b = d.clone().start("hello", StreamType::Unary);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn serve_mutual_lockstep() {
        let d = dispatcher();
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let task = d.spawn("chat", StreamType::MutualStream, in_rx, out_tx);

        in_tx.send(m("Hi")).await.unwrap();
        assert_eq!(out_rx.recv().await, Some(Ok(m("Hi there"))));
        in_tx.send(m("How are you?")).await.unwrap();
        assert_eq!(out_rx.recv().await, Some(Ok(m("I'm fine, thank you."))));
        drop(in_tx);

        assert_eq!(out_rx.recv().await, None);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn serve_reports_error_last() {
        let d = dispatcher();
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let task = d.spawn("chat", StreamType::MutualStream, in_rx, out_tx);

        in_tx.send(m("Hi")).await.unwrap();
        in_tx.send(m("Bye")).await.unwrap();
        drop(in_tx);

        assert_eq!(out_rx.recv().await, Some(Ok(m("Hi there"))));
        let Some(Err(err)) = out_rx.recv().await else {
            panic!("expected an error");
        };
        assert_eq!(err.code(), status::FAILED_PRECONDITION);
        assert_eq!(out_rx.recv().await, None);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_calls_do_not_interfere() {
        let d = dispatcher();
        let mut tasks = Vec::new();
        for i in 0..16 {
            let d = d.clone();
            tasks.push(tokio::spawn(async move {
                let (in_tx, in_rx) = mpsc::channel(2);
                let (out_tx, mut out_rx) = mpsc::channel(2);
                let serve = d.spawn("howAreYou", StreamType::ClientStream, in_rx, out_tx);
                if i % 2 == 0 {
                    in_tx.send(m("Hi")).await.unwrap();
                    tokio::task::yield_now().await;
                    in_tx.send(m("How are you?")).await.unwrap();
                } else {
                    in_tx.send(m("Hi")).await.unwrap();
                    tokio::task::yield_now().await;
                    in_tx.send(m("Hi")).await.unwrap();
                }
                drop(in_tx);
                let first = out_rx.recv().await;
                serve.await.unwrap();
                (i, first)
            }));
        }
        for task in tasks {
            let (i, first) = task.await.unwrap();
            if i % 2 == 0 {
                assert_eq!(first, Some(Ok(m("I'm fine, thank you"))));
            } else {
                assert!(matches!(first, Some(Err(CallError::SequenceMismatch { .. }))));
            }
        }
    }
}
