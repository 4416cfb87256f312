//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use archer_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;
use preset::ScriptStep;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<PresetEvent>,
    finished: bool,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if let Some(event) = this.events.pop_front() {
                let event = match event {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg)
                    }
                    PresetEvent::Finish(reason) => {
                        this.finished = true;
                        ModelResponseEvent::Completed(reason)
                    }
                };
                return Poll::Ready(Ok(Some(event)));
            }
            if !this.finished {
                this.finished = true;
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    ModelFinishReason::Stop,
                ))));
            }
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct Script {
    steps: VecDeque<ScriptStep>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should react to each request. Steps are consumed in order, one per
/// request, regardless of what the request contains. If there are no enough
/// steps in the script, an error will be returned.
///
/// Clones share the same script, so a test can keep one clone to inspect
/// the recorded requests after handing the provider to an agent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().steps.push_back(ScriptStep::Respond(preset));
    }

    #[inline]
    pub fn add_text_response<S: Into<String>>(&mut self, text: S) {
        self.add_response(PresetResponse::with_text(text));
    }

    /// Makes the next unconsumed request fail with `kind`.
    #[inline]
    pub fn add_failure(&mut self, kind: ErrorKind) {
        self.lock().steps.push_back(ScriptStep::Fail(kind));
    }

    /// Makes every response wait `duration` before each event, instead of
    /// the default millisecond.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, oldest first.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of steps that have not been consumed yet.
    #[inline]
    pub fn remaining_steps(&self) -> usize {
        self.lock().steps.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread must not hide the script from others.
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut script = self.lock();
        script.requests.push(req.clone());
        let result = match script.steps.pop_front() {
            Some(ScriptStep::Respond(preset)) => Ok(TestModelResponse {
                events: preset.events.into(),
                finished: false,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            }),
            Some(ScriptStep::Fail(kind)) => Err(Error {
                message: "scripted failure",
                kind,
            }),
            None => Err(Error {
                message: "no enough steps",
                kind: ErrorKind::RateLimitExceeded,
            }),
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use archer_model::ModelMessage;
    use tokio::time::Instant;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ModelFinishReason>) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut reason = None;
        while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap()
        {
            match event {
                ModelResponseEvent::Completed(r) => reason = Some(r),
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
            }
        }
        (msg, reason)
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Hello, ".to_owned()),
            PresetEvent::MessageDelta("world!".to_owned()),
        ]));
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Cut".to_owned()),
            PresetEvent::Finish(ModelFinishReason::Length),
        ]));

        let req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, reason) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");
        assert_eq!(reason, Some(ModelFinishReason::Stop));

        let resp = provider.send_request(&req).await.unwrap();
        let (msg, reason) = collect_response(resp).await;
        assert_eq!(msg, "Cut");
        assert_eq!(reason, Some(ModelFinishReason::Length));

        assert_eq!(provider.requests().len(), 2);
        assert_eq!(provider.remaining_steps(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_paces_events() {
        let mut provider = TestModelProvider::default();
        provider.set_delay(Duration::from_secs(5));
        provider.add_text_response("Slow");

        let started = Instant::now();
        let resp = provider.send_request(&ModelRequest::default()).await.unwrap();
        let (msg, reason) = collect_response(resp).await;
        assert_eq!(msg, "Slow");
        assert_eq!(reason, Some(ModelFinishReason::Stop));
        // One wait for the delta and one for the completion at least.
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_scripted_failure_and_exhaustion() {
        let mut provider = TestModelProvider::default();
        provider.add_failure(ErrorKind::Moderated);
        let observer = provider.clone();

        let req = ModelRequest::default();
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Moderated);

        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

        // Clones observe the same script.
        assert_eq!(observer.requests().len(), 2);
    }
}
