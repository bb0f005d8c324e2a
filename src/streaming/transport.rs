//! Transport seam between the session controllers and the HTTP client

use crate::error::ApiError;
use crate::translation::{ComparisonRequest, TranslationRequest};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

/// Raw response body, chunked as it arrives from the network
pub(crate) type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Opens translation streams.
///
/// Dropping the returned stream aborts the request and releases the
/// connection.
#[async_trait]
pub(crate) trait StreamTransport: Send + Sync {
    /// Open a stream for one model
    async fn open_single(
        &self,
        token: &str,
        model_id: &str,
        request: &TranslationRequest,
    ) -> Result<ByteStream, ApiError>;

    /// Open one stream carrying interleaved records for both models
    async fn open_dual(
        &self,
        token: &str,
        request: &ComparisonRequest,
    ) -> Result<ByteStream, ApiError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for controller tests

    use super::*;
    use futures_util::StreamExt;
    use std::sync::Mutex;
    use std::time::Duration;

    /// One step of a scripted response body
    #[derive(Debug, Clone)]
    pub(crate) enum Step {
        Bytes(Vec<u8>),
        Delay(Duration),
        Fail(String),
        /// Never yield again (until the session is cancelled)
        Hang,
    }

    impl Step {
        pub(crate) fn text(text: &str) -> Self {
            Step::Bytes(text.as_bytes().to_vec())
        }
    }

    /// Transport that replays a script, or fails to open
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub(crate) steps: Vec<Step>,
        pub(crate) open_error: Option<u16>,
        pub(crate) opened: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(steps: Vec<Step>) -> Self {
            Self {
                steps,
                ..Self::default()
            }
        }

        pub(crate) fn failing(status: u16) -> Self {
            Self {
                open_error: Some(status),
                ..Self::default()
            }
        }

        pub(crate) fn open_count(&self) -> usize {
            self.opened.lock().map(|o| o.len()).unwrap_or_default()
        }

        fn open(&self, label: String) -> Result<ByteStream, ApiError> {
            if let Ok(mut opened) = self.opened.lock() {
                opened.push(label);
            }
            if let Some(status) = self.open_error {
                return Err(ApiError::ServerError {
                    status,
                    message: String::new(),
                });
            }

            let steps = self.steps.clone();
            let stream = futures_util::stream::iter(steps)
                .then(|step| async move {
                    match step {
                        Step::Bytes(bytes) => Some(Ok(Bytes::from(bytes))),
                        Step::Delay(duration) => {
                            tokio::time::sleep(duration).await;
                            None
                        }
                        Step::Fail(message) => Some(Err(ApiError::InvalidResponse(message))),
                        Step::Hang => std::future::pending().await,
                    }
                })
                .filter_map(|item| async move { item });
            Ok(stream.boxed())
        }
    }

    #[async_trait]
    impl StreamTransport for ScriptedTransport {
        async fn open_single(
            &self,
            _token: &str,
            model_id: &str,
            _request: &TranslationRequest,
        ) -> Result<ByteStream, ApiError> {
            self.open(format!("single:{model_id}"))
        }

        async fn open_dual(
            &self,
            _token: &str,
            request: &ComparisonRequest,
        ) -> Result<ByteStream, ApiError> {
            self.open(format!("dual:{}:{}", request.model_a(), request.model_b()))
        }
    }
}
