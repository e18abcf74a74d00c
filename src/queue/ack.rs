//! # Acknowledgement delivery modes.
//!
//! Sources with explicit acknowledgement (a visibility timeout, a pull
//! subscription) pick the delivery guarantee by wrapping their processor:
//!
//! ```text
//! AtMostOnce:  ack(item) ──► process(item)        a crash after ack loses the item
//! AtLeastOnce: process(item) ──► ack(item) on Ok   a crash before ack redelivers it
//! ```
//!
//! A failed acknowledgement is returned as [`AckError`]; the queue runtimes
//! report it as `EventKind::AckFailed`.

use async_trait::async_trait;

use super::consumer::Processor;
use crate::context::Context;
use crate::error::BoxError;

/// Acknowledges items with their source.
#[async_trait]
pub trait Acknowledger<T>: Send + Sync + 'static {
    /// Confirms `item` so the source does not deliver it again.
    async fn ack(&self, ctx: &Context, item: &T) -> Result<(), BoxError>;
}

/// Acknowledging an item failed.
#[derive(Debug, thiserror::Error)]
#[error("ack failed: {0}")]
pub struct AckError(#[source] pub BoxError);

/// Acknowledges before processing.
pub struct AtMostOnce<A, P> {
    acker: A,
    processor: P,
}

impl<A, P> AtMostOnce<A, P> {
    pub fn new(acker: A, processor: P) -> Self {
        Self { acker, processor }
    }
}

#[async_trait]
impl<T, A, P> Processor<T> for AtMostOnce<A, P>
where
    T: Send + Sync + 'static,
    A: Acknowledger<T>,
    P: Processor<T>,
{
    async fn process(&self, ctx: &Context, item: T) -> Result<(), BoxError> {
        self.acker
            .ack(ctx, &item)
            .await
            .map_err(|e| Box::new(AckError(e)) as BoxError)?;
        self.processor.process(ctx, item).await
    }
}

/// Processes first; acknowledges only on success.
pub struct AtLeastOnce<A, P> {
    acker: A,
    processor: P,
}

impl<A, P> AtLeastOnce<A, P> {
    pub fn new(acker: A, processor: P) -> Self {
        Self { acker, processor }
    }
}

#[async_trait]
impl<T, A, P> Processor<T> for AtLeastOnce<A, P>
where
    T: Clone + Send + Sync + 'static,
    A: Acknowledger<T>,
    P: Processor<T>,
{
    async fn process(&self, ctx: &Context, item: T) -> Result<(), BoxError> {
        self.processor.process(ctx, item.clone()).await?;
        self.acker
            .ack(ctx, &item)
            .await
            .map_err(|e| Box::new(AckError(e)) as BoxError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::processor_fn;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Acknowledger<u32> for Journal {
        async fn ack(&self, _ctx: &Context, item: &u32) -> Result<(), BoxError> {
            if self.fail {
                return Err("lease expired".into());
            }
            self.entries.lock().unwrap().push(format!("ack {item}"));
            Ok(())
        }
    }

    fn failing_processor() -> impl Processor<u32> {
        processor_fn(|_ctx: Context, _v: u32| async {
            Err::<(), _>(std::io::Error::other("bad payload"))
        })
    }

    #[tokio::test]
    async fn test_at_most_once_acks_even_when_processing_fails() {
        let p = AtMostOnce::new(Journal::default(), failing_processor());
        let err = p.process(&Context::background(), 7).await.unwrap_err();
        assert!(err.is::<std::io::Error>());
        assert_eq!(*p.acker.entries.lock().unwrap(), vec!["ack 7".to_string()]);
    }

    #[tokio::test]
    async fn test_at_least_once_skips_ack_on_failure() {
        let p = AtLeastOnce::new(Journal::default(), failing_processor());
        assert!(p.process(&Context::background(), 7).await.is_err());
        assert!(p.acker.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ack_failure_is_tagged() {
        let acker = Journal {
            fail: true,
            ..Journal::default()
        };
        let ok = processor_fn(|_ctx: Context, _v: u32| async { Ok::<_, BoxError>(()) });
        let p = AtLeastOnce::new(acker, ok);
        let err = p.process(&Context::background(), 1).await.unwrap_err();
        assert!(err.is::<AckError>());
        assert_eq!(err.to_string(), "ack failed: lease expired");
    }
}
