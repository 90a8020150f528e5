// mongovault/src/worker/mod.rs
use std::future::Future;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::debug;

/// Message delivered by a streaming worker. All `Line`s precede the single
/// `Finished`.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent<T> {
    Line(String),
    Finished(T),
}

/// Runs `operation` on its own task and returns a receiver that yields its
/// result exactly once. The caller is never blocked; there is no cancellation.
pub fn spawn<Fut, T>(operation: Fut) -> oneshot::Receiver<T>
where
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (result_tx, result_rx) = oneshot::channel();
    tokio::spawn(async move {
        let result = operation.await;
        if result_tx.send(result).is_err() {
            debug!("Worker result dropped, receiver went away");
        }
    });
    result_rx
}

/// Like [`spawn`], but `operation` receives a line observer. Each line it
/// emits is delivered as [`WorkerEvent::Line`] in order, followed by one
/// [`WorkerEvent::Finished`] carrying the result.
pub fn spawn_streaming<F, Fut, T>(operation: F) -> UnboundedReceiver<WorkerEvent<T>>
where
    F: FnOnce(UnboundedSender<String>) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        let line_events = event_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                if line_events.send(WorkerEvent::Line(line)).is_err() {
                    break;
                }
            }
        });

        let result = operation(line_tx).await;
        // The observer is dropped with the operation, so the forwarder drains
        // the remaining lines and stops before the result is sent.
        let _ = forwarder.await;
        if event_tx.send(WorkerEvent::Finished(result)).is_err() {
            debug!("Worker result dropped, receiver went away");
        }
    });
    event_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::run_command_streaming;
    use std::time::Duration;

    #[tokio::test]
    async fn spawn_delivers_result_once() {
        let rx = spawn(async { 40 + 2 });
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn spawn_does_not_block_the_caller() {
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let mut rx = spawn(async move {
            let _ = release_rx.await;
            "done"
        });

        assert!(rx.try_recv().is_err());
        release_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), rx).await;
        assert_eq!(result.unwrap().unwrap(), "done");
    }

    #[tokio::test]
    async fn streaming_delivers_lines_then_result() {
        let argv: Vec<String> = ["sh", "-c", "echo alpha; echo beta"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut events = spawn_streaming(move |observer| async move {
            run_command_streaming(&argv, None, Some(observer)).await.success
        });

        let mut received = Vec::new();
        while let Some(event) = events.recv().await {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                WorkerEvent::Line("alpha".to_string()),
                WorkerEvent::Line("beta".to_string()),
                WorkerEvent::Finished(true),
            ]
        );
    }

    #[tokio::test]
    async fn streaming_without_lines_still_finishes() {
        let mut events = spawn_streaming(|_observer| async { "quiet" });
        assert_eq!(events.recv().await, Some(WorkerEvent::Finished("quiet")));
        assert_eq!(events.recv().await, None);
    }
}
