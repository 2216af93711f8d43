use crate::core::errors::ExchangeError;
use crate::core::kernel::reader::PendingRequests;
use crate::core::traits::FrameSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// One serialized request waiting for the connection
#[derive(Debug)]
pub struct Outbound {
    pub id: String,
    pub frame: String,
}

/// Single consumer of the outbound queue.
///
/// Frames reach the wire in enqueue order and are never written
/// concurrently. Enqueueing blocks while the queue is full, up to
/// `enqueue_timeout`.
#[derive(Debug)]
pub struct OutboundWriter {
    queue: mpsc::Sender<Outbound>,
    enqueue_timeout: Duration,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl OutboundWriter {
    pub fn start<S: FrameSink>(
        sink: Arc<S>,
        pending: Arc<PendingRequests>,
        capacity: usize,
        enqueue_timeout: Duration,
        token: CancellationToken,
        name: &str,
    ) -> Self {
        let (queue, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(sink, pending, rx, token.clone(), name.to_string()));

        Self {
            queue,
            enqueue_timeout,
            token,
            task: Mutex::new(Some(task)),
        }
    }

    pub async fn enqueue(&self, outbound: Outbound) -> Result<(), ExchangeError> {
        if self.token.is_cancelled() {
            return Err(ExchangeError::SessionClosed);
        }

        match self.queue.send_timeout(outbound, self.enqueue_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                Err(ExchangeError::Backpressure(self.enqueue_timeout))
            }
            Err(SendTimeoutError::Closed(_)) => Err(ExchangeError::SessionClosed),
        }
    }

    /// Stop accepting frames and wait for the writer task to exit
    pub async fn shutdown(&self) {
        self.token.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                debug!("writer task ended abnormally: {}", e);
            }
        }
    }
}

#[instrument(skip_all, fields(exchange = %name))]
async fn run<S: FrameSink>(
    sink: Arc<S>,
    pending: Arc<PendingRequests>,
    mut rx: mpsc::Receiver<Outbound>,
    token: CancellationToken,
    name: String,
) {
    loop {
        let outbound = tokio::select! {
            biased;
            () = token.cancelled() => break,
            next = rx.recv() => match next {
                Some(outbound) => outbound,
                None => break,
            },
        };

        if !sink.is_live() {
            warn!(id = %outbound.id, "no live connection, dropping outbound frame");
            pending.fail(&outbound.id, ExchangeError::NotConnected);
            continue;
        }

        if let Err(e) = sink.write_text(outbound.frame).await {
            warn!(id = %outbound.id, error = %e, "failed to write outbound frame");
            pending.fail(&outbound.id, e);
        }
    }

    rx.close();
    while let Ok(outbound) = rx.try_recv() {
        pending.fail(&outbound.id, ExchangeError::SessionClosed);
    }
    debug!("outbound writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        frames: std::sync::Mutex<Vec<String>>,
        down: AtomicBool,
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        fn is_live(&self) -> bool {
            !self.down.load(Ordering::SeqCst)
        }

        async fn write_text(&self, frame: String) -> Result<(), ExchangeError> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    struct StalledSink;

    #[async_trait]
    impl FrameSink for StalledSink {
        fn is_live(&self) -> bool {
            true
        }

        async fn write_text(&self, _frame: String) -> Result<(), ExchangeError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn outbound(id: &str) -> Outbound {
        Outbound {
            id: id.to_string(),
            frame: format!("{{\"id\":\"{}\"}}", id),
        }
    }

    #[tokio::test]
    async fn test_frames_written_in_enqueue_order() {
        let sink = Arc::new(RecordingSink::default());
        let writer = OutboundWriter::start(
            sink.clone(),
            Arc::new(PendingRequests::default()),
            8,
            Duration::from_secs(1),
            CancellationToken::new(),
            "test",
        );

        for id in ["r1", "r2", "r3"] {
            writer.enqueue(outbound(id)).await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(1), async {
            while sink.frames.lock().unwrap().len() < 3 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let frames = sink.frames.lock().unwrap().clone();
        assert_eq!(
            frames,
            vec![
                "{\"id\":\"r1\"}".to_string(),
                "{\"id\":\"r2\"}".to_string(),
                "{\"id\":\"r3\"}".to_string()
            ]
        );
        writer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_reports_backpressure() {
        let timeout = Duration::from_millis(200);
        let writer = OutboundWriter::start(
            Arc::new(StalledSink),
            Arc::new(PendingRequests::default()),
            1,
            timeout,
            CancellationToken::new(),
            "test",
        );

        // first frame is taken by the stalled writer, second fills the queue
        writer.enqueue(outbound("a")).await.unwrap();
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        writer.enqueue(outbound("b")).await.unwrap();

        let started = tokio::time::Instant::now();
        let err = writer.enqueue(outbound("c")).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Backpressure(t) if t == timeout));
        assert!(started.elapsed() >= timeout);
    }

    #[tokio::test]
    async fn test_no_connection_fails_waiter() {
        let sink = Arc::new(RecordingSink::default());
        sink.down.store(true, Ordering::SeqCst);
        let pending = Arc::new(PendingRequests::default());
        let writer = OutboundWriter::start(
            sink.clone(),
            pending.clone(),
            8,
            Duration::from_secs(1),
            CancellationToken::new(),
            "test",
        );

        let waiter = pending.register("r1");
        writer.enqueue(outbound("r1")).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ExchangeError::NotConnected)));
        assert!(sink.frames.lock().unwrap().is_empty());
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown() {
        let writer = OutboundWriter::start(
            Arc::new(RecordingSink::default()),
            Arc::new(PendingRequests::default()),
            8,
            Duration::from_secs(1),
            CancellationToken::new(),
            "test",
        );
        writer.shutdown().await;
        writer.shutdown().await;

        assert!(matches!(
            writer.enqueue(outbound("late")).await,
            Err(ExchangeError::SessionClosed)
        ));
    }
}
