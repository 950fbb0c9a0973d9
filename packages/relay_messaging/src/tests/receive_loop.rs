use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use mockall::mock;
use tokio::{sync::Notify, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{BrokerErrorKind, HandlerError, TransportErrorKind},
    model::{BankingRequest, Envelope},
    ports::{MessageHandler, QueueTransport},
    queue::InMemoryQueue,
};

use super::support::{banking_request, consumer, wait_until, within, SETTINGS};

mock! {
    Handler {}

    #[async_trait]
    impl MessageHandler<BankingRequest> for Handler {
        async fn handle(&self, message: BankingRequest) -> Result<(), HandlerError>;
    }
}

/// Fails every call and counts them.
struct FailingHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl MessageHandler<BankingRequest> for FailingHandler {
    async fn handle(&self, message: BankingRequest) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(HandlerError::provider("bank unavailable", Some(message.banking_institution_id)))
    }
}

/// Succeeds after yielding, so many handlers overlap.
struct SlowHandler {
    seen: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl MessageHandler<BankingRequest> for SlowHandler {
    async fn handle(&self, message: BankingRequest) -> Result<(), HandlerError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.seen.lock().unwrap().push(message.user_id);
        Ok(())
    }
}

/// Blocks until released.
struct GatedHandler {
    gate: Arc<Notify>,
}

#[async_trait]
impl MessageHandler<BankingRequest> for GatedHandler {
    async fn handle(&self, _message: BankingRequest) -> Result<(), HandlerError> {
        self.gate.notified().await;
        Ok(())
    }
}

/// Claims only the requests of one user.
struct ClaimingHandler {
    user_id: &'static str,
    handled: AtomicUsize,
}

#[async_trait]
impl MessageHandler<BankingRequest> for ClaimingHandler {
    fn claims(&self, message: &BankingRequest) -> bool {
        message.user_id == self.user_id
    }

    async fn handle(&self, message: BankingRequest) -> Result<(), HandlerError> {
        assert_eq!(message.user_id, self.user_id);
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn enqueue(queue: &InMemoryQueue, request: &BankingRequest) {
    queue.send(request.to_body().unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_successful_handler_acknowledges_once() {
    let queue = Arc::new(InMemoryQueue::new("banking-requests"));
    let (consumer, health, metrics) = consumer::<BankingRequest>(&queue);
    let consumer = Arc::new(consumer);
    enqueue(&queue, &banking_request("reus")).await;

    let mut handler = MockHandler::new();
    handler.expect_handle().withf(|request| request.user_id == "reus").once().returning(|_| Ok(()));

    let shutdown = CancellationToken::new();
    let running = {
        let consumer = consumer.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(Arc::new(handler), shutdown).await })
    };

    wait_until(Duration::from_secs(2), || queue.acknowledged() == 1).await;
    shutdown.cancel();
    within(Duration::from_secs(2), running).await.unwrap().unwrap();

    assert!(consumer.drain(Duration::from_secs(1)).await);
    assert_eq!(queue.pending(), 0);
    assert_eq!(metrics.processed(), 1);
    assert!(health.is_healthy());
}

#[tokio::test(start_paused = true)]
async fn test_failed_handler_leaves_message_for_redelivery() {
    let queue = Arc::new(InMemoryQueue::new("banking-requests"));
    let (consumer, _, metrics) = consumer::<BankingRequest>(&queue);
    let consumer = Arc::new(consumer);
    enqueue(&queue, &banking_request("reus")).await;

    let handler = Arc::new(FailingHandler { calls: AtomicUsize::new(0) });
    let started = Instant::now();

    let shutdown = CancellationToken::new();
    let running = {
        let consumer = consumer.clone();
        let handler = handler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(handler, shutdown).await })
    };

    wait_until(Duration::from_secs(60), || handler.calls.load(Ordering::SeqCst) >= 2).await;
    shutdown.cancel();
    within(Duration::from_secs(5), running).await.unwrap().unwrap();

    // The second delivery only happens once the visibility timeout ran out.
    assert!(started.elapsed() >= SETTINGS.visibility_timeout);
    assert_eq!(queue.acknowledged(), 0);
    assert_eq!(queue.pending(), 1);
    assert_eq!(metrics.processed(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatch_acknowledges_every_message() {
    const MESSAGES: usize = 50;

    let queue = Arc::new(InMemoryQueue::new("banking-requests"));
    let (consumer, _, metrics) = consumer::<BankingRequest>(&queue);
    let consumer = Arc::new(consumer);
    for i in 0..MESSAGES {
        enqueue(&queue, &banking_request(&format!("user-{i}"))).await;
    }

    let handler = Arc::new(SlowHandler {
        seen: std::sync::Mutex::new(vec![]),
    });

    let shutdown = CancellationToken::new();
    let running = {
        let consumer = consumer.clone();
        let handler = handler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(handler, shutdown).await })
    };

    wait_until(Duration::from_secs(5), || queue.acknowledged() == MESSAGES).await;
    shutdown.cancel();
    within(Duration::from_secs(2), running).await.unwrap().unwrap();
    assert!(consumer.drain(Duration::from_secs(1)).await);

    let seen: HashSet<String> = handler.seen.lock().unwrap().iter().cloned().collect();
    assert_eq!(seen.len(), MESSAGES);
    assert_eq!(queue.acknowledged(), MESSAGES);
    assert_eq!(metrics.processed(), MESSAGES as u64);
}

#[tokio::test]
async fn test_unparsable_message_is_skipped_and_loop_continues() {
    let queue = Arc::new(InMemoryQueue::new("banking-requests"));
    let (consumer, health, metrics) = consumer::<BankingRequest>(&queue);
    let consumer = Arc::new(consumer);
    queue.send("{not json".to_string()).await.unwrap();
    enqueue(&queue, &banking_request("reus")).await;

    let mut handler = MockHandler::new();
    handler.expect_handle().once().returning(|_| Ok(()));

    let shutdown = CancellationToken::new();
    let running = {
        let consumer = consumer.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(Arc::new(handler), shutdown).await })
    };

    wait_until(Duration::from_secs(2), || queue.acknowledged() == 1).await;
    shutdown.cancel();
    within(Duration::from_secs(2), running).await.unwrap().unwrap();
    assert!(consumer.drain(Duration::from_secs(1)).await);

    assert_eq!(queue.pending_bodies(), vec!["{not json".to_string()]);
    assert_eq!(metrics.processed(), 1);
    assert!(health.is_healthy());
}

#[tokio::test]
async fn test_receive_reports_parse_error_without_acknowledging() {
    let queue = Arc::new(InMemoryQueue::new("banking-requests"));
    let (consumer, _, _) = consumer::<BankingRequest>(&queue);
    queue.send("{not json".to_string()).await.unwrap();

    let error = consumer.receive().await.unwrap_err();

    assert_eq!(error.kind, BrokerErrorKind::Parse);
    assert_eq!(queue.acknowledged(), 0);
    assert_eq!(queue.pending(), 1);
}

#[tokio::test]
async fn test_transport_error_ends_loop_and_marks_unhealthy() {
    let queue = Arc::new(InMemoryQueue::new("banking-requests"));
    let (consumer, health, _) = consumer::<BankingRequest>(&queue);
    queue.fail_next_receives(1);

    let mut handler = MockHandler::new();
    handler.expect_handle().never();
    let handler = Arc::new(handler);

    let error = within(Duration::from_secs(2), consumer.run(handler.clone(), CancellationToken::new()))
        .await
        .unwrap_err();

    assert_eq!(error.kind, BrokerErrorKind::Transport(TransportErrorKind::Receive));
    assert!(!health.is_healthy());
    assert!(health.is_ready());

    // Next successful cycle restores health.
    let shutdown = CancellationToken::new();
    let restarted = {
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.cancel();
        }
    };
    let (result, _) = tokio::join!(consumer.run(handler, shutdown.clone()), restarted);
    result.unwrap();
    assert!(health.is_healthy());
}

#[tokio::test]
async fn test_cancelled_loop_does_not_poll() {
    let queue = Arc::new(InMemoryQueue::new("banking-requests"));
    let (consumer, _, _) = consumer::<BankingRequest>(&queue);
    enqueue(&queue, &banking_request("reus")).await;

    let mut handler = MockHandler::new();
    handler.expect_handle().never();

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    consumer.run(Arc::new(handler), shutdown).await.unwrap();

    assert_eq!(queue.visible(), 1);
}

#[tokio::test]
async fn test_drain_waits_for_in_flight_handlers_within_grace() {
    let queue = Arc::new(InMemoryQueue::new("banking-requests"));
    let (consumer, _, _) = consumer::<BankingRequest>(&queue);
    let consumer = Arc::new(consumer);
    enqueue(&queue, &banking_request("reus")).await;

    let gate = Arc::new(Notify::new());
    let handler = Arc::new(GatedHandler { gate: gate.clone() });

    let shutdown = CancellationToken::new();
    let running = {
        let consumer = consumer.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(handler, shutdown).await })
    };

    wait_until(Duration::from_secs(2), || consumer.in_flight() == 1).await;
    shutdown.cancel();
    within(Duration::from_secs(2), running).await.unwrap().unwrap();

    assert!(!consumer.drain(Duration::from_millis(50)).await);
    assert_eq!(queue.acknowledged(), 0);

    gate.notify_one();
    assert!(consumer.drain(Duration::from_secs(1)).await);
    assert_eq!(queue.acknowledged(), 1);
}

#[tokio::test]
async fn test_unclaimed_message_is_released_immediately() {
    let queue = Arc::new(InMemoryQueue::new("banking-requests"));
    let (consumer, health, metrics) = consumer::<BankingRequest>(&queue);
    let consumer = Arc::new(consumer);
    let unclaimed = banking_request("someone-else");
    enqueue(&queue, &unclaimed).await;
    enqueue(&queue, &banking_request("reus")).await;

    let handler = Arc::new(ClaimingHandler {
        user_id: "reus",
        handled: AtomicUsize::new(0),
    });

    let shutdown = CancellationToken::new();
    let running = {
        let consumer = consumer.clone();
        let handler = handler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(handler, shutdown).await })
    };

    wait_until(Duration::from_secs(2), || queue.acknowledged() == 1).await;
    shutdown.cancel();
    within(Duration::from_secs(2), running).await.unwrap().unwrap();
    assert!(consumer.drain(Duration::from_secs(1)).await);

    assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.processed(), 1);
    // Still there for its owner, and visible without waiting out the visibility timeout.
    assert_eq!(queue.pending_bodies(), vec![unclaimed.to_body().unwrap()]);
    assert_eq!(queue.visible(), 1);
    assert!(health.is_healthy());
}
