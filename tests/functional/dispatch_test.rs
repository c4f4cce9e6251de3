//! Functional tests for request dispatch and admission control

#[path = "../common/mod.rs"]
mod common;

use ai_service_orchestrator::backend::{ServiceKind, ServiceRegistry};
use ai_service_orchestrator::events::{EventBus, OrchestratorEvent};
use ai_service_orchestrator::queue::Dispatcher;
use ai_service_orchestrator::AppError;
use common::{request_for, stub_dispatcher, wait_until, StubBehavior, StubFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_test::{assert_err, assert_ok};

const TIMEOUT: Duration = Duration::from_secs(5);

fn gated(gate: &Arc<Semaphore>) -> StubBehavior {
    StubBehavior {
        gate: Some(gate.clone()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_rejects_before_ready() {
    let factory = StubFactory::new();
    let events = EventBus::new();
    let registry = Arc::new(ServiceRegistry::new(factory, events.clone()));
    let dispatcher = Dispatcher::new(registry, events, 5, TIMEOUT);

    let result = dispatcher
        .submit(ServiceKind::Vision, request_for(ServiceKind::Vision))
        .await;
    assert!(matches!(result, Err(AppError::NotInitialized)));
}

#[tokio::test]
async fn test_unavailable_service_fails_fast_without_admission() {
    let factory = StubFactory::new();
    factory.set_behavior(
        ServiceKind::Vision,
        StubBehavior {
            fail_init: true,
            ..Default::default()
        },
    );
    let (_registry, dispatcher, _events) = stub_dispatcher(factory, 5, TIMEOUT).await;

    let result = dispatcher
        .submit(ServiceKind::Vision, request_for(ServiceKind::Vision))
        .await;
    assert!(matches!(result, Err(AppError::ServiceUnavailable(ServiceKind::Vision))));

    let snapshot = dispatcher.admission_snapshot();
    assert_eq!(snapshot.total_admitted, 0);
    assert_eq!(snapshot.active, 0);
}

#[tokio::test]
async fn test_mismatched_payload_is_rejected() {
    let (_registry, dispatcher, _events) = stub_dispatcher(StubFactory::new(), 5, TIMEOUT).await;

    let result = dispatcher
        .submit(ServiceKind::Speech, request_for(ServiceKind::Vision))
        .await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_sixth_request_waits_for_a_free_slot() {
    let factory = StubFactory::new();
    let gate = Arc::new(Semaphore::new(0));
    factory.set_behavior(ServiceKind::Vision, gated(&gate));
    let (_registry, dispatcher, _events) = stub_dispatcher(factory.clone(), 5, TIMEOUT).await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher
                .submit(ServiceKind::Vision, request_for(ServiceKind::Vision))
                .await
        }));
    }
    wait_until(|| factory.processed().len() == 5).await;
    assert_eq!(dispatcher.admission_snapshot().active, 5);

    let sixth_request = request_for(ServiceKind::Vision);
    let sixth_id = sixth_request.id;
    let sixth = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.submit(ServiceKind::Vision, sixth_request).await })
    };
    wait_until(|| dispatcher.admission_snapshot().queued == 1).await;

    // Queued, not processed, and not counted as active.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(factory.processed().len(), 5);
    let snapshot = dispatcher.admission_snapshot();
    assert_eq!(snapshot.active, 5);
    assert_eq!(snapshot.queued, 1);

    // One completion admits the queued request straight away.
    gate.add_permits(1);
    wait_until(|| factory.processed().len() == 6).await;
    assert_eq!(factory.processed()[5], sixth_id);
    let snapshot = dispatcher.admission_snapshot();
    assert_eq!(snapshot.queued, 0);
    assert_eq!(snapshot.active, 5);

    gate.add_permits(10);
    for handle in handles {
        let response = assert_ok!(handle.await.unwrap());
        assert!(response.success);
    }
    let response = assert_ok!(sixth.await.unwrap());
    assert_eq!(response.id, sixth_id);
    assert_eq!(dispatcher.admission_snapshot().active, 0);
}

#[tokio::test]
async fn test_queued_requests_are_admitted_in_submission_order() {
    let factory = StubFactory::new();
    let gate = Arc::new(Semaphore::new(0));
    factory.set_behavior(ServiceKind::Translation, gated(&gate));
    let (_registry, dispatcher, _events) = stub_dispatcher(factory.clone(), 1, TIMEOUT).await;

    let mut submitted = Vec::new();
    let mut handles = Vec::new();
    for i in 0..6 {
        let request = request_for(ServiceKind::Translation);
        submitted.push(request.id);
        let d = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            d.submit(ServiceKind::Translation, request).await
        }));
        if i == 0 {
            wait_until(|| dispatcher.admission_snapshot().active == 1).await;
        } else {
            wait_until(|| dispatcher.admission_snapshot().queued == i).await;
        }
    }

    gate.add_permits(6);
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    assert_eq!(factory.processed(), submitted);
}

#[tokio::test]
async fn test_active_count_never_exceeds_capacity() {
    let factory = StubFactory::new();
    factory.set_behavior(
        ServiceKind::Recommendation,
        StubBehavior {
            process_delay: Duration::from_millis(10),
            ..Default::default()
        },
    );
    let (_registry, dispatcher, _events) = stub_dispatcher(factory, 3, TIMEOUT).await;

    let sampler = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let mut max_seen = 0;
            for _ in 0..100 {
                let snapshot = dispatcher.admission_snapshot();
                assert!(snapshot.active <= snapshot.max_concurrent);
                max_seen = max_seen.max(snapshot.active);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            max_seen
        })
    };

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .submit(ServiceKind::Recommendation, request_for(ServiceKind::Recommendation))
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }
    let max_seen = sampler.await.unwrap();
    assert!(max_seen <= 3);
    assert_eq!(dispatcher.admission_snapshot().total_admitted, 20);
}

#[tokio::test]
async fn test_processing_failure_becomes_failed_response_and_drains_queue() {
    let factory = StubFactory::new();
    factory.set_behavior(
        ServiceKind::Speech,
        StubBehavior {
            fail_process: true,
            process_delay: Duration::from_millis(50),
            ..Default::default()
        },
    );
    let (_registry, dispatcher, events) = stub_dispatcher(factory, 1, TIMEOUT).await;
    let mut rx = events.subscribe();

    let failing = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .submit(ServiceKind::Speech, request_for(ServiceKind::Speech))
                .await
        })
    };
    wait_until(|| dispatcher.admission_snapshot().active == 1).await;

    let queued = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .submit(ServiceKind::Vision, request_for(ServiceKind::Vision))
                .await
        })
    };

    let failed = assert_ok!(failing.await.unwrap());
    assert!(!failed.success);
    assert!(failed.error_message.unwrap().contains("stub failure"));

    let succeeded = assert_ok!(queued.await.unwrap());
    assert!(succeeded.success);
    assert_eq!(dispatcher.admission_snapshot().active, 0);

    let mut saw_error = false;
    let mut responses = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            OrchestratorEvent::ErrorOccurred { message } => {
                saw_error |= message.contains("stub failure");
            }
            OrchestratorEvent::ResponseReceived(_) => responses += 1,
            OrchestratorEvent::ServiceStatusChanged { .. } => {}
        }
    }
    assert!(saw_error);
    assert_eq!(responses, 2);
}

#[tokio::test]
async fn test_hung_backend_times_out() {
    let factory = StubFactory::new();
    factory.set_behavior(
        ServiceKind::SceneGeneration,
        StubBehavior {
            process_delay: Duration::from_secs(10),
            ..Default::default()
        },
    );
    let (_registry, dispatcher, _events) =
        stub_dispatcher(factory, 2, Duration::from_millis(50)).await;

    let response = assert_ok!(
        dispatcher
            .submit(ServiceKind::SceneGeneration, request_for(ServiceKind::SceneGeneration))
            .await
    );
    assert!(!response.success);
    assert!(response.error_message.unwrap().contains("timed out"));
    assert_eq!(dispatcher.admission_snapshot().active, 0);
}

#[tokio::test]
async fn test_in_flight_request_fails_when_service_restarts() {
    let factory = StubFactory::new();
    let gate = Arc::new(Semaphore::new(0));
    factory.set_behavior(ServiceKind::Vision, gated(&gate));
    let (registry, dispatcher, _events) = stub_dispatcher(factory.clone(), 5, TIMEOUT).await;

    let in_flight = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .submit(ServiceKind::Vision, request_for(ServiceKind::Vision))
                .await
        })
    };
    wait_until(|| factory.processed().len() == 1).await;

    assert_ok!(registry.restart(ServiceKind::Vision).await);
    gate.add_permits(1);

    let result = in_flight.await.unwrap();
    assert!(matches!(result, Err(AppError::ServiceUnavailable(ServiceKind::Vision))));
    assert_eq!(dispatcher.admission_snapshot().active, 0);

    gate.add_permits(1);
    let response = assert_ok!(
        dispatcher
            .submit(ServiceKind::Vision, request_for(ServiceKind::Vision))
            .await
    );
    assert!(response.success);
}

#[tokio::test]
async fn test_restart_does_not_disturb_other_kinds() {
    let factory = StubFactory::new();
    let (registry, dispatcher, _events) = stub_dispatcher(factory.clone(), 5, TIMEOUT).await;

    factory.set_behavior(
        ServiceKind::Vision,
        StubBehavior {
            init_delay: Duration::from_millis(200),
            ..Default::default()
        },
    );

    let restart = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.restart(ServiceKind::Vision).await })
    };
    wait_until(|| !registry.is_available(ServiceKind::Vision)).await;

    let during = dispatcher
        .submit(ServiceKind::Vision, request_for(ServiceKind::Vision))
        .await;
    assert!(matches!(during, Err(AppError::ServiceUnavailable(ServiceKind::Vision))));

    let speech = assert_ok!(
        dispatcher
            .submit(ServiceKind::Speech, request_for(ServiceKind::Speech))
            .await
    );
    assert!(speech.success);

    assert_ok!(restart.await.unwrap());
    assert!(registry.is_available(ServiceKind::Vision));
}

#[tokio::test]
async fn test_rejects_after_shutdown_begins() {
    let (_registry, dispatcher, _events) = stub_dispatcher(StubFactory::new(), 5, TIMEOUT).await;
    dispatcher.begin_shutdown();

    let result = dispatcher
        .submit(ServiceKind::Speech, request_for(ServiceKind::Speech))
        .await;
    assert_err!(&result);
    assert!(matches!(result, Err(AppError::ShuttingDown)));
}
