//! Delivery service: sessions, codestream sources and progressive replay.

use std::sync::Arc;

use jpip_streamer::{
    CodestreamRegistry, DeliveryRequest, DeliveryService, EndReason, LayoutSource, LedgerStore,
    MemorySource, Point, ProgressionOrder, Schedule, SchedulerKind, ServiceError, Size, ViewWindow,
};

use super::test_utils::{assert_contiguous, color_layout, two_tile_layout};

fn service() -> DeliveryService<MemorySource> {
    let source = MemorySource::new()
        .with_layout("strip", two_tile_layout())
        .with_layout("color", color_layout());
    DeliveryService::new(CodestreamRegistry::new(source), LedgerStore::new())
}

fn full(target: &str, size: Size, scheduler: SchedulerKind) -> DeliveryRequest {
    DeliveryRequest::new(target, ViewWindow::full_frame(size)).with_scheduler(scheduler)
}

#[tokio::test]
async fn test_progressive_delivery_under_a_budget() {
    let service = service();
    for kind in SchedulerKind::ALL {
        let session = format!("progressive-{kind}");
        let request = full("color", Size::new(128, 128), kind).with_max_bytes(600);
        let total = service.plan(&full("color", Size::new(128, 128), kind)).await.unwrap().total_bytes();

        let mut responses: Vec<Schedule> = Vec::new();
        loop {
            let schedule = service.deliver(&session, &request).await.unwrap();
            assert!(schedule.total_bytes() <= 600, "{kind}");
            let done = schedule.end_reason == EndReason::WindowDone;
            responses.push(schedule);
            if done {
                break;
            }
            assert!(responses.len() < 10_000, "{kind}: delivery does not terminate");
        }

        let delivered: u64 = responses.iter().map(Schedule::total_bytes).sum();
        assert_eq!(delivered, total, "{kind}");
        let refs: Vec<&Schedule> = responses.iter().collect();
        assert_contiguous(kind.as_str(), &refs);
    }
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let service = service();
    let request = full("strip", Size::new(192, 48), SchedulerKind::Wsf);

    let first = service.deliver("alice", &request).await.unwrap();
    let repeat = service.deliver("alice", &request).await.unwrap();
    let other = service.deliver("bob", &request).await.unwrap();

    assert!(repeat.is_empty());
    assert_eq!(other.total_bytes(), first.total_bytes());
    assert_eq!(service.ledgers().len().await, 2);
}

#[tokio::test]
async fn test_switching_scheduler_starts_over() {
    let service = service();
    let wsf = full("strip", Size::new(192, 48), SchedulerKind::Wsf);
    let cord = full("strip", Size::new(192, 48), SchedulerKind::Cord);

    service.deliver("client", &wsf).await.unwrap();
    let switched = service.deliver("client", &cord).await.unwrap();
    assert!(!switched.is_empty());
    assert!(service.deliver("client", &cord).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_region_then_full_frame() {
    let service = service();
    let region = DeliveryRequest::new(
        "strip",
        ViewWindow::full_frame(Size::new(192, 48))
            .with_region(Point::new(0, 0), Size::new(48, 48)),
    )
    .with_scheduler(SchedulerKind::CpiPass)
    .with_order(ProgressionOrder::Tcpr);
    let whole = full("strip", Size::new(192, 48), SchedulerKind::CpiPass);

    let part = service.deliver("client", &region).await.unwrap();
    let rest = service.deliver("client", &whole).await.unwrap();
    let everything = service.plan(&whole).await.unwrap();

    assert!(part.total_bytes() < everything.total_bytes());
    assert_eq!(part.total_bytes() + rest.total_bytes(), everything.total_bytes());
    assert_contiguous("cpi-pass", &[&part, &rest]);
}

#[tokio::test]
async fn test_unknown_target_and_bad_window() {
    let service = service();
    let missing = full("missing", Size::new(10, 10), SchedulerKind::Wsf);
    assert!(matches!(
        service.deliver("client", &missing).await,
        Err(ServiceError::CodestreamNotFound { .. })
    ));

    let bad = full("strip", Size::new(0, 48), SchedulerKind::Wsf);
    assert!(matches!(service.plan(&bad).await, Err(ServiceError::Schedule(_))));
}

#[tokio::test]
async fn test_concurrent_sessions() {
    let service = Arc::new(service());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let kind = SchedulerKind::ALL[i % SchedulerKind::ALL.len()];
                let request = full("color", Size::new(128, 128), kind);
                service
                    .deliver(&format!("client-{i}"), &request)
                    .await
                    .map(|schedule| schedule.total_bytes())
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().unwrap() > 0);
    }
    assert_eq!(service.registry().cached_count().await, 1);
    assert_eq!(service.ledgers().len().await, 8);
}

#[tokio::test]
async fn test_layout_source_on_disk() {
    let dir = std::env::temp_dir().join(format!("jpip-service-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let json = serde_json::to_string_pretty(&two_tile_layout()).unwrap();
    tokio::fs::write(dir.join("strip.json"), json).await.unwrap();

    let service = DeliveryService::new(CodestreamRegistry::new(LayoutSource::new(&dir)), LedgerStore::new());
    let schedule = service
        .plan(&full("strip", Size::new(96, 24), SchedulerKind::CpiScale))
        .await
        .unwrap();
    assert!(!schedule.is_empty());
    assert_eq!(schedule.scheduler, "cpi-scale");

    let value = serde_json::to_value(&schedule).unwrap();
    assert_eq!(value["end_reason"], "WINDOW_DONE");
    assert_eq!(value["chunks"][0]["payload"]["kind"], "encoded_header");

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
