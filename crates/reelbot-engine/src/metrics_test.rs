use std::sync::{Arc, Mutex};

use chrono::Duration as ChronoDuration;
use reelbot_core::{
    EngagementCounts, ManualClock, MetricsStore, NewReel, RenderMetadata, RetryPolicy,
};

use super::*;
use crate::lifecycle::LifecycleManager;
use crate::memory::MemoryStore;
use crate::publication::PublicationScheduler;
use crate::testing::{clock, media, seed_gym_set, t0, FixedMetrics, ScriptedPublisher};

const HOUR: Duration = Duration::from_secs(3_600);

fn counts() -> EngagementCounts {
    EngagementCounts {
        likes: 80,
        comments: 12,
        shares: 8,
        reach: 2_000,
        saves: 30,
    }
}

/// Publishes one reel per media id at `t0` and returns the store and clock.
async fn published(media_ids: &[&str]) -> (Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryStore::new());
    let clock = clock();
    let lifecycle = LifecycleManager::new(store.clone(), clock.clone(), Vec::new());
    for (i, _) in media_ids.iter().enumerate() {
        let [video, audio, quote] = seed_gym_set(&store);
        let reel = lifecycle
            .create(&NewReel {
                video_id: video.id,
                audio_id: audio.id,
                quote_id: quote.id,
                theme: "motivation".to_string(),
                output_locator: format!("out/{i}.mp4"),
                caption: "No excuses.".to_string(),
                render: RenderMetadata::default(),
            })
            .await
            .unwrap();
        lifecycle
            .approve(reel.id, Some(t0() - ChronoDuration::minutes(1)))
            .await
            .unwrap();
    }
    let publisher = ScriptedPublisher::new(media_ids.iter().map(|id| media(id)).collect());
    PublicationScheduler::new(
        store.clone(),
        publisher,
        clock.clone(),
        RetryPolicy::default(),
        Duration::from_secs(30),
        25,
    )
    .run_cycle()
    .await
    .unwrap();
    (store, clock)
}

fn collector(
    store: &Arc<MemoryStore>,
    clock: &Arc<ManualClock>,
    source: Arc<FixedMetrics>,
) -> MetricsCollector {
    MetricsCollector::new(
        store.clone(),
        source,
        clock.clone(),
        6 * HOUR,
        HOUR,
        Duration::from_secs(10),
    )
}

#[tokio::test]
async fn immature_posts_are_not_collected() {
    let (store, clock) = published(&["m1"]).await;
    let source = FixedMetrics::new(counts());
    clock.advance(ChronoDuration::minutes(30));

    let report = collector(&store, &clock, source.clone()).run_cycle().await.unwrap();
    assert_eq!(report.candidates, 0);
    assert_eq!(*source.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn second_run_in_the_same_bucket_collects_nothing() {
    let (store, clock) = published(&["m1"]).await;
    let source = FixedMetrics::new(counts());
    let collector = collector(&store, &clock, source.clone());
    clock.advance(ChronoDuration::minutes(90));

    let first = collector.run_cycle().await.unwrap();
    assert_eq!(
        first,
        MetricsReport {
            candidates: 1,
            collected: 1,
            ..MetricsReport::default()
        }
    );

    clock.advance(ChronoDuration::minutes(30));
    let second = collector.run_cycle().await.unwrap();
    assert_eq!(second.candidates, 0);
    assert_eq!(*source.calls.lock().unwrap(), 1);

    let post_id = store.published_posts()[0].id;
    let rows = store.list_post_metrics(post_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    // 12:00 + 90 minutes falls in the 12:00-18:00 bucket.
    assert_eq!(rows[0].bucket_start, t0());
    assert_eq!(rows[0].collected_at, t0() + ChronoDuration::minutes(90));
    assert!((rows[0].engagement_rate - 0.05).abs() < 1e-9);
}

#[tokio::test]
async fn next_bucket_collects_a_fresh_snapshot() {
    let (store, clock) = published(&["m1"]).await;
    let collector = collector(&store, &clock, FixedMetrics::new(counts()));

    clock.advance(ChronoDuration::hours(2));
    collector.run_cycle().await.unwrap();
    clock.advance(ChronoDuration::hours(6));
    assert_eq!(collector.run_cycle().await.unwrap().collected, 1);

    let post_id = store.published_posts()[0].id;
    let buckets: Vec<_> = store
        .list_post_metrics(post_id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.bucket_start)
        .collect();
    assert_eq!(buckets, vec![t0(), t0() + ChronoDuration::hours(6)]);
}

#[tokio::test]
async fn failing_media_is_skipped_and_retried_next_run() {
    let (store, clock) = published(&["m1", "m2"]).await;
    let source = Arc::new(FixedMetrics {
        counts: counts(),
        failing: vec!["m1".to_string()],
        calls: Mutex::new(0),
    });
    let collector = collector(&store, &clock, source.clone());
    clock.advance(ChronoDuration::hours(2));

    let report = collector.run_cycle().await.unwrap();
    assert_eq!(report.candidates, 2);
    assert_eq!(report.collected, 1);
    assert_eq!(report.errored, 1);

    // The failed post still has no snapshot in this bucket.
    let again = collector.run_cycle().await.unwrap();
    assert_eq!(again.candidates, 1);
    assert_eq!(again.errored, 1);
}

#[tokio::test]
async fn zero_reach_stores_a_zero_rate() {
    let (store, clock) = published(&["m1"]).await;
    let collector = collector(
        &store,
        &clock,
        FixedMetrics::new(EngagementCounts {
            likes: 4,
            ..EngagementCounts::default()
        }),
    );
    clock.advance(ChronoDuration::hours(2));
    collector.run_cycle().await.unwrap();

    let post_id = store.published_posts()[0].id;
    let rows = store.list_post_metrics(post_id).await.unwrap();
    assert_eq!(rows[0].likes, 4);
    assert!(rows[0].engagement_rate.abs() < f64::EPSILON);
}
