//! Fixtures shared by the engine's unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;
use reelbot_core::{
    parse_themes, Asset, AssetKind, EngagementCounts, ManualClock, NewAsset, PublishResult,
    RenderResult, ThemedCombination, ThemesFile,
};

use crate::collaborators::{
    MetricsError, MetricsSource, PublishError, Publisher, RenderError, Renderer,
};
use crate::memory::MemoryStore;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 13, 12, 0, 0).unwrap()
}

pub(crate) fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0()))
}

pub(crate) fn themes() -> ThemesFile {
    parse_themes(
        "themes:\n  - name: motivation\n    tags: [gym, grind]\n  - name: nature\n    tags: [forest]\n",
    )
    .unwrap()
}

pub(crate) fn add(store: &MemoryStore, kind: AssetKind, locator: &str, tags: &[&str]) -> Asset {
    store.add_asset(
        NewAsset {
            kind,
            locator: locator.to_string(),
            author: None,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            duration_secs: None,
            quality_score: None,
        },
        t0(),
    )
}

/// One asset of each kind tagged `gym`.
pub(crate) fn seed_gym_set(store: &MemoryStore) -> [Asset; 3] {
    [
        add(store, AssetKind::Video, "v/gym.mp4", &["gym"]),
        add(store, AssetKind::Audio, "a/gym.mp3", &["gym"]),
        add(store, AssetKind::Quote, "No excuses.", &["gym"]),
    ]
}

/// Publisher that replays a script of outcomes and records every call.
#[derive(Default)]
pub(crate) struct ScriptedPublisher {
    outcomes: Mutex<VecDeque<Result<PublishResult, PublishError>>>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl ScriptedPublisher {
    pub(crate) fn new(outcomes: Vec<Result<PublishResult, PublishError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub(crate) fn media(id: &str) -> Result<PublishResult, PublishError> {
    Ok(PublishResult {
        external_media_id: id.to_string(),
        permalink: Some(format!("https://www.instagram.com/reel/{id}/")),
    })
}

#[async_trait]
impl Publisher for ScriptedPublisher {
    async fn publish(&self, locator: &str, _caption: &str) -> Result<PublishResult, PublishError> {
        self.calls.lock().unwrap().push(locator.to_string());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PublishError::Permanent("no scripted outcome".to_string())))
    }
}

/// Publisher that parks inside `publish` for one locator until released,
/// then succeeds. Every other locator succeeds at once.
pub(crate) struct GatedPublisher {
    gated: String,
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl GatedPublisher {
    pub(crate) fn new(gated: &str) -> Arc<Self> {
        Arc::new(Self {
            gated: gated.to_string(),
            entered: Notify::new(),
            release: Notify::new(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Publisher for GatedPublisher {
    async fn publish(&self, locator: &str, _caption: &str) -> Result<PublishResult, PublishError> {
        self.calls.lock().unwrap().push(locator.to_string());
        if locator == self.gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
        media(&format!("gated-{locator}"))
    }
}

/// Publisher that never answers.
pub(crate) struct HangingPublisher;

#[async_trait]
impl Publisher for HangingPublisher {
    async fn publish(&self, _locator: &str, _caption: &str) -> Result<PublishResult, PublishError> {
        std::future::pending().await
    }
}

/// Metrics source returning fixed counts, or failing for listed media ids.
pub(crate) struct FixedMetrics {
    pub(crate) counts: EngagementCounts,
    pub(crate) failing: Vec<String>,
    pub(crate) calls: Mutex<usize>,
}

impl FixedMetrics {
    pub(crate) fn new(counts: EngagementCounts) -> Arc<Self> {
        Arc::new(Self {
            counts,
            failing: Vec::new(),
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl MetricsSource for FixedMetrics {
    async fn fetch(&self, external_media_id: &str) -> Result<EngagementCounts, MetricsError> {
        *self.calls.lock().unwrap() += 1;
        if self.failing.iter().any(|id| id == external_media_id) {
            return Err(MetricsError::Unavailable("insights not ready".to_string()));
        }
        Ok(self.counts)
    }
}

/// Renderer that names its output after the combination, or always fails.
pub(crate) struct StubRenderer {
    pub(crate) fail: bool,
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(&self, combo: &ThemedCombination) -> Result<RenderResult, RenderError> {
        if self.fail {
            return Err(RenderError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "ffmpeg crashed".to_string(),
            });
        }
        Ok(RenderResult {
            output_locator: format!(
                "out/{}-{}-{}.mp4",
                combo.video.id, combo.audio.id, combo.quote.id
            ),
            caption: combo.quote.locator.clone(),
            duration_secs: Some(15.0),
            quality_score: None,
            render_time_secs: Some(2.5),
            file_size_bytes: None,
        })
    }
}
