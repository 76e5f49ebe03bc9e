//! Navigation watcher for short-video feeds.
//!
//! Shorts surfaces are single-page apps that fire URL changes in
//! bursts while the user swipes. The observer debounces those bursts
//! and only classifies the URL that is still current once things go
//! quiet, turning raw navigations into [`TabEvent`]s.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use gate_core::model::VideoId;
use gate_core::platform::ShortPage;

use crate::tab::TabEvent;

/// Quiet period a URL must survive before it is inspected.
pub const DEFAULT_NAVIGATION_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct ObserverConfig {
    pub debounce: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_NAVIGATION_DEBOUNCE,
        }
    }
}

/// Consumes raw page URLs and emits a [`TabEvent::ShortOpened`] for
/// each new short, or [`TabEvent::LeftShorts`] when the page stops
/// being one. Returns when either channel closes.
///
/// The debounce is trailing: a burst of navigations collapses to the
/// last URL, so swiping quickly through five shorts counts the one the
/// user lands on, not the four that flashed by.
pub async fn run_platform_observer(
    mut navigations: mpsc::Receiver<String>,
    events: mpsc::Sender<TabEvent>,
    config: ObserverConfig,
) {
    let mut current: Option<VideoId> = None;
    while let Some(first) = navigations.recv().await {
        let mut latest = first;
        let mut closed = false;
        loop {
            match timeout(config.debounce, navigations.recv()).await {
                Ok(Some(url)) => latest = url,
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }
        if !settle(&latest, &mut current, &events).await {
            return;
        }
        if closed {
            return;
        }
    }
}

async fn settle(
    url: &str,
    current: &mut Option<VideoId>,
    events: &mpsc::Sender<TabEvent>,
) -> bool {
    match ShortPage::from_url(url) {
        Some(page) => {
            if current.as_ref() == Some(&page.video) {
                return true;
            }
            debug!(platform = page.platform.label(), video = %page.video, "short detected");
            *current = Some(page.video.clone());
            events
                .send(TabEvent::ShortOpened {
                    platform: page.platform,
                    video: page.video,
                })
                .await
                .is_ok()
        }
        None => {
            if current.take().is_some() {
                debug!(url, "left the shorts feed");
                return events.send(TabEvent::LeftShorts).await.is_ok();
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gate_core::platform::Platform;

    fn spawn_observer() -> (mpsc::Sender<String>, mpsc::Receiver<TabEvent>) {
        let (nav_tx, nav_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(16);
        tokio::spawn(run_platform_observer(
            nav_rx,
            event_tx,
            ObserverConfig::default(),
        ));
        (nav_tx, event_rx)
    }

    fn opened(id: &str) -> TabEvent {
        TabEvent::ShortOpened {
            platform: Platform::YoutubeShorts,
            video: VideoId::new(id).unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_burst_collapses_to_the_last_url() {
        let (nav, mut events) = spawn_observer();

        for id in ["aaa", "bbb", "ccc"] {
            nav.send(format!("https://www.youtube.com/shorts/{id}"))
                .await
                .unwrap();
        }

        assert_eq!(events.recv().await, Some(opened("ccc")));
        drop(nav);
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn settled_navigations_each_emit() {
        let (nav, mut events) = spawn_observer();

        nav.send("https://www.youtube.com/shorts/aaa".into())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        nav.send("https://www.tiktok.com/@sci/video/123".into())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        // a refresh of the same short is not a new one
        nav.send("https://www.tiktok.com/@sci/video/123".into())
            .await
            .unwrap();

        assert_eq!(events.recv().await, Some(opened("aaa")));
        assert_eq!(
            events.recv().await,
            Some(TabEvent::ShortOpened {
                platform: Platform::TikTok,
                video: VideoId::new("123").unwrap(),
            })
        );
        drop(nav);
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_the_feed_is_reported_once() {
        let (nav, mut events) = spawn_observer();

        nav.send("https://www.youtube.com/shorts/aaa".into())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        nav.send("https://www.youtube.com/watch?v=longform".into())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        nav.send("https://example.com/".into()).await.unwrap();

        assert_eq!(events.recv().await, Some(opened("aaa")));
        assert_eq!(events.recv().await, Some(TabEvent::LeftShorts));
        drop(nav);
        assert_eq!(events.recv().await, None);
    }
}
