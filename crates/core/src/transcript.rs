//! Caption accumulation for short videos.
//!
//! Short-video players surface captions as overlapping, re-rendered
//! snippets rather than a clean stream. The accumulator's job is to
//! keep a small set of distinct fragments and reconstruct a readable
//! transcript from them on demand.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::model::VideoId;

/// Fragments at least this similar are considered the same utterance.
const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Captions idle longer than this belong to an abandoned video.
const STALE_AFTER_MINUTES: i64 = 10;

/// Playback within this many seconds of the end counts as finished.
const COMPLETION_SLACK_SECS: f64 = 1.0;

/// Collects caption fragments for one video and rebuilds a transcript
/// from them.
///
/// Fragments are normalized on the way in and deduplicated against
/// everything already stored, so feeding the same caption repeatedly
/// never grows the set.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptAccumulator {
    video_id: VideoId,
    fragments: Vec<String>,
    last_update: DateTime<Utc>,
    complete: bool,
}

impl TranscriptAccumulator {
    #[must_use]
    pub fn new(video_id: VideoId, now: DateTime<Utc>) -> Self {
        TranscriptAccumulator {
            video_id,
            fragments: Vec::new(),
            last_update: now,
            complete: false,
        }
    }

    #[must_use]
    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True when no caption has arrived for over ten minutes. A stale
    /// accumulator belongs to a video the user wandered away from and
    /// should be replaced, not appended to.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.last_update > Duration::minutes(STALE_AFTER_MINUTES)
    }

    /// Feeds one raw caption read.
    ///
    /// The fragment is normalized first; blank input is ignored. A
    /// fragment contained in a stored one is dropped, a fragment
    /// containing a stored one replaces it, and of two fragments more
    /// than 80% alike only the longer survives.
    pub fn observe(&mut self, raw: &str, now: DateTime<Utc>) {
        let fragment = normalize(raw);
        if fragment.is_empty() {
            return;
        }
        self.last_update = now;

        let fragment_len = fragment.chars().count();
        for stored in &self.fragments {
            if stored.contains(&fragment) {
                return;
            }
            if fragment.contains(stored.as_str()) {
                continue;
            }
            if overlap_ratio(stored, &fragment) > SIMILARITY_THRESHOLD
                && stored.chars().count() >= fragment_len
            {
                return;
            }
        }

        self.fragments.retain(|stored| {
            !fragment.contains(stored.as_str())
                && overlap_ratio(stored, &fragment) <= SIMILARITY_THRESHOLD
        });
        self.fragments.push(fragment);
    }

    /// Feeds a playback position report. Within one second of the end
    /// the transcript is considered complete.
    pub fn observe_progress(&mut self, position_secs: f64, duration_secs: f64) {
        if duration_secs > 0.0 && duration_secs - position_secs <= COMPLETION_SLACK_SECS {
            self.complete = true;
        }
    }

    /// Marks the transcript complete outright, e.g. on a video-ended
    /// event.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Rebuilds a transcript from the stored fragments.
    ///
    /// Fragments are ordered shortest to longest, fragments subsumed
    /// by a longer one are dropped, and the concatenation is cleaned
    /// of stutter: runs of three or more repeated characters shrink to
    /// two, runs of three or more repeated words shrink to one.
    #[must_use]
    pub fn assemble(&self) -> String {
        let mut ordered: Vec<&str> = self.fragments.iter().map(String::as_str).collect();
        ordered.sort_by_key(|fragment| fragment.chars().count());

        let mut kept: Vec<&str> = Vec::new();
        for (i, fragment) in ordered.iter().enumerate() {
            let fragment_len = fragment.chars().count();
            let subsumed = ordered[i + 1..]
                .iter()
                .any(|longer| longer.chars().count() > fragment_len && longer.contains(*fragment));
            if !subsumed {
                kept.push(*fragment);
            }
        }

        collapse_word_runs(&collapse_char_runs(&kept.join(" ")))
    }

    /// Picks between the reconstruction and a single live caption
    /// read, favoring the reconstruction whenever it says more.
    #[must_use]
    pub fn best_transcript(&self, live_caption: &str) -> String {
        let assembled = self.assemble();
        let live = normalize(live_caption);
        if assembled.chars().count() >= live.chars().count() {
            assembled
        } else {
            live
        }
    }
}

/// Canonical form of a caption read: surrounding whitespace trimmed,
/// internal whitespace collapsed, trailing punctuation stripped,
/// lowercased.
fn normalize(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
        .to_lowercase()
}

/// Share of characters the two fragments have in common, counted as a
/// multiset, relative to the longer fragment.
fn overlap_ratio(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let longer = a_len.max(b_len);
    if longer == 0 {
        return 0.0;
    }

    let mut budget: HashMap<char, usize> = HashMap::new();
    for ch in a.chars() {
        *budget.entry(ch).or_insert(0) += 1;
    }
    let mut shared = 0usize;
    for ch in b.chars() {
        if let Some(remaining) = budget.get_mut(&ch) {
            if *remaining > 0 {
                *remaining -= 1;
                shared += 1;
            }
        }
    }
    shared as f64 / longer as f64
}

fn collapse_char_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous: Option<char> = None;
    let mut run = 0usize;
    for ch in text.chars() {
        if previous == Some(ch) {
            run += 1;
        } else {
            previous = Some(ch);
            run = 1;
        }
        if run <= 2 {
            out.push(ch);
        }
    }
    out
}

fn collapse_word_runs(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut previous: Option<&str> = None;
    let mut run = 0usize;
    for word in text.split_whitespace() {
        if previous == Some(word) {
            run += 1;
        } else {
            previous = Some(word);
            run = 1;
        }
        match run {
            1 | 2 => out.push(word),
            3 => {
                out.pop();
                out.pop();
                out.push(word);
            }
            _ => {}
        }
    }
    out.join(" ")
}
