use serde::Serialize;

/// What could be scraped about the current short video.
///
/// Extraction is best-effort: any field may be missing, and `quality`
/// records how much of the picture we actually have so callers can
/// decide whether the context is worth sending to a generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    title: Option<String>,
    description: Option<String>,
    author: Option<String>,
    quality: f32,
}

impl VideoMetadata {
    /// Builds metadata from whatever the page yielded. Blank strings
    /// count as missing. Quality is the fraction of fields present.
    #[must_use]
    pub fn new(
        title: Option<String>,
        description: Option<String>,
        author: Option<String>,
    ) -> Self {
        let title = normalize_optional(title);
        let description = normalize_optional(description);
        let author = normalize_optional(author);
        let present = [&title, &description, &author]
            .iter()
            .filter(|field| field.is_some())
            .count();
        VideoMetadata {
            title,
            description,
            author,
            quality: present as f32 / 3.0,
        }
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Fraction of metadata fields that were found, in `0.0..=1.0`.
    #[must_use]
    pub fn quality(&self) -> f32 {
        self.quality
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.author.is_none()
    }
}

/// The bundle a quiz generator receives about the video being watched.
///
/// Serializes with the field names the generation prompt expects, so
/// the JSON can be embedded as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoContext {
    pub title: String,
    pub description: String,
    #[serde(rename = "channelName")]
    pub channel_name: String,
    pub transcript: String,
}

impl VideoContext {
    /// Combines scraped metadata with an accumulated transcript.
    /// Missing metadata fields become empty strings.
    #[must_use]
    pub fn from_parts(metadata: Option<&VideoMetadata>, transcript: String) -> Self {
        VideoContext {
            title: metadata
                .and_then(VideoMetadata::title)
                .unwrap_or_default()
                .to_string(),
            description: metadata
                .and_then(VideoMetadata::description)
                .unwrap_or_default()
                .to_string(),
            channel_name: metadata
                .and_then(VideoMetadata::author)
                .unwrap_or_default()
                .to_string(),
            transcript,
        }
    }

    /// True when there is nothing useful to hand a generator.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.description.is_empty()
            && self.channel_name.is_empty()
            && self.transcript.is_empty()
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|text| {
        let trimmed = text.trim().to_string();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_tracks_present_fields() {
        let full = VideoMetadata::new(
            Some("Krebs cycle in 60 seconds".to_string()),
            Some("A walkthrough of the cycle".to_string()),
            Some("BioShorts".to_string()),
        );
        assert!((full.quality() - 1.0).abs() < f32::EPSILON);

        let partial = VideoMetadata::new(Some("Krebs cycle".to_string()), None, Some("  ".to_string()));
        assert!((partial.quality() - 1.0 / 3.0).abs() < f32::EPSILON);
        assert!(partial.author().is_none());

        assert!((VideoMetadata::default().quality()).abs() < f32::EPSILON);
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let meta = VideoMetadata::new(Some("  ".to_string()), None, None);
        assert!(meta.is_empty());
    }

    #[test]
    fn context_fills_missing_fields_with_empty_strings() {
        let meta = VideoMetadata::new(Some("Krebs cycle".to_string()), None, None);
        let ctx = VideoContext::from_parts(Some(&meta), "acetyl coa enters the cycle".to_string());
        assert_eq!(ctx.title, "Krebs cycle");
        assert_eq!(ctx.description, "");
        assert_eq!(ctx.channel_name, "");
        assert!(!ctx.is_empty());

        let bare = VideoContext::from_parts(None, String::new());
        assert!(bare.is_empty());
    }

    #[test]
    fn context_serializes_with_wire_field_names() {
        let ctx = VideoContext {
            title: "t".to_string(),
            description: "d".to_string(),
            channel_name: "c".to_string(),
            transcript: "x".to_string(),
        };
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"channelName\":\"c\""));
    }
}
