use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quizzes fire after this many shorts unless the user says otherwise.
pub const DEFAULT_QUIZ_FREQUENCY: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("quiz frequency must be at least 1, got {0}")]
    FrequencyOutOfRange(u32),
}

/// User-facing knobs for the gate, validated.
///
/// `quiz_frequency` is the number of shorts watched between quizzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSettings {
    enabled: bool,
    quiz_frequency: u32,
}

impl GateSettings {
    /// Rebuilds settings from a persisted row.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::FrequencyOutOfRange`] when the stored
    /// frequency is zero.
    pub fn from_persisted(enabled: bool, quiz_frequency: u32) -> Result<Self, SettingsError> {
        GateSettingsDraft {
            enabled,
            quiz_frequency,
        }
        .validate()
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn quiz_frequency(&self) -> u32 {
        self.quiz_frequency
    }

    /// Same settings with the gate switched on or off.
    #[must_use]
    pub fn with_enabled(self, enabled: bool) -> Self {
        GateSettings { enabled, ..self }
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        GateSettings {
            enabled: true,
            quiz_frequency: DEFAULT_QUIZ_FREQUENCY,
        }
    }
}

/// Unvalidated settings, as they arrive from a settings screen or a
/// storage row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSettingsDraft {
    pub enabled: bool,
    pub quiz_frequency: u32,
}

impl GateSettingsDraft {
    /// # Errors
    ///
    /// Returns [`SettingsError::FrequencyOutOfRange`] when
    /// `quiz_frequency` is zero.
    pub fn validate(self) -> Result<GateSettings, SettingsError> {
        if self.quiz_frequency == 0 {
            return Err(SettingsError::FrequencyOutOfRange(self.quiz_frequency));
        }
        Ok(GateSettings {
            enabled: self.enabled,
            quiz_frequency: self.quiz_frequency,
        })
    }
}

impl Default for GateSettingsDraft {
    fn default() -> Self {
        let defaults = GateSettings::default();
        GateSettingsDraft {
            enabled: defaults.enabled,
            quiz_frequency: defaults.quiz_frequency,
        }
    }
}
