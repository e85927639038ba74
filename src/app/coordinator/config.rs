//! Coordinator configuration
//!
//! Defaults applied to submissions that do not carry their own options.

use std::path::PathBuf;

use crate::app::format::{FormatKind, Quality};
use crate::app::models::JobOptions;
use crate::constants::DEFAULT_PRIORITY;

/// Submission defaults taken from the settings
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub default_format: FormatKind,
    pub default_quality: Quality,
    pub default_priority: i32,
    /// Output directory recorded on submitted jobs; `None` leaves the
    /// runner's configured directory in effect
    pub output_dir: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_format: FormatKind::default(),
            default_quality: Quality::default(),
            default_priority: DEFAULT_PRIORITY,
            output_dir: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_format(mut self, format: FormatKind) -> Self {
        self.default_format = format;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.default_quality = quality;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    /// Options for a submission that specified nothing
    pub fn default_options(&self) -> JobOptions {
        let mut options = JobOptions::new(self.default_format, self.default_quality);
        options.output_dir = self.output_dir.clone();
        options
    }
}
