//! Batch import
//!
//! A plain text file with one URL per line. Blank lines and comment lines are
//! skipped; invalid lines are reported without aborting the import.

use crate::app::models::JobId;
use crate::constants::import::COMMENT_PREFIXES;

/// A line that could not be queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    /// 1-based line number
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// Result of one import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Ids of the jobs created, in file order
    pub added: Vec<JobId>,
    pub rejected: Vec<RejectedLine>,
    /// Blank and comment lines
    pub skipped: usize,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!(
            "{} added, {} rejected, {} skipped",
            self.added.len(),
            self.rejected.len(),
            self.skipped
        )
    }
}

/// Candidate URLs with their 1-based line numbers
pub fn candidate_lines(content: &str) -> (Vec<(usize, &str)>, usize) {
    let mut candidates = Vec::new();
    let mut skipped = 0;
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim().trim_start_matches('\u{feff}');
        if line.is_empty() || COMMENT_PREFIXES.iter().any(|p| line.starts_with(p)) {
            skipped += 1;
        } else {
            candidates.push((index + 1, line));
        }
    }
    (candidates, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_lines_skip_comments_and_blanks() {
        let content = "# my list\nhttps://a.test/1\n\n  ; old\n  https://b.test/2  \nnot a url\n";
        let (candidates, skipped) = candidate_lines(content);
        assert_eq!(
            candidates,
            vec![(2, "https://a.test/1"), (5, "https://b.test/2"), (6, "not a url")]
        );
        assert_eq!(skipped, 3);
    }

    #[test]
    fn test_report_summary() {
        let report = ImportReport {
            added: vec![JobId::new("a")],
            rejected: Vec::new(),
            skipped: 2,
        };
        assert_eq!(report.summary(), "1 added, 0 rejected, 2 skipped");
    }
}
