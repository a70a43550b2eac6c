use crate::core::model::Classification;
use crate::core::progress::ProgressRecord;

impl Classification {
    pub fn glyph(&self) -> &'static str {
        match self {
            Classification::AlreadyPresent => "☑️",
            Classification::Success => "✅",
            Classification::Failure => "❌",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::AlreadyPresent => "already saved",
            Classification::Success => "saved",
            Classification::Failure => "failed",
        }
    }
}

/// Map a job's terminal (exit code, progress) pair to its classification.
///
/// A clean exit that transferred nothing but checked existing files means
/// the folder content was already at the destination. The exit code wins
/// over any progress the tool reported before failing.
pub fn classify(exit_code: i32, progress: &ProgressRecord) -> Classification {
    if exit_code != 0 {
        return Classification::Failure;
    }
    if progress.file_percent == 0 && progress.checked_files > 0 {
        return Classification::AlreadyPresent;
    }
    Classification::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file_percent: u64, checked_files: u64) -> ProgressRecord {
        ProgressRecord {
            file_percent,
            checked_files,
            ..Default::default()
        }
    }

    #[test]
    fn clean_exit_without_transfers_but_with_checks_is_already_present() {
        assert_eq!(classify(0, &record(0, 3)), Classification::AlreadyPresent);
    }

    #[test]
    fn clean_exit_with_transfers_is_success() {
        assert_eq!(classify(0, &record(80, 0)), Classification::Success);
        assert_eq!(classify(0, &record(80, 5)), Classification::Success);
    }

    #[test]
    fn nonzero_exit_is_failure_regardless_of_percent() {
        assert_eq!(classify(2, &record(80, 0)), Classification::Failure);
        assert_eq!(classify(1, &record(0, 3)), Classification::Failure);
    }
}
