use regex::Regex;
use std::sync::OnceLock;

pub const BAR_CELLS: u64 = 10;

const CELL_FILLED: char = '█';
const CELL_PARTIAL: char = '▒';
const CELL_EMPTY: char = '░';

fn checks_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Checks:\s+(\d+) / (\d+)").expect("checks pattern"))
}

fn files_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Transferred:\s+(\d+) / (\d+), (\d+)%").expect("files pattern"))
}

fn size_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"Transferred:\s+([\d.]+\s*[A-Za-z]+) / ([\d.]+\s*[A-Za-z]+), (?:(\d+)%|-), ([\d.]+\s*[A-Za-z]+/s), ETA (\S+)",
        )
        .expect("size pattern")
    })
}

/// Live transfer state for one job, assembled from the tool's stats output.
///
/// Every field is sticky: it keeps its last assigned value until a line
/// matching its shape overwrites it. Lines matching none of the shapes
/// leave the record untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub checked_files: u64,
    pub total_check_files: u64,
    pub transferred_files: u64,
    pub total_files: u64,
    pub file_percent: u64,
    pub transferred_size: String,
    pub total_size: String,
    pub size_percent: u64,
    pub speed: String,
    pub eta: String,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            checked_files: 0,
            total_check_files: 0,
            transferred_files: 0,
            total_files: 0,
            file_percent: 0,
            transferred_size: "0 Bytes".to_string(),
            total_size: "0 Bytes".to_string(),
            size_percent: 0,
            speed: "-".to_string(),
            eta: "-".to_string(),
        }
    }
}

impl ProgressRecord {
    /// Test one output line against the three known shapes, updating any
    /// fields whose shape matched. A line may match more than one shape.
    /// Returns whether anything matched.
    pub fn apply_line(&mut self, line: &str) -> bool {
        let mut matched = false;

        if let Some(caps) = checks_line().captures(line) {
            self.checked_files = parse_u64(&caps[1]);
            self.total_check_files = parse_u64(&caps[2]);
            matched = true;
        }

        if let Some(caps) = files_line().captures(line) {
            self.transferred_files = parse_u64(&caps[1]);
            self.total_files = parse_u64(&caps[2]);
            self.file_percent = parse_u64(&caps[3]);
            matched = true;
        }

        if let Some(caps) = size_line().captures(line) {
            self.transferred_size = caps[1].to_string();
            self.total_size = caps[2].to_string();
            self.size_percent = caps.get(3).map(|m| parse_u64(m.as_str())).unwrap_or(0);
            self.speed = caps[4].to_string();
            self.eta = caps[5].to_string();
            matched = true;
        }

        matched
    }

    pub fn file_bucket(&self) -> u64 {
        (self.file_percent / 10).min(BAR_CELLS)
    }

    pub fn size_bucket(&self) -> u64 {
        (self.size_percent / 10).min(BAR_CELLS)
    }

    pub fn render_bucket(&self) -> u64 {
        self.file_bucket().max(self.size_bucket())
    }

    /// 10-cell bar: fully transferred cells, then cells covered by size
    /// progress only, then empty cells.
    pub fn bar(&self) -> String {
        let filled = self.file_bucket();
        let partial = self.render_bucket() - filled;
        let empty = BAR_CELLS - self.render_bucket();

        let mut bar = String::with_capacity(BAR_CELLS as usize * 3);
        for _ in 0..filled {
            bar.push(CELL_FILLED);
        }
        for _ in 0..partial {
            bar.push(CELL_PARTIAL);
        }
        for _ in 0..empty {
            bar.push(CELL_EMPTY);
        }
        bar
    }
}

fn parse_u64(s: &str) -> u64 {
    s.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_line_updates_check_fields_only() {
        let mut rec = ProgressRecord::default();
        assert!(rec.apply_line("Checks:              12 / 34"));
        assert_eq!(rec.checked_files, 12);
        assert_eq!(rec.total_check_files, 34);
        assert_eq!(rec.transferred_files, 0);
        assert_eq!(rec.speed, "-");
    }

    #[test]
    fn files_line_updates_counts_and_percent() {
        let mut rec = ProgressRecord::default();
        assert!(rec.apply_line("Transferred:            5 / 10, 45%"));
        assert_eq!(rec.transferred_files, 5);
        assert_eq!(rec.total_files, 10);
        assert_eq!(rec.file_percent, 45);
        assert_eq!(rec.file_bucket(), 4);
    }

    #[test]
    fn size_line_updates_size_fields() {
        let mut rec = ProgressRecord::default();
        assert!(rec.apply_line(
            "Transferred:   \t 633.472M / 5.437 GBytes, 11%, 23.282 MBytes/s, ETA 3m31s"
        ));
        assert_eq!(rec.transferred_size, "633.472M");
        assert_eq!(rec.total_size, "5.437 GBytes");
        assert_eq!(rec.size_percent, 11);
        assert_eq!(rec.speed, "23.282 MBytes/s");
        assert_eq!(rec.eta, "3m31s");
    }

    #[test]
    fn size_line_with_dash_percent_reads_as_zero() {
        let mut rec = ProgressRecord::default();
        rec.size_percent = 70;
        assert!(rec.apply_line(
            "Transferred:   0 Bytes / 1.2 GBytes, -, 0 Bytes/s, ETA -"
        ));
        assert_eq!(rec.size_percent, 0);
        assert_eq!(rec.eta, "-");
    }

    #[test]
    fn non_matching_line_leaves_all_fields_untouched() {
        let mut rec = ProgressRecord::default();
        rec.apply_line("Transferred:            5 / 10, 45%");
        let before = rec.clone();
        assert!(!rec.apply_line("2024/01/01 12:00:00 INFO  : copied something"));
        assert_eq!(rec, before);
    }

    #[test]
    fn fields_are_sticky_across_other_shapes() {
        let mut rec = ProgressRecord::default();
        rec.apply_line("Checks:               3 / 12");
        rec.apply_line("Transferred:            5 / 10, 45%");
        // The later checks line must not disturb file counts.
        rec.apply_line("Checks:               4 / 12");
        assert_eq!(rec.checked_files, 4);
        assert_eq!(rec.transferred_files, 5);
        assert_eq!(rec.file_percent, 45);
    }

    #[test]
    fn bar_at_45_percent_has_four_filled_of_ten() {
        let mut rec = ProgressRecord::default();
        rec.apply_line("Transferred:            5 / 10, 45%");
        let bar = rec.bar();
        assert_eq!(bar.chars().count(), 10);
        assert_eq!(bar.chars().filter(|c| *c == '█').count(), 4);
        assert_eq!(bar.chars().filter(|c| *c == '░').count(), 6);
    }

    #[test]
    fn size_ahead_of_files_renders_partial_cells() {
        let mut rec = ProgressRecord::default();
        rec.apply_line("Transferred:            2 / 10, 20%");
        rec.apply_line("Transferred:   1.0 GBytes / 2.0 GBytes, 50%, 10 MBytes/s, ETA 1m");
        assert_eq!(rec.file_bucket(), 2);
        assert_eq!(rec.render_bucket(), 5);
        let bar = rec.bar();
        assert_eq!(bar.chars().count(), 10);
        assert_eq!(bar.chars().filter(|c| *c == '█').count(), 2);
        assert_eq!(bar.chars().filter(|c| *c == '▒').count(), 3);
        assert_eq!(bar.chars().filter(|c| *c == '░').count(), 5);
    }

    #[test]
    fn buckets_clamp_at_ten() {
        let mut rec = ProgressRecord::default();
        rec.file_percent = 100;
        assert_eq!(rec.file_bucket(), 10);
        assert_eq!(rec.bar().chars().count(), 10);
    }
}
