use uuid::Uuid;

pub type BatchId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Url,
    TextLink,
    Other,
}

/// One rich-text annotation over a message. Offsets and lengths are UTF-16
/// code units, the Telegram entity convention.
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub offset: usize,
    pub length: usize,
    pub kind: SpanKind,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderJob {
    pub identifier: String,
    pub display_name: String,
}

/// The set of folder jobs parsed from one message. Identifiers are unique;
/// inserting an identifier that is already present overwrites the stored
/// display name but keeps the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobBatch {
    pub title: String,
    jobs: Vec<FolderJob>,
}

impl JobBatch {
    pub fn new(title: String) -> Self {
        Self { title, jobs: vec![] }
    }

    pub fn insert(&mut self, identifier: String, display_name: String) {
        if let Some(existing) = self.jobs.iter_mut().find(|j| j.identifier == identifier) {
            existing.display_name = display_name;
        } else {
            self.jobs.push(FolderJob {
                identifier,
                display_name,
            });
        }
    }

    pub fn jobs(&self) -> &[FolderJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_multi(&self) -> bool {
        self.jobs.len() > 1
    }

    /// Drive path a job lands at: the batch title alone for a single-job
    /// batch, `title/display_name` otherwise.
    pub fn destination_path(&self, job: &FolderJob) -> String {
        if self.is_multi() {
            format!("{}/{}", self.title, job.display_name)
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    AlreadyPresent,
    Success,
    Failure,
}

/// Terminal outcome of one job, immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobResult {
    pub exit_code: i32,
    pub classification: Classification,
}
