use crate::core::model::JobResult;
use crate::core::progress::ProgressRecord;

/// Rendering input for one job that has started: live while `result` is
/// unset, frozen once it is.
#[derive(Debug, Clone)]
pub struct JobView {
    pub display_name: String,
    pub progress: ProgressRecord,
    pub result: Option<JobResult>,
}

impl JobView {
    pub fn new(display_name: String) -> Self {
        Self {
            display_name,
            progress: ProgressRecord::default(),
            result: None,
        }
    }
}

const COMPLETION_FOOTER: &str = "All transfers finished.";

/// Escape `&`, `<`, `>` for Telegram HTML.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_live_block(view: &JobView, out: &mut String) {
    let p = &view.progress;
    out.push_str(&format!("<b>{}</b>\n", html_escape(&view.display_name)));
    out.push_str(&format!(
        "<code>[{}] {}%</code>\n",
        p.bar(),
        p.render_bucket() * 10
    ));
    out.push_str(&format!(
        "<code>Files: {} / {} ({}%) | Checks: {} / {}</code>\n",
        p.transferred_files, p.total_files, p.file_percent, p.checked_files, p.total_check_files
    ));
    out.push_str(&format!(
        "<code>{} / {} | {} | ETA {}</code>\n",
        p.transferred_size, p.total_size, p.speed, p.eta
    ));
}

fn render_frozen_block(view: &JobView, result: &JobResult, out: &mut String) {
    out.push_str(&format!(
        "{} <b>{}</b> — {}\n",
        result.classification.glyph(),
        html_escape(&view.display_name),
        result.classification.label()
    ));
}

/// Compose the full status message: header, one block per started job
/// (frozen jobs keep their terminal line, the live job shows the bar),
/// and the completion footer once the whole batch is done.
pub fn render_status(title: &str, destination_name: &str, jobs: &[JobView], complete: bool) -> String {
    let mut out = format!(
        "Saving <b>[{}]</b> to <b>[{}]</b>\n",
        html_escape(title),
        html_escape(destination_name)
    );

    for view in jobs {
        out.push('\n');
        match &view.result {
            Some(result) => render_frozen_block(view, result, &mut out),
            None => render_live_block(view, &mut out),
        }
    }

    if complete {
        out.push('\n');
        out.push_str(COMPLETION_FOOTER);
    }

    out
}
