// Progress bar management using indicatif.
// All bars live under one MultiProgress so they render on separate lines.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs;
use std::sync::Arc;

#[derive(Clone)]
pub struct ProgressManager {
    multi: Option<Arc<MultiProgress>>,
}

impl ProgressManager {
    // Create a new manager. If enabled=false, no bars are created.
    pub fn new(enabled: bool) -> Self {
        let multi = enabled.then(|| Arc::new(MultiProgress::new()));
        Self { multi }
    }

    // Create a bar for file-byte progress with a label.
    pub fn new_file_bar(&self, path: &str, label: &str) -> Option<ProgressBar> {
        let mp = self.multi.as_ref()?;
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let bar = mp.add(ProgressBar::new(size));
        if let Ok(style) = progress_style() {
            bar.set_style(style);
        }
        bar.set_prefix(label.to_string());
        Some(bar)
    }
}

fn progress_style() -> Result<ProgressStyle, indicatif::style::TemplateError> {
    Ok(ProgressStyle::with_template(
        "{prefix:20} {bytes:>10}/{total_bytes:<10} [{bar:50}] {percent:>3}% {msg}",
    )?
    .progress_chars("█ "))
}
