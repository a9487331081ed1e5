use indicatif::{ProgressBar, ProgressStyle};
use terraform_indexer::{CrawlProgress, CrawlReport, ProgressSink};

/// Crawl progress on stderr.
pub struct CrawlBar {
    bar: ProgressBar,
}

impl CrawlBar {
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }
}

impl ProgressSink for CrawlBar {
    fn report(&self, progress: &CrawlProgress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.current as u64);
        self.bar.set_message(progress.message());
    }

    fn finish(&self, report: &CrawlReport) {
        self.bar.finish_and_clear();
        log::debug!("Crawl progress closed after {} files", report.files);
    }
}
