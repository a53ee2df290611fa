use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

pub fn tracing_init() {
    let subscriber = tracing_subscriber::fmt()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_max_level(Level::DEBUG)
        .with_timer(ElapsedMillis::default())
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("a global tracing subscriber is already installed");
    }
}

/// Prints wall-clock time plus milliseconds since start, which makes the gap
/// between the in-flight and the completed snapshot visible.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ElapsedMillis {
    epoch: chrono::DateTime<chrono::offset::Local>,
}

impl Default for ElapsedMillis {
    fn default() -> Self {
        Self {
            epoch: chrono::Local::now(),
        }
    }
}

impl FormatTime for ElapsedMillis {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        let elapsed = now.signed_duration_since(self.epoch).num_milliseconds();
        write!(w, "{} +{:>4}ms", now.format("%H:%M:%S"), elapsed)
    }
}
