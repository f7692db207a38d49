// Logging setup for applications embedding the adapters

/// Install a `tracing` fmt subscriber at `level`. Safe to call more than once;
/// later calls (or an already installed global subscriber) are left alone.
pub fn init(level: tracing::Level) {
    if tracing_subscriber::fmt().with_max_level(level).try_init().is_ok() {
        tracing::info!("Logging initialized at {}", level);
    }
}
