use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global log subscriber. Later calls are ignored, which matters
/// for tests sharing one process.
pub fn init() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
