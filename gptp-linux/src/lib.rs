pub mod clock;
pub mod config;
pub mod ipc;
pub mod network;
pub mod shared_mem;
pub mod socket;

/// Installs a `tracing_subscriber::fmt` subscriber and bridges `log`
/// records (emitted by `gptp-core`, which only depends on `log`) into it
/// via `tracing-log`, so both crates end up on one output format.
pub fn setup_logging(level: tracing::Level) -> Result<(), tracing_log::log::SetLoggerError> {
    tracing_log::LogTracer::init()?;
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("no global subscriber set yet");
    Ok(())
}
