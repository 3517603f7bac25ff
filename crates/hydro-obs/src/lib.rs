use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,hydro=debug";

/// Pick the log filter: RUST_LOG first, then the configured filter, then
/// [`DEFAULT_FILTER`]
pub fn resolve_filter(rust_log: Option<String>, configured: Option<&str>) -> String {
    rust_log
        .filter(|f| !f.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Initialize logging.
/// - JSON logs (Cloud Logging friendly) or plain text
/// - RUST_LOG respected; default to "info,hydro=debug"
///
/// Returns false when a global subscriber was already installed.
pub fn init(service_name: &str, json: bool, filter: Option<&str>) -> bool {
    let filter = resolve_filter(std::env::var("RUST_LOG").ok(), filter);
    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init().is_ok()
    };

    if installed {
        tracing::info!(service = %service_name, json, filter = %filter, "Observability initialized");
    }
    installed
}
