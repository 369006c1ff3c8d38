// Build-time identity, sent as the HTTP user agent

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `instance-report/<version>`
pub fn user_agent() -> String {
    format!("{}/{}", NAME, VERSION)
}
