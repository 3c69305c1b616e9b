pub const PACKAGE: &str = "roplink";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
