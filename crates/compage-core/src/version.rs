/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version of the JSON documents printed by `scan` and `report`.
/// Bump this when a field is renamed or removed.
pub const SCHEMA_VERSION: u32 = 1;

/// Returns the version string shown by `compage version`.
#[must_use]
pub fn version_string() -> String {
    format!("compage {VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_contains_version() {
        let vs = version_string();
        assert!(vs.starts_with("compage "));
        assert!(vs.ends_with(VERSION));
    }

    #[test]
    fn test_schema_version() {
        assert_eq!(SCHEMA_VERSION, 1);
    }
}
