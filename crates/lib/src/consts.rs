//! Shared constants.

pub const APP_NAME: &str = "kiln";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of hex characters kept from a SHA-256 digest for artifact signatures (80 bits).
pub const SIGNATURE_LEN: usize = 20;

/// Default name of the project description file.
pub const PROJECT_FILE: &str = "build.lua";

/// Default build directory, relative to the project root.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// File written by the local backend during `configure`.
pub const BUILD_DESCRIPTION_FILE: &str = "kiln.build.json";

/// Suffix appended to an artifact path while a tool is writing it.
pub const PARTIAL_SUFFIX: &str = "tmp";

/// File extensions treated as headers by the scanner.
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "h++", "inl", "ipp", "tpp"];

/// File extensions treated as translation units by the scanner.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++", "m", "mm"];
