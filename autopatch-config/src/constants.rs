/// Placeholder pepper used when none is configured. Startup warns about it.
pub const DEFAULT_PASSWORD_PEPPER: &str = "autopatch-default-pepper-change-me";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://autopatch.db";
pub const DEFAULT_WORKSPACE_ROOT: &str = "./runs";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024;
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 60;
