//! Label keys and values shared by counters and histograms

/// Label key for the server role
pub const SERVER: &str = "server";

/// Label key for outcomes
pub const OUTCOME: &str = "outcome";

/// Label key for failure reasons
pub const REASON: &str = "reason";

/// Label key for cached values
pub const VALUE: &str = "value";

pub const SERVER_PRIMARY: &str = "primary";
pub const SERVER_BACKUP: &str = "backup";

pub const OUTCOME_BOUND: &str = "bound";
pub const OUTCOME_INVALID_CREDENTIALS: &str = "invalid_credentials";
pub const OUTCOME_SERVER_UNAVAILABLE: &str = "server_unavailable";

pub const REASON_CONNECT: &str = "connect";
pub const REASON_OPTION: &str = "set_option";
