/// Guest email max length in bytes. `u64` to match validator's length bounds.
pub const MAX_EMAIL_LEN: u64 = 254;

/// Guest display name max length in bytes.
pub const MAX_NAME_LEN: u64 = 256;

/// Widest availability query, in days.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 366 * 5;

/// Widest stay the store will accept, in nights. Policy limits are far tighter.
pub const MAX_STAY_NIGHTS: i64 = 366;

/// Longest accepted request line on the transport, in bytes.
pub const MAX_REQUEST_LINE_LEN: usize = 16 * 1024;
