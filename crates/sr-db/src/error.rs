/// Fatal database errors (§7). Neither is retried by this component.
#[derive(Debug)]
pub enum DbReaderError {
    DatabaseUnavailable(clickhouse::error::Error),
    DatabaseQueryFailed {
        start_ns: i64,
        end_ns: i64,
        source: clickhouse::error::Error,
    },
}

impl std::fmt::Display for DbReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseUnavailable(e) => write!(f, "database unavailable: {e}"),
            Self::DatabaseQueryFailed { start_ns, end_ns, source } => write!(
                f,
                "database query failed for range [{start_ns}, {end_ns}]: {source}"
            ),
        }
    }
}

impl std::error::Error for DbReaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DatabaseUnavailable(e) => Some(e),
            Self::DatabaseQueryFailed { source, .. } => Some(source),
        }
    }
}
