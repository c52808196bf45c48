//! Parse diagnostics and telemetry for output parsing.
//!
//! [`ParseDiagnostics`] records what happened during output parsing — which
//! strategy was used, whether parsing succeeded, how many retries were
//! attempted, and whether repair or auto-completion was involved. Adapters
//! that post-process raw provider text (e.g. the Local adapter's think-tag
//! stripping) log one of these at `debug` level rather than threading it
//! through [`crate::adapter::AdapterResponse`].

/// Records what happened during output post-processing for one call.
///
/// # Example
///
/// ```
/// use multi_agent_coder::diagnostics::ParseDiagnostics;
///
/// let diag = ParseDiagnostics::default();
/// assert!(diag.ok()); // No parse_error means success
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParseDiagnostics {
    /// Which parse strategy ultimately produced the Value.
    /// e.g. `"lossy"`, `"json"`, `"string_list"`, `"xml_tag"`, `"custom"`.
    pub strategy: Option<&'static str>,

    /// If parsing failed, the error message. `None` means success.
    pub parse_error: Option<String>,

    /// Number of semantic retry attempts (0 = no retries, initial call succeeded
    /// or retry was not configured).
    pub retry_attempts: u32,

    /// Number of transport retries (429, 5xx) before the request succeeded.
    /// 0 = first attempt succeeded.
    pub transport_retries: u32,

    /// Total time spent in backoff delays (milliseconds).
    pub backoff_total_ms: u64,

    /// Whether JSON repair was applied (trailing commas, single quotes, etc.).
    pub repaired: bool,

    /// Whether auto-completion was used (streaming partial parse).
    pub auto_completed: bool,
}

impl ParseDiagnostics {
    /// Quick check: did parsing succeed?
    pub fn ok(&self) -> bool {
        self.parse_error.is_none()
    }
}
