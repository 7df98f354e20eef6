//! Per-pipe settings inherited along a chain.

/// Longest line the line-oriented stages accept.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Thread name prefix for stage workers.
pub const DEFAULT_STAGE_NAME: &str = "scriptpipe-stage";

/// Settings attached to a Pipe with [`crate::Pipe::with_config`].
///
/// Every Pipe derived from a configured Pipe carries a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeConfig {
    /// Lines longer than this fail the stage with `PipeError::LineTooLong`.
    pub max_line_len: usize,
    /// Worker threads are named `{stage_name}-{id}`.
    pub stage_name: String,
}

impl PipeConfig {
    #[must_use]
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    #[must_use]
    pub fn with_stage_name(mut self, stage_name: impl Into<String>) -> Self {
        self.stage_name = stage_name.into();
        self
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            stage_name: DEFAULT_STAGE_NAME.to_string(),
        }
    }
}
