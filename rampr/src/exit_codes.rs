#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more thresholds failed.
    ThresholdsFailed = 11,

    /// Ctrl+C ended the run early; every threshold still passed.
    Interrupted = 20,

    /// Invalid CLI flags, scenario file or thresholds.
    InvalidInput = 30,

    /// IO errors, crashed VU tasks, anything not caused by the input.
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// A threshold failure outranks an interruption.
    #[must_use]
    pub fn from_outcome(thresholds_failed: bool, aborted: bool) -> Self {
        match (thresholds_failed, aborted) {
            (true, _) => Self::ThresholdsFailed,
            (false, true) => Self::Interrupted,
            (false, false) => Self::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_win_over_interruption() {
        assert_eq!(ExitCode::from_outcome(false, false), ExitCode::Success);
        assert_eq!(ExitCode::from_outcome(false, true), ExitCode::Interrupted);
        assert_eq!(ExitCode::from_outcome(true, true), ExitCode::ThresholdsFailed);
        assert_eq!(ExitCode::ThresholdsFailed.as_i32(), 11);
    }
}
