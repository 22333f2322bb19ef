//! Crate-wide error kinds.
//!
//! Every fallible operation in this crate returns one of these five kinds.
//! Recovery is always local to the state machine that produced the error:
//! there is no cross-machine rollback, only retry and the IIR smoothing
//! already built into the BMCA and rate-ratio machinery.

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum GptpError {
    /// A malformed or out-of-sequence message: bad TLV, sequence-id
    /// mismatch, or a self-originated announce looping back. Discarded by
    /// the receiving state machine and logged at debug level.
    #[cfg_attr(feature = "std", error("transient message error: {0}"))]
    TransientMessage(&'static str),

    /// The underlying network device went down, or a port stopped being
    /// operational. The port is dropped to `NotEnabled`, `asCapable` is
    /// cleared, and the change is propagated to the BMCA.
    #[cfg_attr(feature = "std", error("link error on port: {0}"))]
    Link(&'static str),

    /// The local hardware clock could not be read, or a requested
    /// correction exceeded the latency budget `setOffset64` is willing to
    /// apply in one step. The caller continues with best effort and raises
    /// an event flag.
    #[cfg_attr(feature = "std", error("clock access error: {0}"))]
    ClockAccess(&'static str),

    /// Shared memory could not be mapped, or every configured port failed
    /// to open. Fatal: the daemon should exit non-zero.
    #[cfg_attr(feature = "std", error("configuration error: {0}"))]
    Configuration(&'static str),

    /// A registered test-only abnormal-event injection fired (message
    /// skip/duplicate/manipulate/sender-error). Never constructed outside
    /// `#[cfg(test)]` code.
    #[cfg_attr(feature = "std", error("abnormal-event injection: {0}"))]
    AbnormalEventInjection(&'static str),
}

impl GptpError {
    /// Whether this error should bring the owning port down to
    /// `NotEnabled` and clear `asCapable`.
    pub fn is_link_fatal(&self) -> bool {
        matches!(self, GptpError::Link(_))
    }

    /// Whether this error should terminate the daemon.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, GptpError::Configuration(_))
    }
}

pub type Result<T> = core::result::Result<T, GptpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_errors_are_link_fatal_only() {
        assert!(GptpError::Link("devdown").is_link_fatal());
        assert!(!GptpError::TransientMessage("seq gap").is_link_fatal());
    }

    #[test]
    fn configuration_errors_are_startup_fatal_only() {
        assert!(GptpError::Configuration("shm unavailable").is_startup_fatal());
        assert!(!GptpError::ClockAccess("ptpdev unreadable").is_startup_fatal());
    }
}
