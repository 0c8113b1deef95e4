//! Error types for the MRP engine

use thiserror::Error;

/// MRP engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MrpError {
    /// Unknown or unsupported protocol
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),

    /// Port number outside the bridge's port range
    #[error("Invalid port: {0}")]
    InvalidPort(u32),

    /// Attribute index outside the application's range
    #[error("Invalid attribute index: {0}")]
    InvalidAttributeIndex(u16),

    /// Protocol is not globally enabled
    #[error("Protocol not enabled")]
    NotEnabled,

    /// Protocol is not enabled on this port
    #[error("Protocol not enabled on port {0}")]
    PortNotEnabled(u32),

    /// No application registered for the protocol
    #[error("No application registered for {0}")]
    NotRegistered(String),

    /// Attribute table has no free slot
    #[error("Attribute table full")]
    TableFull,

    /// Port creation could not allocate its state
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    /// Timer configuration out of range
    #[error("Invalid timer configuration: {0}")]
    InvalidTimerConfig(String),

    /// Transport rejected a frame
    #[error("Transmit error: {0}")]
    Transmit(String),
}

/// Result type for MRP engine operations
pub type Result<T> = std::result::Result<T, MrpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MrpError::InvalidPort(129);
        assert_eq!(err.to_string(), "Invalid port: 129");
    }

    #[test]
    fn test_error_port_not_enabled() {
        let err = MrpError::PortNotEnabled(3);
        assert_eq!(err.to_string(), "Protocol not enabled on port 3");
    }

    #[test]
    fn test_error_timer_config() {
        let err = MrpError::InvalidTimerConfig("leave below twice join".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid timer configuration: leave below twice join"
        );
    }
}
