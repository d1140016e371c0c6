//! Telemetry error types

/// Why a telemetry cycle did not reach the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    /// Serialized payload larger than the fixed buffer
    PayloadOverflow,
    /// Broker session not connected when the cycle ran
    SessionDown,
    /// Broker rejected or failed the publish
    PublishFailed,
}

impl core::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PayloadOverflow => write!(f, "Payload overflow"),
            Self::SessionDown => write!(f, "Broker session down"),
            Self::PublishFailed => write!(f, "Publish failed"),
        }
    }
}

impl core::error::Error for TelemetryError {}
