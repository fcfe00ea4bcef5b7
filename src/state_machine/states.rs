use serde::{Deserialize, Serialize};
use std::fmt;

/// Transfer item states as stored in `transfer_job_items.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferItemState {
    /// Created by a job submission, waiting for a batch
    #[default]
    Pending,
    /// A batch worker is applying the transfer
    Processing,
    /// Company is a member of the target collection
    Success,
    /// The transfer attempt failed; eligible for retry
    Error,
    /// Withdrawn by a job cancellation. Terminal: the orchestrator never batches it
    /// again and retry ignores it. Cancellation is advisory, though, so a
    /// batch dispatched before the cancel still accepts `Start` and drives the item to
    /// `success` or `error`.
    Cancelled,
}

impl TransferItemState {
    /// All states, in the order status counts are reported
    pub const ALL: [TransferItemState; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Success,
        Self::Error,
        Self::Cancelled,
    ];

    /// Check if no further automatic processing occurs from this state.
    ///
    /// `Cancelled` counts as terminal even though an in-flight batch may still start it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }

    /// Check if this is an error state that allows retry
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Check if this is an active state (item is being processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid transfer item state: {s}")),
        }
    }
}
