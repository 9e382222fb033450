mod manager;

pub use manager::ValidatedPieceSet;

/// State of a piece slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceState {
    /// Not received yet, or last attempt failed verification
    Missing,
    /// Received and matched its digest
    Verified,
}
