use thiserror::Error;

/// Rejected sphere-mesh parameters.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MeshError {
    #[error("sphere radius must be finite and positive, got {0}")]
    InvalidRadius(f32),
    #[error("stack count must be at least 1, got {0}")]
    TooFewStacks(u32),
    #[error("slice count must be at least 1, got {0}")]
    TooFewSlices(u32),
    #[error("{stacks}x{slices} sphere needs more than u32::MAX indices")]
    IndexOverflow { stacks: u32, slices: u32 },
}
