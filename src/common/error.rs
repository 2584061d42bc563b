//! Error types for pose_planning

use std::fmt;

/// Main error type for the motion planners
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// The start configuration itself is in collision
    StartInCollision,
    /// The target configuration itself is in collision
    TargetInCollision,
    /// The planning budget ran out before the two trees were bridged
    BudgetExhausted { iterations: usize },
    /// Invalid parameter
    InvalidParameter(String),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::StartInCollision => {
                write!(f, "Planning error: start configuration is in collision")
            }
            PlannerError::TargetInCollision => {
                write!(f, "Planning error: target configuration is in collision")
            }
            PlannerError::BudgetExhausted { iterations } => {
                write!(f, "Planning error: no path found within {} iterations", iterations)
            }
            PlannerError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for PlannerError {}

impl PlannerError {
    /// True for the failures caused by a colliding endpoint, which no budget can fix
    pub fn is_endpoint_collision(&self) -> bool {
        matches!(self, PlannerError::StartInCollision | PlannerError::TargetInCollision)
    }
}

/// Result type alias for planning operations
pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlannerError::BudgetExhausted { iterations: 42 };
        assert_eq!(format!("{}", err), "Planning error: no path found within 42 iterations");

        let err = PlannerError::InvalidParameter("x interval is empty".to_string());
        assert_eq!(format!("{}", err), "Invalid parameter: x interval is empty");
    }

    #[test]
    fn test_endpoint_collision_classification() {
        assert!(PlannerError::StartInCollision.is_endpoint_collision());
        assert!(PlannerError::TargetInCollision.is_endpoint_collision());
        assert!(!PlannerError::BudgetExhausted { iterations: 1 }.is_endpoint_collision());
    }
}
