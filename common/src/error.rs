use thiserror::Error;

pub type Result<T> = std::result::Result<T, FabricError>;

#[derive(Debug, Error)]
pub enum FabricError {
    /// Rejected at setup time; the caller supplied something the engines cannot run with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("not enough {type_name} locations: {needed} blocks, {available} slots")]
    Capacity {
        type_name: String,
        needed: usize,
        available: usize,
    },

    /// Incrementally maintained cost disagrees with a from-scratch recomputation.
    #[error(
        "{what} cost drifted beyond tolerance: incremental {incremental:.6e}, from scratch {from_scratch:.6e}"
    )]
    CostDrift {
        what: &'static str,
        incremental: f64,
        from_scratch: f64,
    },

    #[error("placement state inconsistent: {0}")]
    Placement(String),

    #[error("routing state inconsistent: {0}")]
    Routing(String),

    #[error("malformed record at line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FabricError {
    /// Broken invariants in the incremental bookkeeping, as opposed to bad input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            FabricError::CostDrift { .. } | FabricError::Placement(_) | FabricError::Routing(_)
        )
    }
}

/// Relative tolerance shared by every incremental-vs-scratch cost check.
pub const COST_TOLERANCE: f64 = 0.0025;

/// Fails with [`FabricError::CostDrift`] when `incremental` is not within
/// [`COST_TOLERANCE`] of `from_scratch`.
pub fn check_drift(what: &'static str, incremental: f64, from_scratch: f64) -> Result<()> {
    if (incremental - from_scratch).abs() > from_scratch.abs() * COST_TOLERANCE {
        log::error!(
            "{} cost check failed: incremental {:e}, recomputed {:e}",
            what,
            incremental,
            from_scratch
        );
        return Err(FabricError::CostDrift {
            what,
            incremental,
            from_scratch,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_within_tolerance_passes() {
        assert!(check_drift("bb", 100.2, 100.0).is_ok());
        assert!(check_drift("bb", 0.0, 0.0).is_ok());
    }

    #[test]
    fn drift_beyond_tolerance_is_internal() {
        let err = check_drift("bb", 101.0, 100.0).unwrap_err();
        assert!(err.is_internal());
        assert!(!FabricError::InvalidConfig("fs".into()).is_internal());
    }
}
