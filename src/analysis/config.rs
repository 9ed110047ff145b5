//! Tuning knobs shared by the analyses.

/// Configuration for analyses built by an [`AnalysisManager`](crate::analysis::AnalysisManager).
///
/// The defaults are the values the passes are tuned for; tests lower or raise
/// them to exercise widening and the wraparound guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Number of times a block may be visited before growing ranges are widened to TOP.
    pub widening_threshold: usize,
    /// Arithmetic on operands whose bounds exceed `2^width_limit_bits` in
    /// magnitude yields TOP instead of risking a wrapped result.
    pub width_limit_bits: u32,
    /// How many nested `iszero` wrappers branch narrowing looks through.
    pub max_refinement_depth: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            widening_threshold: 2,
            width_limit_bits: 128,
            max_refinement_depth: 4,
        }
    }
}

impl AnalysisConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the widening threshold.
    #[must_use]
    pub fn with_widening_threshold(mut self, threshold: usize) -> Self {
        self.widening_threshold = threshold;
        self
    }

    /// Sets the width limit in bits.
    #[must_use]
    pub fn with_width_limit_bits(mut self, bits: u32) -> Self {
        self.width_limit_bits = bits;
        self
    }

    /// Sets the narrowing depth.
    #[must_use]
    pub fn with_max_refinement_depth(mut self, depth: usize) -> Self {
        self.max_refinement_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = AnalysisConfig::new();
        assert_eq!(config.widening_threshold, 2);
        assert_eq!(config.width_limit_bits, 128);
        assert_eq!(config.max_refinement_depth, 4);

        let config = config
            .with_widening_threshold(5)
            .with_width_limit_bits(64)
            .with_max_refinement_depth(0);
        assert_eq!(config.widening_threshold, 5);
        assert_eq!(config.width_limit_bits, 64);
        assert_eq!(config.max_refinement_depth, 0);
    }
}
