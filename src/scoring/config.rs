/// Points awarded per component. The defaults sum to 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub leak: f64,
    pub crack: f64,
    /// All-or-nothing: every marker color must match.
    pub markers: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            leak: 33.4,
            crack: 33.3,
            markers: 33.3,
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.leak + self.crack + self.markers
    }
}
