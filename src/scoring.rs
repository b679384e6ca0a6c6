/// Weights in percent. They sum to 100 only when performance is measured.
pub const SEO_WEIGHT: u32 = 35;
pub const CONTENT_WEIGHT: u32 = 25;
pub const SECURITY_WEIGHT: u32 = 25;
pub const PERFORMANCE_WEIGHT: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreInputs {
    pub seo: u8,
    pub content: u8,
    pub security: u8,
    pub performance: Option<u8>,
}

/// Weighted overall score, rounded half up.
///
/// A missing performance score drops its term without renormalizing the
/// remaining weights, so an unmeasured site tops out at 85.
pub fn overall_score(inputs: ScoreInputs) -> u8 {
    let mut hundredths = u32::from(inputs.seo) * SEO_WEIGHT
        + u32::from(inputs.content) * CONTENT_WEIGHT
        + u32::from(inputs.security) * SECURITY_WEIGHT;

    if let Some(performance) = inputs.performance {
        hundredths += u32::from(performance) * PERFORMANCE_WEIGHT;
    }

    ((hundredths + 50) / 100).min(100) as u8
}
