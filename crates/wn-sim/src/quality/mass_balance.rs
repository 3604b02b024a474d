/// Running constituent mass balance (concentration x ft^3).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MassBalance {
    /// Mass in pipes and tanks at the start of the run.
    pub initial: f64,
    /// Mass added by reservoirs and sources.
    pub inflow: f64,
    /// Mass removed by demands and reservoirs.
    pub outflow: f64,
    /// Mass lost to reactions (negative when reactions produce mass).
    pub reacted: f64,
    /// Mass in pipes and tanks now.
    pub final_mass: f64,
}

impl MassBalance {
    /// `(final + outflow + reacted) / (initial + inflow)`; 1 when nothing
    /// was ever present.
    pub fn ratio(&self) -> f64 {
        let supplied = self.initial + self.inflow;
        if supplied <= 0.0 {
            return 1.0;
        }
        (self.final_mass + self.outflow + self.reacted) / supplied
    }
}
