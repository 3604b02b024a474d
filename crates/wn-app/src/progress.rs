#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    LoadingNetwork,
    CheckingCache,
    LoadingCachedResult,
    Compiling,
    RunningHydraulics,
    RunningQuality,
    SavingResults,
    Completed,
}

impl RunStage {
    pub fn label(self) -> &'static str {
        match self {
            RunStage::LoadingNetwork => "load",
            RunStage::CheckingCache => "cache",
            RunStage::LoadingCachedResult => "cached",
            RunStage::Compiling => "compile",
            RunStage::RunningHydraulics => "hydraulics",
            RunStage::RunningQuality => "quality",
            RunStage::SavingResults => "save",
            RunStage::Completed => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    /// Simulated time (s) when the event was raised.
    pub sim_time: i64,
    pub message: Option<String>,
}
