pub mod io;
pub mod llm;
pub mod models;
pub mod server;
pub mod stages;

pub use io::{FormatReport, FormatRequest, FormatResponse, HumanTranscript};
pub use llm::{AnthropicClient, AnthropicConfig, TransformEngine};
pub use models::{Speaker, StageKind, StageOutcome, Utterance, UtteranceSequence};
pub use server::{build_router, serve, AppState};
pub use stages::{execute_epoch, run_pipeline, EpochRequest, PipelineConfig, PipelineError, PipelineResult};
