mod generation_service;
mod reveal_controller;

pub use generation_service::GenerationService;
pub use reveal_controller::{
    DisplayChange, REVEAL_DELAY, REVEAL_ERROR_MESSAGE, RevealController, RevealOutcome, RevealPacer, RevealPhase,
    RevealSnapshot, RevealUpdate, ThreadPacer,
};
