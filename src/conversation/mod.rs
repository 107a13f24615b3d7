//! Conversation turn log and the accumulator that feeds it

mod accumulator;
mod log;
mod turn;

pub use accumulator::TurnAccumulator;
pub use log::{ConversationLog, LogChange, LogWriter};
pub use turn::{
    ConversationTurn, Feedback, GrammarCorrection, GrammarFeedback, GroundingChunk, NewTurn, Patch,
    PronunciationFeedback, Role, TurnId, TurnUpdate, WordAccuracy, WordFeedback,
};
