// src/apply/mod.rs
//! Easy Apply form handling, independent of the page markup

pub mod fields;
pub mod walk;

pub use fields::{choose_option, AnswerSource, FieldDecision, FieldResolver, CHECKED};
pub use walk::{
    ApplicationWalk, ApplyModal, Confirmation, FailureKind, FormField, ModalAction, WalkConfig,
    WalkFailure, WalkOutcome, WalkState,
};
