//! Check-pass orchestration and the annotation engine for StoryCheck.
//!
//! This crate routes evaluations onto the structure tree, chooses which of
//! them to show, writes them to the document as annotations, and ties those
//! steps into an end-to-end pass ([`pass::run_check`]).

pub mod aggregate;
pub mod document;
pub mod matching;
pub mod pass;
pub mod placement;
pub mod router;
pub mod score;

pub use aggregate::{Selection, select_for_display};
pub use document::{DocumentAccessor, MemoryDocument};
pub use pass::{
    CheckOptions, CheckReport, DisplayReport, ProgressReporter, SilentProgress, run_check,
    toggle_category,
};
pub use placement::{Annotation, PlacementConfig, PlacementReport, place, plan, render_block};
pub use router::{MatchKind, Route, Router, RouterConfig, RoutingOutcome, route};
pub use score::{CategoryScore, belongs_to, category_scores, total_score};
