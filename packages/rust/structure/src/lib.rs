//! Document structure extraction.
//!
//! Turns the flat paragraph sequence read from a document into a
//! Title → Summary → Story → Body tree:
//! - [`classifier`] maps a paragraph's indentation and list signals to a [`StructuralLevel`]
//! - [`builder`] runs a single forward pass assembling the [`DocumentTree`]
//!
//! [`StructuralLevel`]: storycheck_shared::StructuralLevel
//! [`DocumentTree`]: storycheck_shared::DocumentTree

pub mod builder;
pub mod classifier;

pub use builder::{build, build_with};
pub use classifier::{Classification, Classifier, ClassifierConfig, Signal};
