//! Shared types, error model, and configuration for StoryCheck.
//!
//! This crate is the foundation depended on by all other StoryCheck crates.
//! It provides:
//! - [`StoryCheckError`], the unified error type
//! - Domain types ([`Paragraph`], [`DocumentTree`], [`EvaluationResult`], [`RoutedComment`])
//! - The evaluation category catalog ([`criteria`])
//! - Configuration ([`AppConfig`], [`EvaluatorConfig`], config loading)

pub mod config;
pub mod criteria;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnnotationsSection, AppConfig, ClassifierSection, EvaluatorConfig, EvaluatorSection,
    RoutingSection, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use criteria::{CATEGORIES, CategoryInfo, category_for_criteria, display_name, lookup_category};
pub use error::{Result, StoryCheckError};
pub use types::{
    ApplicabilityScope, BodyNode, DEFAULT_NO_ISSUE_MARKER, DocumentTree, EvaluationResult,
    PLACEHOLDER_TEXT, Paragraph, RoutedComment, StoryNode, StructuralLevel, SummaryNode,
    TreeCounts, TreeNode,
};
