//! Indent classifier.
//!
//! Rules are tried in a fixed order, first match wins:
//! 1. explicit list nesting level
//! 2. hanging indent (negative first line) with the left indent in a known band
//! 3. total indent (first line + left) bucketed by magnitude
//! 4. positional fallback: first paragraph opens a summary, later ones sit one
//!    level below their predecessor

use serde::Serialize;
use storycheck_shared::{AppConfig, ClassifierSection, Paragraph, StructuralLevel};

/// Thresholds for the indentation rules, in points.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub hanging_indent_max_pt: f64,
    pub band_tolerance_pt: f64,
    pub summary_band_pt: f64,
    pub story_band_pt: f64,
    pub body_band_pt: f64,
    pub flat_tolerance_pt: f64,
    pub story_max_pt: f64,
    pub body_max_pt: f64,
}

impl From<&ClassifierSection> for ClassifierConfig {
    fn from(section: &ClassifierSection) -> Self {
        Self {
            hanging_indent_max_pt: section.hanging_indent_max_pt,
            band_tolerance_pt: section.band_tolerance_pt,
            summary_band_pt: section.summary_band_pt,
            story_band_pt: section.story_band_pt,
            body_band_pt: section.body_band_pt,
            flat_tolerance_pt: section.flat_tolerance_pt,
            story_max_pt: section.story_max_pt,
            body_max_pt: section.body_max_pt,
        }
    }
}

impl From<&AppConfig> for ClassifierConfig {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.classifier)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::from(&ClassifierSection::default())
    }
}

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ListLevel,
    HangingIndent,
    IndentMagnitude,
    /// No signal on the first structural paragraph.
    OpeningFallback,
    /// No signal later on; one level below the previous paragraph.
    DemotionFallback,
    /// Blank paragraph, never placed in the tree.
    Blank,
}

/// Level plus the rule that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub level: StructuralLevel,
    pub signal: Signal,
}

/// Maps raw paragraph signals to structural levels.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify one paragraph.
    ///
    /// Blank paragraphs come back as [`StructuralLevel::Unknown`] with
    /// [`Signal::Blank`]; callers skip them without advancing `prior_level`.
    pub fn classify(
        &self,
        paragraph: &Paragraph,
        is_first_paragraph: bool,
        prior_level: StructuralLevel,
    ) -> Classification {
        if paragraph.is_blank() {
            return Classification {
                level: StructuralLevel::Unknown,
                signal: Signal::Blank,
            };
        }

        if let Some(found) = self.signal(paragraph) {
            return found;
        }

        if is_first_paragraph {
            Classification {
                level: StructuralLevel::Summary,
                signal: Signal::OpeningFallback,
            }
        } else {
            Classification {
                level: prior_level.demoted(),
                signal: Signal::DemotionFallback,
            }
        }
    }

    /// Rules 1–3 only; `None` when the paragraph carries no usable signal.
    pub fn signal(&self, paragraph: &Paragraph) -> Option<Classification> {
        if let Some(level) = paragraph.list_level {
            return Some(Classification {
                level: StructuralLevel::from_list_level(level),
                signal: Signal::ListLevel,
            });
        }

        if let Some(level) = self.hanging_indent(paragraph) {
            return Some(Classification {
                level,
                signal: Signal::HangingIndent,
            });
        }

        self.indent_magnitude(paragraph).map(|level| Classification {
            level,
            signal: Signal::IndentMagnitude,
        })
    }

    fn hanging_indent(&self, paragraph: &Paragraph) -> Option<StructuralLevel> {
        let c = &self.config;
        if paragraph.first_line_indent_pt > c.hanging_indent_max_pt {
            return None;
        }

        let left = paragraph.left_indent_pt;
        let in_band = |center: f64| (left - center).abs() <= c.band_tolerance_pt;

        if in_band(c.summary_band_pt) {
            Some(StructuralLevel::Summary)
        } else if in_band(c.story_band_pt) {
            Some(StructuralLevel::Story)
        } else if in_band(c.body_band_pt) {
            Some(StructuralLevel::Body)
        } else {
            None
        }
    }

    fn indent_magnitude(&self, paragraph: &Paragraph) -> Option<StructuralLevel> {
        let c = &self.config;
        let total = paragraph.first_line_indent_pt + paragraph.left_indent_pt;

        if total.abs() <= c.flat_tolerance_pt {
            Some(StructuralLevel::Summary)
        } else if total > c.flat_tolerance_pt && total <= c.story_max_pt {
            Some(StructuralLevel::Story)
        } else if total > c.story_max_pt && total <= c.body_max_pt {
            Some(StructuralLevel::Body)
        } else {
            // Negative leftovers and anything past the body ceiling.
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::default()
    }

    fn level(p: &Paragraph) -> StructuralLevel {
        classifier().classify(p, false, StructuralLevel::Summary).level
    }

    #[test]
    fn list_level_wins_over_indentation() {
        let mut p = Paragraph::indented("x", -21.0, 42.0);
        p.list_level = Some(0);
        let c = classifier().classify(&p, false, StructuralLevel::Body);
        assert_eq!(c.level, StructuralLevel::Summary);
        assert_eq!(c.signal, Signal::ListLevel);
        assert_eq!(level(&Paragraph::list_item("x", 1)), StructuralLevel::Story);
        assert_eq!(level(&Paragraph::list_item("x", 2)), StructuralLevel::Body);
    }

    #[test]
    fn hanging_indent_bands() {
        let cases = [
            (-21.0, 21.0, StructuralLevel::Summary),
            (-18.0, 24.5, StructuralLevel::Summary),
            (-21.0, 42.0, StructuralLevel::Story),
            (-21.0, 63.0, StructuralLevel::Body),
        ];
        for (first, left, expected) in cases {
            let c = classifier().classify(&Paragraph::indented("x", first, left), false, StructuralLevel::Title);
            assert_eq!(c.level, expected, "first={first} left={left}");
            assert_eq!(c.signal, Signal::HangingIndent);
        }
    }

    #[test]
    fn hanging_indent_requires_negative_first_line() {
        // -3 is above the -5 threshold, so the magnitude rule decides: 39 → body.
        let c = classifier().classify(&Paragraph::indented("x", -3.0, 42.0), false, StructuralLevel::Summary);
        assert_eq!(c.signal, Signal::IndentMagnitude);
        assert_eq!(c.level, StructuralLevel::Body);
    }

    #[test]
    fn magnitude_buckets() {
        let cases = [
            (0.0, 0.0, StructuralLevel::Summary),
            (0.5, 0.0, StructuralLevel::Summary),
            (0.0, 10.5, StructuralLevel::Story),
            (10.0, 20.0, StructuralLevel::Story),
            (0.0, 45.0, StructuralLevel::Body),
        ];
        for (first, left, expected) in cases {
            let c = classifier().classify(&Paragraph::indented("x", first, left), false, StructuralLevel::Title);
            assert_eq!(c.level, expected, "first={first} left={left}");
            assert_eq!(c.signal, Signal::IndentMagnitude);
        }
    }

    #[test]
    fn no_signal_on_first_paragraph_opens_summary() {
        let deep = Paragraph::indented("x", 0.0, 90.0);
        let c = classifier().classify(&deep, true, StructuralLevel::Title);
        assert_eq!(c.level, StructuralLevel::Summary);
        assert_eq!(c.signal, Signal::OpeningFallback);
    }

    #[test]
    fn no_signal_later_demotes_one_level() {
        let deep = Paragraph::indented("x", 0.0, 90.0);
        let k = classifier();
        assert_eq!(k.classify(&deep, false, StructuralLevel::Summary).level, StructuralLevel::Story);
        assert_eq!(k.classify(&deep, false, StructuralLevel::Story).level, StructuralLevel::Body);
        assert_eq!(k.classify(&deep, false, StructuralLevel::Body).level, StructuralLevel::Body);
        assert_eq!(k.classify(&deep, false, StructuralLevel::Title).level, StructuralLevel::Summary);

        // Unmatched hanging indent with a negative total also carries no signal.
        let odd = Paragraph::indented("x", -30.0, 10.0);
        let c = k.classify(&odd, false, StructuralLevel::Story);
        assert_eq!(c.signal, Signal::DemotionFallback);
        assert_eq!(c.level, StructuralLevel::Body);
    }

    #[test]
    fn blank_paragraphs_are_not_classified() {
        let c = classifier().classify(&Paragraph::list_item("  \t", 0), true, StructuralLevel::Title);
        assert_eq!(c.level, StructuralLevel::Unknown);
        assert_eq!(c.signal, Signal::Blank);
    }

    #[test]
    fn thresholds_come_from_config() {
        let mut section = ClassifierSection::default();
        section.story_max_pt = 5.0;
        let k = Classifier::new(ClassifierConfig::from(&section));
        let c = k.classify(&Paragraph::indented("x", 0.0, 10.0), false, StructuralLevel::Summary);
        assert_eq!(c.level, StructuralLevel::Body);
    }
}
