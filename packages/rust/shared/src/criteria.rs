//! Static catalog of evaluation categories and the criteria they group.
//!
//! The evaluation service reports results per criterion; the catalog maps each
//! criterion back to its display category, priority, and applicability scope.

use crate::types::ApplicabilityScope;

/// One display category of the evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryInfo {
    /// Stable identifier, e.g. `SUMMARY_LOGIC_FLOW`.
    pub id: &'static str,
    /// Human-readable (Japanese) name used in annotation headers.
    pub display_name: &'static str,
    /// 1 is the highest priority.
    pub priority: u32,
    /// Criteria ids reported under this category.
    pub criteria_ids: &'static [&'static str],
    /// Points this category contributes to a 100-point total.
    pub max_score: f64,
    /// Structural levels the category judges.
    pub scope: ApplicabilityScope,
}

/// All categories, in priority order.
pub const CATEGORIES: &[CategoryInfo] = &[
    CategoryInfo {
        id: "FULL_TEXT_RHETORIC",
        display_name: "全文修辞表現",
        priority: 1,
        criteria_ids: &["最低限の修辞表現", "修辞表現"],
        max_score: 20.0,
        scope: ApplicabilityScope::FullDocument,
    },
    CategoryInfo {
        id: "SUMMARY_LOGIC_FLOW",
        display_name: "サマリーの論理展開",
        priority: 2,
        criteria_ids: &["前回の振り返りの有無", "SCQA有無", "転換の接続詞の重複利用"],
        max_score: 25.0,
        scope: ApplicabilityScope::SummaryOnly,
    },
    CategoryInfo {
        id: "SUMMARY_INTERNAL_LOGIC",
        display_name: "サマリー単体の論理",
        priority: 3,
        criteria_ids: &[
            "接続詞の妥当性",
            "サマリーレイヤーに不適な接続詞の有無",
            "直前のサマリーとの論理的連続性",
        ],
        max_score: 15.0,
        scope: ApplicabilityScope::SummaryOnly,
    },
    CategoryInfo {
        id: "SUMMARY_STORY_LOGIC",
        display_name: "サマリーとストーリー間の論理",
        priority: 4,
        criteria_ids: &[
            "メッセージレイヤーの逐次的展開性",
            "逐次的展開の評価",
            "根拠s, 詳細s⇔主張",
        ],
        max_score: 20.0,
        scope: ApplicabilityScope::SummaryAndStory,
    },
    CategoryInfo {
        id: "STORY_INTERNAL_LOGIC",
        display_name: "ストーリー単体の論理",
        priority: 5,
        criteria_ids: &[
            "接続詞の適切性",
            "転換の接続詞の二重利用",
            "無駄なナンバリングの回避",
        ],
        max_score: 10.0,
        scope: ApplicabilityScope::StoryAndBody,
    },
    CategoryInfo {
        id: "DETAIL_RHETORIC",
        display_name: "細部の修辞表現",
        priority: 6,
        criteria_ids: &["メッセージとボディの論理的整合性"],
        max_score: 10.0,
        scope: ApplicabilityScope::StoryAndBody,
    },
];

/// Look up a category by id.
pub fn lookup_category(id: &str) -> Option<&'static CategoryInfo> {
    CATEGORIES.iter().find(|c| c.id == id)
}

/// Find the category a criterion is reported under.
pub fn category_for_criteria(criteria_id: &str) -> Option<&'static CategoryInfo> {
    let criteria_id = criteria_id.trim();
    CATEGORIES
        .iter()
        .find(|c| c.criteria_ids.contains(&criteria_id))
}

/// Display name for a category id, or the id itself when unknown.
pub fn display_name(category: &str) -> &str {
    lookup_category(category).map_or(category, |c| c.display_name)
}
