//! Line-oriented evaluation text, as emitted by the LLM prompt:
//!
//! ```text
//! カテゴリ: SCQA有無
//! スコア: 0.6
//! 優先度: 2
//! 対象文: 本日の結論
//! フィードバック:
//! - 結論が後回しになっている
//! 改善提案:
//! - 冒頭で結論を述べる
//! ```
//!
//! Each `カテゴリ` line opens a new block. Bullet lines attach to whichever
//! section header came last.

use std::sync::LazyLock;

use regex::Regex;
use storycheck_shared::EvaluationResult;
use tracing::warn;

use crate::decode::EvaluationDraft;

/// `<key>: <value>` with an ASCII or full-width colon.
static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(カテゴリ|スコア|優先度|対象文|フィードバック|改善提案)\s*[:：]\s*(.*)$")
        .expect("field regex")
});

/// `- item` or `・item`.
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:-|・)\s*(.+)$").expect("bullet regex"));

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Feedback,
    Improvement,
}

/// Parse every block in the text. Blocks without a category are dropped.
pub fn parse_evaluation_text(text: &str) -> Vec<EvaluationResult> {
    let mut drafts: Vec<EvaluationDraft> = Vec::new();
    let mut current: Option<EvaluationDraft> = None;
    let mut section = Section::None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = FIELD_RE.captures(line) {
            let value = caps[2].trim();
            match &caps[1] {
                "カテゴリ" => {
                    drafts.extend(current.take());
                    current = Some(EvaluationDraft {
                        category: Some(value.to_string()),
                        ..EvaluationDraft::default()
                    });
                    section = Section::None;
                }
                key => {
                    let draft = current.get_or_insert_with(EvaluationDraft::default);
                    match key {
                        "スコア" => draft.score = parse_score(value),
                        "優先度" => draft.priority = Some(parse_priority(value)),
                        "対象文" => draft.target_excerpt = Some(value.to_string()),
                        "フィードバック" => {
                            section = Section::Feedback;
                            push_inline(&mut draft.feedback_lines, value);
                        }
                        _ => {
                            section = Section::Improvement;
                            push_inline(&mut draft.improvement_lines, value);
                        }
                    }
                }
            }
            continue;
        }

        let Some(caps) = BULLET_RE.captures(line) else {
            continue;
        };
        let item = caps[1].trim().to_string();
        if let Some(draft) = current.as_mut() {
            match section {
                Section::Feedback => draft.feedback_lines.push(item),
                Section::Improvement => draft.improvement_lines.push(item),
                Section::None => {}
            }
        }
    }
    drafts.extend(current);

    drafts
        .into_iter()
        .filter(|d| d.category.as_deref().is_some_and(|c| !c.trim().is_empty()))
        .filter_map(EvaluationDraft::resolve)
        .collect()
}

/// `フィードバック: 問題なし` puts the verdict on the header line itself.
fn push_inline(lines: &mut Vec<String>, value: &str) {
    if !value.is_empty() {
        lines.push(value.to_string());
    }
}

fn parse_score(value: &str) -> f64 {
    match value.parse::<f64>() {
        Ok(score) if (0.0..=1.0).contains(&score) => score,
        Ok(_) => {
            warn!(value, "score out of range, using 0.0");
            0.0
        }
        Err(_) => {
            warn!(value, "could not parse score, using 0.0");
            0.0
        }
    }
}

fn parse_priority(value: &str) -> u32 {
    match value.parse::<u32>() {
        Ok(priority) if priority >= 1 => priority,
        _ => {
            warn!(value, "invalid priority, using 3");
            3
        }
    }
}
