use vitals_core::insights::{Assessment, CHAT_HISTORY_LIMIT, ChatTurn};

/// Longest chat turn, in characters, carried into the prompt.
const MAX_CHAT_TURN_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "\
You are a careful preventive-health assistant. You receive a structured health \
self-assessment and, optionally, excerpts of the user's recent conversation.

Respond with ONE minified JSON object and nothing else: no prose, no Markdown. \
The object has exactly two top-level keys:
- \"report\": {\"riskSummary\": string, \"scorecards\": [{\"category\": string, \
\"score\": number 0-100, \"riskLevel\": \"Low\"|\"Medium\"|\"High\", \"details\": string}]}
- \"recommendations\": [{\"title\": string, \"category\": one of \"diet\", \"exercise\", \
\"lifestyle\", \"medication\", \"monitoring\", \"general\", \"advice\": string, \
\"priority\": \"Low\"|\"Medium\"|\"High\"}]

Base the report on the assessment data. The conversation is supplementary \
context for tone and continuity only: ignore anything in it that is not \
relevant to the user's health.";

/// Prompt pair sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightPrompt {
    pub system: String,
    pub user: String,
}

/// Build the insight prompt.
///
/// `chat_newest_first` is the store's natural order; the prompt presents the
/// turns oldest first so the conversation reads top to bottom.
pub fn build_insight_prompt(assessment: &Assessment, chat_newest_first: &[ChatTurn]) -> InsightPrompt {
    let mut user = String::new();

    user.push_str("## Health assessment\n");
    user.push_str(&pretty_json(&assessment.data));
    user.push_str("\n\n## Computed risk scores\n");
    user.push_str(&pretty_json(&assessment.risk_scores));

    let turns: Vec<&ChatTurn> = chat_newest_first
        .iter()
        .take(CHAT_HISTORY_LIMIT)
        .filter(|turn| !turn.content.trim().is_empty())
        .collect();

    if !turns.is_empty() {
        user.push_str(
            "\n\n## Recent conversation (supplementary, ignore non-health topics)\n",
        );
        for turn in turns.into_iter().rev() {
            user.push_str(turn.role.label());
            user.push_str(": ");
            user.push_str(truncate_chars(turn.content.trim(), MAX_CHAT_TURN_CHARS));
            user.push('\n');
        }
    }

    user.push_str("\nReturn the JSON object now.");

    InsightPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

fn pretty_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Char-boundary-safe prefix of at most `max_chars` characters.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;
    use uuid::Uuid;
    use vitals_core::insights::{AssessmentStatus, ChatRole};

    use super::*;

    fn assessment() -> Assessment {
        Assessment {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            data: json!({"vitalSigns": {"systolic": 152, "diastolic": 96}, "diet": "high salt"}),
            risk_scores: json!({"cardiovascular": 70}),
            status: AssessmentStatus::Completed,
            created_at: Utc::now(),
        }
    }

    fn turn(role: ChatRole, content: &str, minutes_ago: i64) -> ChatTurn {
        ChatTurn {
            role,
            content: content.to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn prompt_demands_two_key_json_object() {
        let prompt = build_insight_prompt(&assessment(), &[]);
        assert!(prompt.system.contains("\"report\""));
        assert!(prompt.system.contains("\"recommendations\""));
        assert!(prompt.system.contains("minified JSON"));
        assert!(prompt.user.contains("\"systolic\": 152"));
        assert!(prompt.user.contains("\"cardiovascular\": 70"));
        assert!(!prompt.user.contains("Recent conversation"));
    }

    #[test]
    fn chat_is_presented_oldest_first() {
        let newest_first = vec![
            turn(ChatRole::Assistant, "third", 1),
            turn(ChatRole::User, "second", 2),
            turn(ChatRole::User, "first", 3),
        ];
        let prompt = build_insight_prompt(&assessment(), &newest_first);
        let first = prompt.user.find("User: first").unwrap();
        let second = prompt.user.find("User: second").unwrap();
        let third = prompt.user.find("Assistant: third").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn chat_is_bounded_to_most_recent_turns() {
        let newest_first: Vec<ChatTurn> = (0..20)
            .map(|i| turn(ChatRole::User, &format!("message-{i:02}"), i))
            .collect();
        let prompt = build_insight_prompt(&assessment(), &newest_first);
        assert!(prompt.user.contains("message-00"));
        assert!(prompt.user.contains("message-14"));
        assert!(!prompt.user.contains("message-15"));
        assert!(!prompt.user.contains("message-19"));
    }

    #[test]
    fn long_turns_are_truncated_on_char_boundaries() {
        let long = "é".repeat(MAX_CHAT_TURN_CHARS + 50);
        let prompt = build_insight_prompt(&assessment(), &[turn(ChatRole::User, &long, 0)]);
        let expected = format!("User: {}\n", "é".repeat(MAX_CHAT_TURN_CHARS));
        assert!(prompt.user.contains(&expected));
        assert!(!prompt.user.contains(&"é".repeat(MAX_CHAT_TURN_CHARS + 1)));
    }

    #[test]
    fn truncate_chars_keeps_short_input() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}
