//! Conversation history reconstruction from a fetched discussion.

use crate::github::{Discussion, DiscussionComment};

/// Author handle used when the platform returns no author (deleted or
/// anonymized accounts).
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// One prior turn of the conversation. `response` is populated only for
/// turns the bot itself answered in an earlier pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub speaker: String,
    pub input: String,
    pub response: Option<String>,
}

/// Rebuild the ordered conversation history for a discussion.
///
/// The first turn is the opening post; comments and their replies follow in
/// the order the gateway returned them, which is already chronological.
/// A comment authored by the bot's own login becomes the `response` of the
/// preceding turn rather than a turn of its own.
pub fn build_history(discussion: &Discussion, bot_login: Option<&str>) -> Vec<ConversationTurn> {
    let mut history = vec![ConversationTurn {
        speaker: author_or_unknown(discussion.author.as_deref()),
        input: discussion.body.clone(),
        response: None,
    }];

    for comment in &discussion.comments {
        append_turn(&mut history, comment, bot_login);
        for reply in &comment.replies {
            append_turn(&mut history, reply, bot_login);
        }
    }

    history
}

fn append_turn(
    history: &mut Vec<ConversationTurn>,
    comment: &DiscussionComment,
    bot_login: Option<&str>,
) {
    let author = author_or_unknown(comment.author.as_deref());

    if let Some(bot) = bot_login {
        if author == bot {
            if let Some(last) = history.last_mut() {
                if last.response.is_none() {
                    last.response = Some(comment.body.clone());
                    return;
                }
            }
        }
    }

    history.push(ConversationTurn {
        speaker: author,
        input: comment.body.clone(),
        response: None,
    });
}

fn author_or_unknown(author: Option<&str>) -> String {
    author.unwrap_or(UNKNOWN_AUTHOR).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn discussion(body: &str, author: Option<&str>, comments: Vec<DiscussionComment>) -> Discussion {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        Discussion {
            node_id: "D_12".into(),
            number: 12,
            title: "test".into(),
            body: body.into(),
            author: author.map(String::from),
            created_at: timestamp,
            updated_at: timestamp,
            url: "https://github.com/acme/forum/discussions/12".into(),
            comments,
        }
    }

    fn comment(node_id: &str, body: &str, author: Option<&str>) -> DiscussionComment {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap();
        DiscussionComment {
            node_id: node_id.into(),
            database_id: None,
            body: body.into(),
            author: author.map(String::from),
            created_at: timestamp,
            updated_at: timestamp,
            replies: Vec::new(),
        }
    }

    #[test]
    fn bare_discussion_yields_single_turn() {
        let history = build_history(&discussion("Hello", Some("alice"), Vec::new()), None);

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].speaker, "alice");
        assert_eq!(history[0].input, "Hello");
        assert!(history[0].response.is_none());
    }

    #[test]
    fn comments_follow_in_order() {
        let comments = vec![comment("DC_1", "first", Some("bob")), comment("DC_2", "second", Some("carol"))];
        let history = build_history(&discussion("Hello", Some("alice"), comments), None);

        assert_eq!(history.len(), 3);
        assert_eq!(history[1].input, "first");
        assert_eq!(history[2].input, "second");
    }

    #[test]
    fn replies_extend_the_parent_chain() {
        let mut parent = comment("DC_1", "question", Some("bob"));
        parent.replies.push(comment("DC_2", "follow-up", Some("carol")));
        let history = build_history(&discussion("Hello", Some("alice"), vec![parent]), None);

        assert_eq!(history.len(), 3);
        assert_eq!(history[2].input, "follow-up");
    }

    #[test]
    fn missing_author_defaults_to_unknown() {
        let history = build_history(&discussion("Hello", None, vec![comment("DC_1", "hi", None)]), None);

        assert_eq!(history[0].speaker, UNKNOWN_AUTHOR);
        assert_eq!(history[1].speaker, UNKNOWN_AUTHOR);
    }

    #[test]
    fn bot_comments_fold_into_previous_turn() {
        let comments = vec![
            comment("DC_1", "what is a lifetime?", Some("bob")),
            comment("DC_2", "A lifetime is a scope annotation.", Some("replybot")),
        ];
        let history = build_history(&discussion("Hello", Some("alice"), comments), Some("replybot"));

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].speaker, "bob");
        assert_eq!(history[1].response.as_deref(), Some("A lifetime is a scope annotation."));
    }

    #[test]
    fn consecutive_bot_comments_do_not_overwrite() {
        let comments = vec![
            comment("DC_1", "first answer", Some("replybot")),
            comment("DC_2", "second answer", Some("replybot")),
        ];
        let history = build_history(&discussion("Hello", Some("alice"), comments), Some("replybot"));

        // First folds into the opening turn; second opens its own turn so
        // no response text is lost.
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].response.as_deref(), Some("first answer"));
        assert_eq!(history[1].input, "second answer");
    }
}
