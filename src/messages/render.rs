use sqlx::SqlitePool;

use super::{list_messages, reactions::{self, ReactionSummary}, replies};
use crate::{
    db::{Message, MessageKind, ReactionType, Reply},
    display::{escape_html, format_date, markdown},
    include_res,
    res::render,
    AppResult,
};

/// One message card with its reactions and replies. `return_url` is where the
/// reaction and reply forms come back to.
pub async fn message_html(
    db_pool: &SqlitePool,
    kind: MessageKind,
    message: &Message,
    return_url: &str,
) -> AppResult<String> {
    let reactions = reactions::list_reactions(db_pool, kind, &message.id).await?;
    let summary = ReactionSummary::tally(reactions.iter().map(|reaction| reaction.reaction_type));
    let replies = replies::list_replies(db_pool, kind, &message.id).await?;

    Ok(render_message(kind, message, &summary, &replies, return_url))
}

pub async fn message_list_html(
    db_pool: &SqlitePool,
    kind: MessageKind,
    parent_id: &str,
    return_url: &str,
) -> AppResult<String> {
    let messages = list_messages(db_pool, kind, parent_id).await?;
    if messages.is_empty() {
        return Ok(include_res!(str, "/pages/messages/empty.html").to_owned());
    }

    let mut html = String::new();
    for message in &messages {
        html.push_str(&message_html(db_pool, kind, message, return_url).await?);
    }
    Ok(html)
}

fn picker() -> String {
    ReactionType::ALL
        .iter()
        .map(|reaction| {
            format!(
                r#"<button type="submit" name="reaction_type" value="{0}" title="{0}">{1}</button>"#,
                reaction.as_str(),
                reaction.emoji(),
            )
        })
        .collect()
}

fn render_message(
    kind: MessageKind,
    message: &Message,
    summary: &ReactionSummary,
    replies: &[Reply],
    return_url: &str,
) -> String {
    let image = match message.image_url.as_deref() {
        Some(src) if src.starts_with("data:image/") => {
            format!(r#"<img class="attachment" src="{}" alt="Attached image">"#, escape_html(src))
        }
        _ => String::new(),
    };
    let replies_html: String = replies.iter().map(replies::reply_html).collect();

    render(include_res!(str, "/pages/messages/message.html"), &[
        ("id", &message.id),
        ("kind", kind.as_str()),
        ("content", &markdown(&message.content)),
        ("image", &image),
        ("sender", &escape_html(message.sender_username.as_deref().unwrap_or("Anonymous"))),
        ("date", &format_date(message.created_at)),
        ("summary", &summary.to_html(&message.id)),
        ("picker", &picker()),
        ("reply_count", &replies::reply_count_html(&message.id, replies.len())),
        ("replies", &replies_html),
        ("return_url", &escape_html(return_url)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: Option<&str>, image: Option<&str>) -> Message {
        Message {
            id: "m1".into(),
            parent_id: "u1".into(),
            content: "hello {id}".into(),
            sender_username: sender.map(str::to_owned),
            image_url: image.map(str::to_owned),
            created_at: 1_736_089_620,
        }
    }

    #[test]
    fn cards_carry_ids_the_feed_can_target() {
        let html = render_message(MessageKind::Room, &message(None, None), &ReactionSummary::default(), &[], "/r/x");
        for id in [r#"id="message-m1""#, r#"id="reactions-m1""#, r#"id="replies-m1""#, r#"id="reply-count-m1""#] {
            assert!(html.contains(id), "{id}");
        }
        assert!(html.contains(r#"action="/m/room/m1/reactions""#));
        assert!(html.contains("Jan 5, 2025, 3:07 PM"));
        // content is not re-scanned for placeholders
        assert!(html.contains("hello {id}"));
    }

    #[test]
    fn sender_falls_back_to_anonymous() {
        let html = render_message(MessageKind::Profile, &message(None, None), &ReactionSummary::default(), &[], "/");
        assert!(html.contains(r#"<span class="sender">Anonymous</span>"#));
        let html = render_message(MessageKind::Profile, &message(Some("<b>"), None), &ReactionSummary::default(), &[], "/");
        assert!(html.contains(r#"<span class="sender">&lt;b&gt;</span>"#));
    }

    #[test]
    fn only_data_uri_images_are_shown() {
        let summary = ReactionSummary::default();
        let html = render_message(MessageKind::Profile, &message(None, Some("data:image/png;base64,AA")), &summary, &[], "/");
        assert!(html.contains(r#"src="data:image/png;base64,AA""#));
        let html = render_message(MessageKind::Profile, &message(None, Some("https://x/y.png")), &summary, &[], "/");
        assert!(!html.contains("<img"));
    }

    #[test]
    fn picker_offers_every_reaction() {
        let html = picker();
        for reaction in ReactionType::ALL {
            assert!(html.contains(&format!(r#"value="{}""#, reaction.as_str())));
        }
    }
}
