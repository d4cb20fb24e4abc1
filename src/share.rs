use url::{form_urlencoded, Url};

use crate::{display::escape_html, include_res, res::render, AppResult};

fn with_segments(base: &Url, segments: &[&str]) -> AppResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| format!("{base} can't be a base url"))?
        .pop_if_empty()
        .extend(segments);
    url.set_query(None);
    Ok(url)
}

pub fn profile_url(base: &Url, username: &str) -> AppResult<Url> {
    with_segments(base, &["p", username])
}

pub fn room_url(base: &Url, room_id: &str) -> AppResult<Url> {
    with_segments(base, &["r", room_id])
}

pub fn profile_share_text(username: &str, url: &Url) -> String {
    format!(
        "Spill anything about {username}, totally free & 100% anonymous\n\
         Roast, praise, confess or vent, it's all allowed\n\
         The link is below, don't be shy!\n\
         {url}"
    )
}

pub fn room_share_text(url: &Url) -> String {
    format!("Talk about anything, 100% anonymous!! Join my room right now... {url}")
}

fn encode(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Percent-encodes one path segment. Spaces become `%20`; a literal `+` is
/// already `%2B` at this point.
pub fn encode_path_segment(raw: &str) -> String {
    encode(raw).replace('+', "%20")
}

/// Site-relative path of a profile page.
pub fn profile_path(username: &str) -> String {
    format!("/p/{}", encode_path_segment(username))
}

/// Outbound share targets. Instagram has no share url, so its button copies
/// `text` to the clipboard instead.
#[derive(Debug, Clone)]
pub struct ShareLinks {
    pub url: String,
    pub text: String,
    pub twitter: String,
    pub facebook: String,
    pub whatsapp: String,
}

impl ShareLinks {
    pub fn new(url: &Url, text: String) -> Self {
        Self {
            twitter: format!("https://twitter.com/intent/tweet?text={}", encode(&text)),
            facebook: format!("https://www.facebook.com/sharer/sharer.php?u={}", encode(url.as_str())),
            whatsapp: format!("https://wa.me/?text={}", encode(&text)),
            url: url.to_string(),
            text,
        }
    }

    pub fn to_html(&self, heading: &str) -> String {
        render(include_res!(str, "/pages/share.html"), &[
            ("heading", &escape_html(heading)),
            ("url", &escape_html(&self.url)),
            ("text", &escape_html(&self.text)),
            ("twitter", &escape_html(&self.twitter)),
            ("facebook", &escape_html(&self.facebook)),
            ("whatsapp", &escape_html(&self.whatsapp)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://confess.example/").unwrap()
    }

    #[test]
    fn profile_links_encode_the_username() {
        let url = profile_url(&base(), "night owl/2").unwrap();
        assert_eq!(url.as_str(), "https://confess.example/p/night%20owl%2F2");
    }

    #[test]
    fn room_links_keep_a_base_path() {
        let base = Url::parse("https://host.example/app/").unwrap();
        let url = room_url(&base, "0190-abc").unwrap();
        assert_eq!(url.as_str(), "https://host.example/app/r/0190-abc");
    }

    #[test]
    fn share_targets_carry_text_and_url() {
        let url = room_url(&base(), "42").unwrap();
        let links = ShareLinks::new(&url, room_share_text(&url));
        assert!(links.text.ends_with("https://confess.example/r/42"));
        assert!(links.twitter.starts_with("https://twitter.com/intent/tweet?text=Talk+about+anything"));
        assert_eq!(
            links.facebook,
            "https://www.facebook.com/sharer/sharer.php?u=https%3A%2F%2Fconfess.example%2Fr%2F42"
        );
        assert!(links.whatsapp.starts_with("https://wa.me/?text="));
    }

    #[test]
    fn profile_paths_escape_every_separator() {
        assert_eq!(profile_path("alice"), "/p/alice");
        assert_eq!(profile_path("night owl/2"), "/p/night%20owl%2F2");
        assert_eq!(profile_path("a+b?c"), "/p/a%2Bb%3Fc");
    }

    #[test]
    fn profile_text_names_the_user() {
        let url = profile_url(&base(), "alice").unwrap();
        let text = profile_share_text("alice", &url);
        assert!(text.starts_with("Spill anything about alice"));
        assert!(text.ends_with("https://confess.example/p/alice"));
    }
}
