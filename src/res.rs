use axum::{debug_handler, http::header, response::{Html, IntoResponse}};

use crate::{display::escape_html, session::Toast};

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Fills `{key}` placeholders in one pass, so values are never scanned for
/// placeholders themselves. Unknown keys are left as they are.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let filled = tail.find('}').and_then(|end| {
            let key = &tail[1..end];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (end, *value))
        });

        match filled {
            Some((end, value)) => {
                out.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Wraps a body in the site layout. `feeds` are websocket paths the page
/// listens on, space separated.
pub fn page(title: &str, body: &str, toast: Option<Toast>, feeds: &str) -> Html<String> {
    let toast = toast.map(|toast| {
        render(include_res!(str, "/pages/toast.html"), &[
            ("class", if toast.destructive { "toast destructive" } else { "toast" }),
            ("title", &escape_html(&toast.title)),
            ("description", &escape_html(&toast.description)),
        ])
    });

    Html(render(include_res!(str, "/pages/layout.html"), &[
        ("title", &escape_html(title)),
        ("toast", toast.as_deref().unwrap_or("")),
        ("feeds", &escape_html(feeds)),
        ("body", body),
    ]))
}

pub fn sorry(what: &str) -> Html<String> {
    let body = render(include_res!(str, "/pages/sorry.html"), &[("what", &escape_html(what))]);
    page("Not found", &body, None, "")
}

#[debug_handler]
pub async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        include_res!(str, "/feed.js"),
    )
}

#[debug_handler]
pub async fn style() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        include_res!(str, "/style.css"),
    )
}
