//! HTML fragments for the microblog.

use chrono::DateTime;
use plinth_core::data::Record;
use plinth_core::hypermedia::escape;

pub fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>{title}</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/franken-ui@2.1.1/dist/css/core.min.css" />
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/franken-ui@2.1.1/dist/css/utilities.min.css" />
<script type="module" src="https://cdn.jsdelivr.net/gh/starfederation/datastar@v1.0.0/bundles/datastar.js"></script>
</head>
<body>{body}</body>
</html>"#,
        title = escape(title),
    )
}

pub fn page(posts: &[Record]) -> String {
    let body = format!(
        r#"<main class="max-w-xl mx-auto p-4 flex flex-col gap-6">
<h1 class="text-xl font-semibold">Microblog</h1>
{form}
{list}
</main>"#,
        form = post_form(),
        list = post_list(posts),
    );
    layout("Microblog", &body)
}

/// The post form submits over the patch stream when scripting is available
/// and falls back to a plain form POST otherwise.
pub fn post_form() -> String {
    r#"<form id="post-form" class="flex flex-col gap-2" action="/submit-post" method="post">
<textarea name="content" data-bind-content class="border rounded-lg p-2 text-sm" rows="3" placeholder="What's happening?"></textarea>
<input name="url" data-bind-url class="border rounded-lg p-2 text-sm" type="text" placeholder="Link (optional)" />
<button type="submit" data-on-click__prevent="@post('/create-post')" class="btn btn-primary self-end">Post</button>
</form>"#
        .to_string()
}

pub fn post_list(posts: &[Record]) -> String {
    if posts.is_empty() {
        return empty_state();
    }
    let items: Vec<String> = posts.iter().map(post_item).collect();
    format!(
        "<ul id=\"post-list\" class=\"flex flex-col gap-3 list-none p-0\">\n{}\n</ul>",
        items.join("\n")
    )
}

pub fn empty_state() -> String {
    "<div id=\"post-empty\" class=\"text-sm text-muted-foreground border rounded-lg p-6 text-center\">No posts yet. Say something!</div>"
        .to_string()
}

pub fn post_item(record: &Record) -> String {
    let id = record.get("id").and_then(|v| v.as_i64()).unwrap_or_default();
    let content = record.get("content").and_then(|v| v.as_str()).unwrap_or_default();
    let url = record.get("url").and_then(|v| v.as_str());
    let created_at = record.get("created_at").and_then(|v| v.as_str());

    let link = match url {
        Some(url) => format!(
            "<a href=\"{href}\" target=\"_blank\" class=\"text-xs text-muted-foreground\">{text}</a>\n",
            href = escape(url),
            text = escape(url),
        ),
        None => String::new(),
    };
    let time = match created_at {
        Some(raw) => format!(
            "<time class=\"text-xs text-muted-foreground\">{}</time>\n",
            format_timestamp(raw)
        ),
        None => String::new(),
    };

    format!(
        r#"<li id="post-{id}" class="card p-4 border rounded-lg relative">
<div class="flex flex-col gap-2">
{link}<div class="flex items-start justify-between gap-2">
<p class="text-sm leading-relaxed flex-1">{content}</p>
<button data-on-click="if(confirm('Are you sure you want to delete this post?')) {{ @delete('/delete-post/{id}') }}" class="btn btn-icon-secondary text-muted-foreground" type="button" aria-label="Delete post">&#x2715;</button>
</div>
{time}</div>
</li>"#,
        content = escape(content),
    )
}

/// `"Jan 3, 4:05 PM"`-style rendering of a stored timestamp.
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%b %-d, %-I:%M %p").to_string(),
        Err(_) => String::new(),
    }
}

/// Only absolute http(s) URLs are worth storing as links.
pub fn is_url(content: &str) -> bool {
    let rest = content
        .strip_prefix("https://")
        .or_else(|| content.strip_prefix("http://"));
    match rest {
        Some(rest) => !rest.is_empty() && !rest.chars().any(char::is_whitespace),
        None => false,
    }
}
