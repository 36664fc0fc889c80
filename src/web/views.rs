//! Server-rendered feed pages.

use chrono::DateTime;
use maud::{html, Markup, DOCTYPE};

use super::locale::Locale;
use crate::model::{FeedPage, Post, PostType};

const STYLE: &str = r"
body { max-width: 60rem; margin: 0 auto; padding: 1rem; font-family: sans-serif; }
.post { border-bottom: 1px solid #8884; padding: 1rem 0; }
.post img, .post video { max-width: 100%; }
.meta { color: #888; font-size: 0.8em; }
.placeholder { font-style: italic; color: #888; }
";

fn layout(locale: Locale, content: &Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(locale.as_str()) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (locale.site_title()) }
                style { (STYLE) }
            }
            body {
                header {
                    h1 { (locale.site_title()) }
                    nav {
                        @for other in Locale::ALL {
                            a href={ "/" (other.as_str()) } { (other.as_str()) } " "
                        }
                    }
                }
                main { (content) }
            }
        }
    }
}

/// One page of the feed. `next` is the page number to link to, if any.
#[must_use]
pub fn render_feed(locale: Locale, page: &FeedPage, next: Option<i64>) -> Markup {
    let content = html! {
        @if page.posts.is_empty() {
            p { (locale.empty_feed()) }
        }
        @for post in &page.posts {
            (render_post(locale, post))
        }
        @if let Some(next) = next {
            a href={ "/" (locale.as_str()) "?page=" (next) } { (locale.more()) }
        }
    };
    layout(locale, &content)
}

/// Shown when the store could not be read.
#[must_use]
pub fn render_unavailable(locale: Locale) -> Markup {
    layout(locale, &html! { p { (locale.feed_unavailable()) } })
}

fn render_post(locale: Locale, post: &Post) -> Markup {
    html! {
        article.post data-post-type=(post.post_type.as_str()) {
            h2 { (post.display_title()) }
            (render_body(locale, post))
            p.meta {
                (post.author) " · " (post.score) " · " (post.num_comments)
                @if let Some(ratio) = post.upvote_ratio {
                    " · " (format!("{:.0}%", ratio * 100.0))
                }
                @if let Some(when) = format_time(post.created_at) {
                    " · " (when)
                }
            }
        }
    }
}

fn render_body(locale: Locale, post: &Post) -> Markup {
    match post.post_type {
        PostType::SelfText | PostType::Poll => html! {
            p { (post.display_body()) }
        },
        PostType::Link => html! {
            p { a href=(post.url) rel="noopener noreferrer" { (post.url) } }
            @if !post.display_body().is_empty() {
                p { (post.display_body()) }
            }
        },
        PostType::Image => html! {
            img src=(post.url) alt=(post.display_title()) loading="lazy";
        },
        PostType::Video => html! {
            video src=(post.url) controls preload="metadata" {}
        },
        PostType::Gallery => match post.gallery_urls() {
            Some(urls) => html! {
                div.gallery {
                    @for url in &urls {
                        img src=(url) loading="lazy";
                    }
                }
            },
            None => placeholder(locale),
        },
        PostType::Unknown => placeholder(locale),
    }
}

fn placeholder(locale: Locale) -> Markup {
    html! { p.placeholder { (locale.unsupported_post()) } }
}

fn format_time(epoch_secs: i64) -> Option<String> {
    DateTime::from_timestamp(epoch_secs, 0).map(|t| t.format("%m-%d %H:%M").to_string())
}
