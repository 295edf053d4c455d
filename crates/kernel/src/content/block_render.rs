//! Server-side rendering of published snapshots.
//!
//! Converts typed blocks into semantic HTML for the public passport page:
//! - Free text is sanitized with ammonia, attribute values are escaped
//! - Only http(s) and site-relative URLs are emitted as links or sources
//! - Videos from whitelisted hosts (YouTube, Vimeo) become iframes

use crate::content::theme::ResolvedTheme;
use crate::models::block_content::{
    AccordionContent, BlockContent, ImageContent, ImageLayout, ImageTextContent, MediaImage,
    PollContent, StorytellingContent, TextContent, TimelineContent, VideoContent,
};
use crate::models::{Block, ComplianceFields, Version};
use crate::routes::helpers::html_escape;

/// Sanitize user-provided text, allowing only safe inline HTML.
fn sanitize_text(input: &str) -> String {
    ammonia::clean(input)
}

/// Whether a URL may be emitted: absolute http(s) or a site-relative path.
pub fn is_safe_url(url: &str) -> bool {
    let trimmed = url.trim();
    if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        return true;
    }
    url::Url::parse(trimmed).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Render blocks in display order into a single HTML string.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut ordered: Vec<&Block> = blocks.iter().collect();
    ordered.sort_by_key(|b| b.order);

    let mut html = String::new();
    for block in ordered {
        let inner = match &block.content {
            BlockContent::Storytelling(c) => render_storytelling(c),
            BlockContent::MultiQuestionPoll(c) => render_poll(c),
            BlockContent::ImageText(c) => render_image_text(c),
            BlockContent::Text(c) => render_text(c),
            BlockContent::Image(c) => render_image(c),
            BlockContent::Video(c) => render_video(c),
            BlockContent::Accordion(c) => render_accordion(c),
            BlockContent::Timeline(c) => render_timeline(c),
        };
        html.push_str(&format!(
            "<section class=\"block block-{}\">{inner}</section>",
            block.block_type()
        ));
    }
    html
}

/// Render a full public page for a snapshot.
pub fn render_document(published: &Version, theme: &ResolvedTheme) -> String {
    let snapshot = &published.snapshot;
    let version = published.version;
    let title = html_escape(&snapshot.fields.name);
    let mut html = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{}</style></head><body><main class=\"passport\" data-version=\"{version}\">",
        theme.css_variables()
    );

    if let Some(logo) = &theme.logo {
        let mut attrs = String::new();
        if let Some(w) = logo.width {
            attrs.push_str(&format!(" width=\"{w}\""));
        }
        if let Some(h) = logo.height {
            attrs.push_str(&format!(" height=\"{h}\""));
        }
        html.push_str(&format!(
            "<header><img class=\"logo\" src=\"{}\" alt=\"{}\"{attrs}></header>",
            html_escape(&logo.url),
            html_escape(&logo.alt)
        ));
    }

    html.push_str(&format!("<h1>{title}</h1>"));
    html.push_str(&render_fields(&snapshot.fields));
    html.push_str(&render_blocks(&snapshot.blocks));
    html.push_str(&render_version_footer(published));
    html.push_str("</main></body></html>");
    html
}

/// Public address and scannable-code reference of a version.
fn render_version_footer(published: &Version) -> String {
    let mut html = String::from("<footer class=\"passport-meta\">");
    let address = html_escape(&published.public_url);
    if is_safe_url(&published.public_url) {
        html.push_str(&format!(
            "<p class=\"public-url\"><a href=\"{address}\">{address}</a></p>"
        ));
    } else {
        html.push_str(&format!("<p class=\"public-url\">{address}</p>"));
    }
    if let Some(code) = published.scannable_code.as_deref().filter(|c| !c.is_empty()) {
        let code = html_escape(code);
        html.push_str(&format!(
            "<p class=\"scannable-code\" data-code=\"{code}\">{code}</p>"
        ));
    }
    html.push_str("</footer>");
    html
}

fn render_fields(fields: &ComplianceFields) -> String {
    let text_rows = [
        ("Description", fields.description.as_deref()),
        ("Category", Some(fields.category.as_str())),
        ("SKU", fields.sku.as_deref()),
        ("GTIN", fields.gtin.as_deref()),
        ("Brand", fields.brand.as_deref()),
        ("Country of origin", fields.country_of_origin.as_deref()),
        ("Materials", fields.materials.as_deref()),
        ("Material source", fields.material_source.as_deref()),
        ("Care instructions", fields.care_instructions.as_deref()),
        ("Lifespan", fields.lifespan.as_deref()),
        ("Declaration of conformity", fields.conformity_declaration.as_deref()),
        ("Disposal", fields.disposal_info.as_deref()),
        ("Take-back contact", fields.takeback_contact.as_deref()),
        ("Second life", fields.second_life_info.as_deref()),
    ];
    let flags = [
        ("Repairable", fields.is_repairable),
        ("Spare parts available", fields.spare_parts_available),
        ("Take-back offered", fields.takeback_offered),
    ];

    let mut html = String::from("<dl class=\"compliance\">");
    for (label, value) in text_rows {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            html.push_str(&format!("<dt>{label}</dt><dd>{}</dd>", html_escape(v)));
        }
    }
    for (label, value) in flags {
        let answer = if value { "Yes" } else { "No" };
        html.push_str(&format!("<dt>{label}</dt><dd>{answer}</dd>"));
    }
    html.push_str("</dl>");
    html
}

fn render_media_image(image: &MediaImage) -> String {
    if !is_safe_url(&image.url) {
        return String::new();
    }
    let mut html = format!(
        "<figure><img src=\"{}\" alt=\"{}\">",
        html_escape(&image.url),
        html_escape(&image.alt)
    );
    if !image.caption.is_empty() {
        html.push_str(&format!(
            "<figcaption>{}</figcaption>",
            html_escape(&image.caption)
        ));
    }
    html.push_str("</figure>");
    html
}

fn render_storytelling(c: &StorytellingContent) -> String {
    let mut html = format!(
        "<h2>{}</h2><div class=\"story\">{}</div>",
        sanitize_text(&c.title),
        sanitize_text(&c.description)
    );
    if !c.images.is_empty() {
        html.push_str("<div class=\"gallery\">");
        for image in &c.images {
            html.push_str(&render_media_image(image));
        }
        html.push_str("</div>");
    }
    for section in &c.sections {
        html.push_str("<article>");
        if !section.heading.is_empty() {
            html.push_str(&format!("<h3>{}</h3>", sanitize_text(&section.heading)));
        }
        if is_safe_url(&section.image) {
            html.push_str(&format!(
                "<img src=\"{}\" alt=\"\">",
                html_escape(&section.image)
            ));
        }
        html.push_str(&format!("<p>{}</p></article>", sanitize_text(&section.text)));
    }
    html
}

fn render_poll(c: &PollContent) -> String {
    let mut html = String::from("<form class=\"poll\">");
    for (i, q) in c.questions.iter().enumerate() {
        html.push_str(&format!(
            "<fieldset><legend>{}</legend>",
            html_escape(&q.question)
        ));
        for option in &q.options {
            html.push_str(&format!(
                "<label><input type=\"radio\" name=\"q{i}\" value=\"{value}\" disabled> {value}</label>",
                value = html_escape(option)
            ));
        }
        html.push_str("</fieldset>");
    }
    html.push_str("</form>");
    html
}

fn render_image_text(c: &ImageTextContent) -> String {
    let layout = c.layout.as_str();
    let image = render_media_image(&c.image);
    let text = format!(
        "<div class=\"text\"><h2>{}</h2><p>{}</p></div>",
        sanitize_text(&c.text.heading),
        sanitize_text(&c.text.content)
    );
    // Image first in source order unless it sits right of or below the text
    let body = match c.layout {
        ImageLayout::ImageLeft | ImageLayout::ImageTop => format!("{image}{text}"),
        ImageLayout::ImageRight | ImageLayout::ImageBottom => format!("{text}{image}"),
    };
    format!("<div class=\"image-text {layout}\">{body}</div>")
}

fn render_text(c: &TextContent) -> String {
    let class = format!(
        "align-{} size-{} weight-{} style-{} decoration-{}",
        c.alignment.as_str(),
        c.font_size.as_str(),
        c.font_weight.as_str(),
        c.font_style.as_str(),
        c.text_decoration.as_str()
    );
    let mut html = format!("<div class=\"{class}\">");
    if !c.heading.is_empty() {
        html.push_str(&format!("<h2>{}</h2>", sanitize_text(&c.heading)));
    }
    html.push_str(&format!("<p>{}</p></div>", sanitize_text(&c.text)));
    html
}

fn render_image(c: &ImageContent) -> String {
    let mut html = format!("<div class=\"align-{}\">", c.alignment.as_str());
    for url in c.url.urls().into_iter().filter(|u| is_safe_url(u)) {
        html.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\">",
            html_escape(url),
            html_escape(&c.alt)
        ));
    }
    if !c.caption.is_empty() {
        html.push_str(&format!("<p class=\"caption\">{}</p>", html_escape(&c.caption)));
    }
    html.push_str("</div>");
    html
}

fn render_video(c: &VideoContent) -> String {
    let mut html = String::new();
    if !c.title.is_empty() {
        html.push_str(&format!("<h2>{}</h2>", html_escape(&c.title)));
    }
    if let Some(embed) = embed_url(&c.url) {
        let mut params = Vec::new();
        if c.autoplay {
            params.push("autoplay=1");
        }
        if c.looped {
            params.push("loop=1");
        }
        let src = if params.is_empty() {
            embed
        } else {
            format!("{embed}?{}", params.join("&"))
        };
        html.push_str(&format!(
            "<div class=\"embed-responsive\"><iframe src=\"{}\" frameborder=\"0\" allowfullscreen></iframe></div>",
            html_escape(&src)
        ));
    } else if is_safe_url(&c.url) {
        let escaped = html_escape(&c.url);
        html.push_str(&format!("<a href=\"{escaped}\">{escaped}</a>"));
    }
    if !c.description.is_empty() {
        html.push_str(&format!("<p>{}</p>", sanitize_text(&c.description)));
    }
    html
}

fn render_accordion(c: &AccordionContent) -> String {
    let mut html = String::new();
    if !c.title.is_empty() {
        html.push_str(&format!("<h2>{}</h2>", html_escape(&c.title)));
    }
    for item in &c.items {
        html.push_str(&format!(
            "<details><summary>{}</summary><div>{}</div></details>",
            html_escape(&item.title),
            sanitize_text(&item.content)
        ));
    }
    html
}

fn render_timeline(c: &TimelineContent) -> String {
    let mut html = String::new();
    if !c.title.is_empty() {
        html.push_str(&format!("<h2>{}</h2>", html_escape(&c.title)));
    }
    html.push_str("<ol class=\"timeline\">");
    for event in &c.events {
        html.push_str(&format!(
            "<li><time>{}</time><strong>{}</strong><p>{}</p></li>",
            html_escape(&event.date),
            html_escape(&event.title),
            sanitize_text(&event.description)
        ));
    }
    html.push_str("</ol>");
    html
}

// ---------------------------------------------------------------------------
// Video embeds
// ---------------------------------------------------------------------------

/// Map a YouTube or Vimeo page URL to its embeddable player URL.
///
/// Returns `None` for any other host.
fn embed_url(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.trim_start_matches("www.");
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let id = match host {
        "youtube.com" | "m.youtube.com" => match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())?,
            "embed" => segments.next()?.to_string(),
            _ => return None,
        },
        "youtu.be" => segments.next()?.to_string(),
        "vimeo.com" => segments.next()?.to_string(),
        "player.vimeo.com" => {
            if segments.next()? != "video" {
                return None;
            }
            segments.next()?.to_string()
        }
        _ => return None,
    };

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return None;
    }

    Some(if host.ends_with("vimeo.com") {
        format!("https://player.vimeo.com/video/{id}")
    } else {
        format!("https://www.youtube.com/embed/{id}")
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::block_content::{AccordionItem, ImageUrls};
    use crate::models::{BlockStatus, Snapshot};
    use uuid::Uuid;

    fn block(order: i32, content: BlockContent) -> Block {
        Block {
            id: Uuid::now_v7(),
            document_id: Uuid::nil(),
            order,
            status: BlockStatus::Published,
            content,
            created: 0,
            changed: 0,
        }
    }

    fn text(body: &str) -> BlockContent {
        BlockContent::Text(TextContent {
            text: body.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn safe_urls() {
        assert!(is_safe_url("https://example.com/a.png"));
        assert!(is_safe_url("/files/a.png"));
        assert!(!is_safe_url("//evil.example/a.png"));
        assert!(!is_safe_url("javascript:alert(1)"));
        assert!(!is_safe_url("data:image/png;base64,AAAA"));
    }

    #[test]
    fn blocks_render_in_order() {
        let html = render_blocks(&[block(1, text("second")), block(0, text("first"))]);
        let first = html.find("first").unwrap();
        let second = html.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn text_strips_script() {
        let html = render_blocks(&[block(0, text("Hi<script>alert(1)</script>"))]);
        assert!(html.contains("Hi"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn image_skips_unsafe_urls() {
        let content = BlockContent::Image(ImageContent {
            url: ImageUrls::Multiple(vec![
                "/files/ok.png".to_string(),
                "javascript:alert(1)".to_string(),
            ]),
            alt: "A \"quoted\" alt".to_string(),
            ..Default::default()
        });
        let html = render_blocks(&[block(0, content)]);
        assert!(html.contains("/files/ok.png"));
        assert!(!html.contains("javascript:"));
        assert!(html.contains("&quot;quoted&quot;"));
    }

    #[test]
    fn youtube_watch_becomes_embed() {
        assert_eq!(
            embed_url("https://www.youtube.com/watch?v=abc123").as_deref(),
            Some("https://www.youtube.com/embed/abc123")
        );
        assert_eq!(
            embed_url("https://youtu.be/abc123").as_deref(),
            Some("https://www.youtube.com/embed/abc123")
        );
        assert_eq!(
            embed_url("https://vimeo.com/76979871").as_deref(),
            Some("https://player.vimeo.com/video/76979871")
        );
        assert_eq!(embed_url("https://example.com/watch?v=abc"), None);
    }

    #[test]
    fn video_flags_become_player_params() {
        let content = BlockContent::Video(VideoContent {
            url: "https://youtu.be/abc123".to_string(),
            autoplay: true,
            looped: true,
            ..Default::default()
        });
        let html = render_blocks(&[block(0, content)]);
        assert!(html.contains("embed/abc123?autoplay=1&amp;loop=1"));
    }

    #[test]
    fn non_whitelisted_video_is_a_link() {
        let content = BlockContent::Video(VideoContent {
            url: "https://videos.example/clip.mp4".to_string(),
            ..Default::default()
        });
        let html = render_blocks(&[block(0, content)]);
        assert!(html.contains("<a href=\"https://videos.example/clip.mp4\">"));
        assert!(!html.contains("iframe"));
    }

    #[test]
    fn accordion_renders_details() {
        let content = BlockContent::Accordion(AccordionContent {
            title: "FAQ".to_string(),
            items: vec![AccordionItem {
                title: "Washable?".to_string(),
                content: "Yes, at 30°C.".to_string(),
            }],
        });
        let html = render_blocks(&[block(0, content)]);
        assert!(html.contains("<details><summary>Washable?</summary>"));
    }

    fn version(scannable_code: Option<&str>) -> Version {
        Version {
            id: Uuid::now_v7(),
            document_id: Uuid::now_v7(),
            version: 2,
            created_at: 0,
            created_by: Uuid::nil(),
            snapshot: Snapshot {
                fields: ComplianceFields {
                    brand: Some("Acme & Co".to_string()),
                    ..ComplianceFields::named("Trail Jacket")
                },
                blocks: vec![block(0, text("Story"))],
                styling: None,
            },
            content_hash: String::new(),
            public_url: "https://dpp.example/public/dpp/x/v/2?a=1&b=2".to_string(),
            scannable_code: scannable_code.map(str::to_string),
        }
    }

    #[test]
    fn document_includes_fields_and_theme() {
        let html = render_document(&version(None), &ResolvedTheme::default());
        assert!(html.contains("<h1>Trail Jacket</h1>"));
        assert!(html.contains("Acme &amp; Co"));
        assert!(html.contains("data-version=\"2\""));
        assert!(html.contains("--color-primary:#0A0A0A"));
        assert!(html.contains("Story"));
        assert!(!html.contains("scannable-code"));
    }

    #[test]
    fn footer_shows_address_and_code() {
        let html = render_document(
            &version(Some("https://dpp.example/c?id=\"1\"")),
            &ResolvedTheme::default(),
        );
        assert!(html.contains(
            "<a href=\"https://dpp.example/public/dpp/x/v/2?a=1&amp;b=2\">"
        ));
        assert!(html.contains("data-code=\"https://dpp.example/c?id=&quot;1&quot;\""));
    }
}
