//! Standalone HTML page for a preview state.

use crate::model::document::escape_html;
use crate::model::preview::{Phase, PreviewState, RenderSource};

/// Render `state` as a complete HTML page.
pub fn render_page(state: &PreviewState) -> String {
    let title = if state.name.is_empty() {
        "Preview".to_string()
    } else {
        escape_html(&state.name)
    };

    let body = match (&state.phase, &state.source, &state.error) {
        (Phase::Error, _, Some(message)) => {
            format!("<p class=\"error\">{}</p>", escape_html(message))
        }
        (_, Some(source), _) => render_source(source, &state.mime),
        _ => "<p class=\"empty\">Nothing to preview.</p>".to_string(),
    };

    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{title}</title>\n</head>\n<body>\n"));
    page.push_str(&body);
    page.push('\n');

    if !state.attachments.is_empty() {
        page.push_str("<ul class=\"attachments\">\n");
        for link in &state.attachments {
            page.push_str(&format!(
                "<li><a href=\"{}\" type=\"{}\">{}</a></li>\n",
                escape_html(link.url.url()),
                escape_html(&link.mime_type),
                escape_html(&link.name)
            ));
        }
        page.push_str("</ul>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}

fn render_source(source: &RenderSource, mime: &str) -> String {
    match source {
        RenderSource::DataUri(uri) => format!("<img src=\"{}\">", escape_html(uri)),
        RenderSource::Text(text) => format!("<pre>{}</pre>", escape_html(text)),
        RenderSource::Html(html) => html.clone(),
        RenderSource::Handle(handle) => format!(
            "<object data=\"{}\" type=\"{}\"><a href=\"{}\">Download</a></object>",
            escape_html(handle.url()),
            escape_html(mime),
            escape_html(handle.url())
        ),
    }
}
