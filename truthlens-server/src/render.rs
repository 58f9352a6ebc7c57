//! HTML rendering for results pages.
//!
//! Every user-visible outcome (full results, analysis-in-progress,
//! unsupported image, 404, 410) renders a complete branded document, never
//! a bare status code. Open Graph image references always point at this
//! server's own image route so shared links outlive any upstream CDN.

use truthlens_core::Verdict;

use crate::store::{OracleStatus, PageView};

/// Escape text for interpolation into HTML.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Shared document shell.
fn layout(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
{head_extra}
<style>
body {{ font-family: system-ui, sans-serif; margin: 0; background: #0f1115; color: #e8eaf0; }}
main {{ max-width: 640px; margin: 0 auto; padding: 3rem 1.5rem; }}
.brand {{ font-weight: 700; letter-spacing: 0.02em; color: #7aa2ff; }}
.card {{ background: #181b22; border-radius: 12px; padding: 2rem; margin-top: 1.5rem; }}
.verdict {{ font-size: 1.6rem; font-weight: 700; margin: 0.5rem 0; }}
.verdict.ai {{ color: #ff7a90; }}
.verdict.human {{ color: #6fe0a8; }}
.verdict.uncertain {{ color: #ffc96b; }}
.probability {{ font-size: 2.8rem; font-weight: 800; }}
.muted {{ color: #9aa3b5; }}
img.subject {{ max-width: 100%; border-radius: 8px; margin-top: 1rem; }}
footer {{ margin-top: 2.5rem; font-size: 0.85rem; color: #5d6575; }}
</style>
</head>
<body>
<main>
<div class="brand">TruthLens</div>
{body}
<footer>AI-image detection by TruthLens. Results are probabilistic, not proof.</footer>
</main>
</body>
</html>
"#
    )
}

fn meta_tags(view: &PageView, base_url: &str, description: &str) -> String {
    let page_url = format!("{}/d/{}", base_url, view.page.page_id);
    // Always our own image route, never the upstream URL.
    let image_url = format!("{page_url}/image");
    let robots = if view.detection.robots_index {
        "index,follow"
    } else {
        "noindex,nofollow"
    };
    let description = escape(description);

    format!(
        r#"<meta name="description" content="{description}">
<meta name="robots" content="{robots}">
<meta property="og:title" content="TruthLens — AI Image Detection Result">
<meta property="og:description" content="{description}">
<meta property="og:type" content="website">
<meta property="og:url" content="{page_url}">
<meta property="og:image" content="{image_url}">
<meta name="twitter:card" content="summary_large_image">
<meta name="twitter:image" content="{image_url}">"#
    )
}

fn default_description(view: &PageView) -> String {
    match view.detection.verdict() {
        Some(v) => format!(
            "Verdict: {} ({}% likely AI-generated). Image shared by @{}.",
            v.label(),
            probability_percent(view),
            view.detection.source_handle
        ),
        None => format!(
            "AI-image analysis for a photo shared by @{}.",
            view.detection.source_handle
        ),
    }
}

fn probability_percent(view: &PageView) -> u32 {
    (view.detection.ai_probability.unwrap_or(0.0) * 100.0).round() as u32
}

/// Render the document for a live (non-deleted) page, in whichever state
/// the detection is in.
pub fn results_page(view: &PageView, base_url: &str) -> String {
    let description = view
        .detection
        .meta_description
        .clone()
        .unwrap_or_else(|| default_description(view));
    let meta = meta_tags(view, base_url, &description);

    let body = match (view.detection.ai_probability, view.detection.oracle_status) {
        (Some(probability), _) => scored_body(view, probability),
        (None, OracleStatus::Unsupported) => unsupported_body(view),
        (None, _) => processing_body(view),
    };

    // The processing state refreshes itself; scored pages are stable.
    let head_extra = if view.detection.ai_probability.is_none()
        && view.detection.oracle_status != OracleStatus::Unsupported
    {
        format!("{meta}\n<meta http-equiv=\"refresh\" content=\"10\">")
    } else {
        meta
    };

    layout("TruthLens — AI Image Detection Result", &head_extra, &body)
}

fn scored_body(view: &PageView, probability: f64) -> String {
    let verdict = Verdict::from_probability(probability);
    let class = match verdict {
        Verdict::AiGenerated => "ai",
        Verdict::HumanCreated => "human",
        Verdict::Uncertain => "uncertain",
    };
    let percent = (probability * 100.0).round() as u32;
    let handle = escape(&view.detection.source_handle);
    let caption = view
        .detection
        .image_description
        .as_deref()
        .map(|d| format!("<p class=\"muted\">{}</p>", escape(d)))
        .unwrap_or_default();

    format!(
        r#"<div class="card">
<div class="probability">{percent}%</div>
<p class="muted">likelihood this image was AI-generated</p>
<div class="verdict {class}">{verdict}</div>
<img class="subject" src="/d/{page_id}/image" alt="Analyzed image">
{caption}
<p class="muted">Shared by @{handle} · {views} views</p>
</div>"#,
        page_id = view.page.page_id,
        views = view.page.view_count,
    )
}

fn processing_body(view: &PageView) -> String {
    let handle = escape(&view.detection.source_handle);
    format!(
        r#"<div class="card">
<div class="verdict uncertain">Analysis in progress</div>
<p class="muted">We're still scoring this image. This page refreshes automatically.</p>
<img class="subject" src="/d/{page_id}/image" alt="Image being analyzed">
<p class="muted">Shared by @{handle}</p>
</div>"#,
        page_id = view.page.page_id,
    )
}

fn unsupported_body(view: &PageView) -> String {
    let handle = escape(&view.detection.source_handle);
    format!(
        r#"<div class="card">
<div class="verdict uncertain">Could not analyze</div>
<p class="muted">This image is in a format our detector does not support.</p>
<p class="muted">Shared by @{handle}</p>
</div>"#
    )
}

/// 404 document for unknown page ids.
pub fn not_found_page() -> String {
    layout(
        "TruthLens — Not Found",
        r#"<meta name="robots" content="noindex">"#,
        r#"<div class="card">
<div class="verdict uncertain">Result not found</div>
<p class="muted">There is no detection result at this address. The link may be mistyped.</p>
</div>"#,
    )
}

/// 500 document for storage failures on the page path; the page server
/// never answers with a bare status code.
pub fn error_page() -> String {
    layout(
        "TruthLens — Error",
        r#"<meta name="robots" content="noindex">"#,
        r#"<div class="card">
<div class="verdict uncertain">Something went wrong</div>
<p class="muted">We couldn't load this result right now. Please try again shortly.</p>
</div>"#,
    )
}

/// 410 document for soft-deleted pages.
pub fn gone_page() -> String {
    layout(
        "TruthLens — Removed",
        r#"<meta name="robots" content="noindex">"#,
        r#"<div class="card">
<div class="verdict uncertain">Result removed</div>
<p class="muted">This detection result has been removed and is no longer available.</p>
</div>"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Detection, DetectionPage, OracleStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn view(probability: Option<f64>, status: OracleStatus) -> PageView {
        let now = Utc::now();
        PageView {
            detection: Detection {
                id: Uuid::new_v4(),
                source_event_id: None,
                source_handle: "alice<script>".to_string(),
                image_url: Some("https://cdn.example/raw.jpg".to_string()),
                image_blob: None,
                image_content_type: None,
                ai_probability: probability,
                oracle_confidence: None,
                oracle_status: status,
                image_description: None,
                meta_description: None,
                robots_index: false,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
            page: DetectionPage {
                page_id: "abcd2345".to_string(),
                detection_id: Uuid::new_v4(),
                view_count: 7,
                last_viewed_at: None,
                created_at: now,
            },
        }
    }

    #[test]
    fn test_scored_page_shows_verdict_and_own_image_route() {
        let html = results_page(&view(Some(0.85), OracleStatus::Scored), "https://t.example");

        assert!(html.contains("AI Generated"));
        assert!(html.contains("85%"));
        // OG image must be our own route, never the upstream CDN URL.
        assert!(html.contains("https://t.example/d/abcd2345/image"));
        assert!(!html.contains("cdn.example/raw.jpg"));
    }

    #[test]
    fn test_processing_page_refreshes() {
        let html = results_page(&view(None, OracleStatus::Pending), "https://t.example");

        assert!(html.contains("Analysis in progress"));
        assert!(html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn test_unsupported_page_does_not_refresh() {
        let html = results_page(&view(None, OracleStatus::Unsupported), "https://t.example");

        assert!(html.contains("Could not analyze"));
        assert!(!html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn test_handles_are_escaped() {
        let html = results_page(&view(Some(0.2), OracleStatus::Scored), "https://t.example");

        assert!(html.contains("alice&lt;script&gt;"));
        assert!(!html.contains("alice<script>"));
    }

    #[test]
    fn test_robots_directive_defaults_to_noindex() {
        let html = results_page(&view(Some(0.5), OracleStatus::Scored), "https://t.example");
        assert!(html.contains("noindex,nofollow"));
    }

    #[test]
    fn test_error_pages_are_branded() {
        assert!(not_found_page().contains("TruthLens"));
        assert!(gone_page().contains("removed"));
    }
}
