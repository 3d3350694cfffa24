// src/utils.rs
use scraper::Html;
use url::Url;

/// Elements whose text never reaches a reader
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Collapse every run of whitespace into a single space
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased, whitespace-collapsed form used for label comparisons
pub fn normalize_label(label: &str) -> String {
    clean_text(label).to_lowercase()
}

/// Clip to at most `limit` characters, marking the cut with "..."
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit <= 3 {
        return text.chars().take(limit).collect();
    }
    let mut clipped: String = text.chars().take(limit - 3).collect();
    clipped.push_str("...");
    clipped
}

/// Visible text of an HTML fragment or document
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = document
        .root_element()
        .descendants()
        .filter(|node| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|e| NON_CONTENT_TAGS.contains(&e.name()))
            })
        })
        .filter_map(|node| node.value().as_text().map(|t| &**t))
        .collect::<Vec<_>>()
        .join(" ");
    clean_text(&text)
}

/// Job id from a posting URL: `/jobs/view/<id>` or `?currentJobId=<id>`
pub fn job_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;

    if let Some(id) = url
        .query_pairs()
        .find(|(key, _)| key == "currentJobId")
        .map(|(_, value)| value.into_owned())
        .filter(|id| is_job_id(id))
    {
        return Some(id);
    }

    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "view" {
            return segments
                .next()
                .map(|id| id.trim_end_matches('/').to_string())
                .filter(|id| is_job_id(id));
        }
    }
    None
}

fn is_job_id(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit())
}
