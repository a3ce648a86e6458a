//! Directory listing page

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Response, StatusCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt::Write;
use std::path::Path;
use tokio::fs;

use crate::http::{self, ServeError};

/// Characters escaped in listing hrefs
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'&')
    .add(b'?')
    .add(b'%');

struct Entry {
    name: String,
    is_dir: bool,
}

/// Render an HTML listing of `dir`.
///
/// `request_path` is the decoded URL path; every direct child of `dir`
/// appears exactly once, directories first.
pub async fn serve_listing(
    dir: &Path,
    request_path: &str,
    is_head: bool,
) -> Result<Response<Full<Bytes>>, ServeError> {
    let mut entries = read_entries(dir).await.map_err(ServeError::from_io)?;
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    let body = render(&entries, request_path);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(http::build_response(
        StatusCode::OK,
        headers,
        Bytes::from(body),
        is_head,
    ))
}

async fn read_entries(dir: &Path) -> std::io::Result<Vec<Entry>> {
    let mut read_dir = fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
        });
    }
    Ok(entries)
}

fn render(entries: &[Entry], request_path: &str) -> String {
    let base = if request_path.ends_with('/') {
        request_path.to_string()
    } else {
        format!("{request_path}/")
    };
    let title = escape_html(&base);

    let mut html = String::with_capacity(512 + entries.len() * 96);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>Index of {title}</title>");
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>Index of {title}</h1>");
    html.push_str("<ul>\n");

    if base != "/" {
        let parent = parent_of(&base);
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">../</a></li>",
            utf8_percent_encode(parent, HREF)
        );
    }

    for entry in entries {
        let slash = if entry.is_dir { "/" } else { "" };
        let _ = writeln!(
            html,
            "<li><a href=\"{}{}{slash}\">{}{slash}</a></li>",
            utf8_percent_encode(&base, HREF),
            utf8_percent_encode(&entry.name, HREF),
            escape_html(&entry.name),
        );
    }

    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

/// Parent of a slash-terminated path, itself slash-terminated
fn parent_of(base: &str) -> &str {
    let trimmed = base.trim_end_matches('/');
    trimmed.rfind('/').map_or("/", |idx| &base[..=idx])
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
