//! Error page rendering
//!
//! Serves the configured custom page for a status when it can be read,
//! otherwise a minimal built-in page. Bodies never carry filesystem paths or
//! internal error detail.

use hyper::body::Bytes;
use hyper::StatusCode;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;

use crate::http::mime;
use crate::logger;

const HTML: &str = "text/html; charset=utf-8";

/// A rendered error body and its content type
#[derive(Debug)]
pub struct ErrorPage {
    pub body: Bytes,
    pub content_type: &'static str,
}

pub async fn render(status: StatusCode, pages: &HashMap<StatusCode, PathBuf>) -> ErrorPage {
    if let Some(path) = pages.get(&status) {
        match fs::read(path).await {
            Ok(content) => {
                return ErrorPage {
                    body: Bytes::from(content),
                    content_type: mime::content_type_for(path),
                };
            }
            Err(e) => logger::log_warning(&format!(
                "Custom error page for {} unreadable ({}): {e}",
                status.as_u16(),
                path.display()
            )),
        }
    }
    builtin_page(status)
}

/// Minimal page stating the status
pub fn builtin_page(status: StatusCode) -> ErrorPage {
    let text = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    let html = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{text}</title></head>\n<body>\n<h1>{text}</h1>\n</body>\n</html>\n"
    );
    ErrorPage {
        body: Bytes::from(html),
        content_type: HTML,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_page() {
        let page = builtin_page(StatusCode::NOT_FOUND);
        let html = String::from_utf8(page.body.to_vec()).unwrap();
        assert!(html.contains("<h1>404 Not Found</h1>"));
        assert_eq!(page.content_type, HTML);
    }

    #[tokio::test]
    async fn test_custom_page() {
        let dir = TempDir::new().unwrap();
        let page_path = dir.path().join("404.html");
        std::fs::write(&page_path, "<p>lost</p>").unwrap();
        let pages = HashMap::from([(StatusCode::NOT_FOUND, page_path)]);

        let page = render(StatusCode::NOT_FOUND, &pages).await;
        assert_eq!(page.body, Bytes::from("<p>lost</p>"));
        assert_eq!(page.content_type, HTML);

        let other = render(StatusCode::FORBIDDEN, &pages).await;
        assert!(String::from_utf8_lossy(&other.body).contains("403 Forbidden"));
    }

    #[tokio::test]
    async fn test_unreadable_custom_page_falls_back() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing-500.html");
        let pages = HashMap::from([(StatusCode::INTERNAL_SERVER_ERROR, missing)]);

        let page = render(StatusCode::INTERNAL_SERVER_ERROR, &pages).await;
        let html = String::from_utf8(page.body.to_vec()).unwrap();
        assert!(html.contains("500 Internal Server Error"));
        assert!(!html.contains("missing-500"));
        assert!(!html.contains(&dir.path().display().to_string()));
    }
}
