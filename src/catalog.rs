//! Book search against the Google Books catalog.

use crate::config::CatalogConfig;
use crate::error::{AppError, Result};
use crate::library::book::Book;
use serde::Deserialize;
use std::time::Duration;

/// Largest page the catalog serves.
pub const MAX_PAGE_SIZE: u32 = 40;

const NO_DESCRIPTION: &str = "No description available";
const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    items: Option<Vec<VolumeItem>>,
}

#[derive(Debug, Deserialize)]
struct VolumeItem {
    #[serde(default)]
    id: String,
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    authors: Option<Vec<String>>,
    description: Option<String>,
    #[serde(rename = "imageLinks")]
    image_links: Option<ImageLinks>,
    #[serde(rename = "averageRating")]
    average_rating: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

/// Results of one search. Consumed once; not restartable.
#[derive(Debug, Default)]
pub struct SearchResults {
    items: std::vec::IntoIter<Book>,
}

impl SearchResults {
    /// No results.
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_books(books: Vec<Book>) -> Self {
        Self {
            items: books.into_iter(),
        }
    }

    /// Whether no results remain.
    pub fn is_empty(&self) -> bool {
        self.items.len() == 0
    }
}

impl Iterator for SearchResults {
    type Item = Book;

    fn next(&mut self) -> Option<Book> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for SearchResults {}

/// Client for the catalog search API.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    max_results: u32,
}

impl CatalogClient {
    /// Build a client from configuration.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("readshelf/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results.clamp(1, MAX_PAGE_SIZE),
        })
    }

    /// Search by title or author. Any failure yields no results.
    pub async fn search(&self, query: &str) -> SearchResults {
        let query = query.trim();
        if query.is_empty() {
            return SearchResults::empty();
        }

        match self.fetch(query).await {
            Ok(books) => {
                tracing::debug!(query = %query, count = books.len(), "Catalog search complete");
                SearchResults::from_books(books)
            }
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Catalog search failed");
                SearchResults::empty()
            }
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Book>> {
        let url = format!(
            "{}/volumes?q={}&maxResults={}",
            self.base_url,
            urlencoding::encode(&search_terms(query)),
            self.max_results
        );

        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Internal(format!(
                "Catalog returned status {}",
                resp.status()
            )));
        }

        let parsed: VolumesResponse = resp.json().await?;
        Ok(parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .map(map_volume)
            .collect())
    }
}

/// Catalog query matching the text in either title or author.
fn search_terms(query: &str) -> String {
    format!("intitle:{} inauthor:{}", query, query)
}

/// Rewrite an insecure URL to https.
pub fn secure_url(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

fn map_volume(item: VolumeItem) -> Book {
    let info = item.volume_info;

    let author = match info.authors {
        Some(authors) if !authors.is_empty() => authors.join(", "),
        _ => UNKNOWN_AUTHOR.to_string(),
    };

    let description = info
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    let cover_url = info
        .image_links
        .and_then(|links| links.thumbnail)
        .map(|t| secure_url(&t))
        .unwrap_or_default();

    Book {
        catalog_id: item.id,
        title: info.title,
        author,
        description,
        cover_url,
        rating: info.average_rating.unwrap_or(0.0).clamp(0.0, 5.0),
        ..Book::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::book::ReadingStatus;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base_url: &str) -> CatalogClient {
        CatalogClient::new(&CatalogConfig {
            base_url: base_url.to_string(),
            max_results: 40,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn parse(json: serde_json::Value) -> Vec<Book> {
        let resp: VolumesResponse = serde_json::from_value(json).unwrap();
        resp.items
            .unwrap_or_default()
            .into_iter()
            .map(map_volume)
            .collect()
    }

    #[test]
    fn map_full_volume() {
        let books = parse(serde_json::json!({
            "items": [{
                "id": "vol-1",
                "volumeInfo": {
                    "title": "Dune",
                    "authors": ["Frank Herbert", "Brian Herbert"],
                    "description": "Desert planet.",
                    "imageLinks": { "thumbnail": "http://books.google.com/c.jpg" },
                    "averageRating": 4.5
                }
            }]
        }));

        assert_eq!(books.len(), 1);
        let b = &books[0];
        assert_eq!(b.catalog_id, "vol-1");
        assert_eq!(b.title, "Dune");
        assert_eq!(b.author, "Frank Herbert, Brian Herbert");
        assert_eq!(b.cover_url, "https://books.google.com/c.jpg");
        assert_eq!(b.rating, 4.5);
        assert!(b.id.is_none());
        assert_eq!(b.status, ReadingStatus::ToRead);
        assert!(!b.favorite);
    }

    #[test]
    fn map_missing_fields() {
        let books = parse(serde_json::json!({
            "items": [
                { "id": "a", "volumeInfo": { "title": "Bare" } },
                { "id": "b", "volumeInfo": { "title": "Empty", "authors": [], "description": "  " } }
            ]
        }));

        for b in &books {
            assert_eq!(b.author, "Unknown");
            assert_eq!(b.description, "No description available");
            assert_eq!(b.cover_url, "");
            assert_eq!(b.rating, 0.0);
        }
    }

    #[test]
    fn no_items_is_empty() {
        assert!(parse(serde_json::json!({ "totalItems": 0 })).is_empty());
    }

    #[test]
    fn secure_url_rewrites_only_http() {
        assert_eq!(secure_url("http://x/y"), "https://x/y");
        assert_eq!(secure_url("https://x/y"), "https://x/y");
        assert_eq!(secure_url(""), "");
    }

    #[tokio::test]
    async fn search_dune_secures_covers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/volumes"))
            .and(query_param("q", "intitle:dune inauthor:dune"))
            .and(query_param("maxResults", "40"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalItems": 2,
                "items": [
                    {
                        "id": "d1",
                        "volumeInfo": {
                            "title": "Dune",
                            "authors": ["Frank Herbert"],
                            "imageLinks": { "thumbnail": "http://books.google.com/d1.jpg" }
                        }
                    },
                    {
                        "id": "d2",
                        "volumeInfo": {
                            "title": "Dune Messiah",
                            "imageLinks": { "thumbnail": "http://books.google.com/d2.jpg" }
                        }
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client_for(&server.uri()).search("dune").await;
        assert_eq!(results.len(), 2);
        let books: Vec<Book> = results.collect();
        assert!(books.iter().all(|b| b.cover_url.starts_with("https://")));
        assert_eq!(books[1].author, "Unknown");
    }

    #[tokio::test]
    async fn server_error_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let results = client_for(&server.uri()).search("dune").await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let results = client_for(&server.uri()).search("dune").await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn unreachable_catalog_yields_empty() {
        let results = client_for("http://127.0.0.1:1").search("dune").await;
        assert_eq!(results.count(), 0);
    }

    #[tokio::test]
    async fn blank_query_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(client_for(&server.uri()).search("   ").await.is_empty());
    }

    #[test]
    fn page_size_is_capped() {
        let client = CatalogClient::new(&CatalogConfig {
            base_url: "https://example.com/".to_string(),
            max_results: 500,
            timeout_seconds: 5,
        })
        .unwrap();
        assert_eq!(client.max_results, MAX_PAGE_SIZE);
        assert_eq!(client.base_url, "https://example.com");
    }
}
