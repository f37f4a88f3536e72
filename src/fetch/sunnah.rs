//! sunnah.com API client (books and chapters listings)

use super::HttpFetcher;
use crate::config::ApiConfig;
use crate::error::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// One page of a listing endpoint
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    next: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalizedName {
    pub lang: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBook {
    #[serde(rename = "bookNumber")]
    book_number: Value,
    #[serde(default)]
    pub book: Vec<LocalizedName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalizedChapter {
    pub lang: String,
    #[serde(default, rename = "chapterTitle")]
    pub title: Option<String>,
    #[serde(default)]
    pub intro: Option<String>,
    #[serde(default)]
    pub ending: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiChapter {
    #[serde(default, rename = "chapterId")]
    chapter_id: Value,
    #[serde(default)]
    pub chapter: Vec<LocalizedChapter>,
}

/// String form of an id the API sends as either string or number
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ApiBook {
    pub fn number(&self) -> Option<String> {
        id_string(&self.book_number)
    }

    pub fn name(&self, lang: &str) -> Option<String> {
        self.book
            .iter()
            .find(|n| n.lang == lang)
            .and_then(|n| n.name.clone())
    }
}

impl ApiChapter {
    pub fn id(&self) -> Option<String> {
        id_string(&self.chapter_id)
    }

    pub fn localized(&self, lang: &str) -> Option<&LocalizedChapter> {
        self.chapter.iter().find(|c| c.lang == lang)
    }
}

pub struct SunnahClient {
    fetcher: HttpFetcher,
    base_url: String,
    api_key: Option<String>,
    page_limit: u32,
}

impl SunnahClient {
    pub fn new(
        fetcher: HttpFetcher,
        base_url: &str,
        api_key: Option<String>,
        page_limit: u32,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            page_limit: page_limit.max(1),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Ok(Self::new(
            HttpFetcher::from_config(config)?,
            &config.base_url,
            config.api_key(),
            config.page_limit,
        ))
    }

    pub fn request_count(&self) -> u64 {
        self.fetcher.request_count()
    }

    pub async fn books(&self, collection: &str) -> Result<Vec<ApiBook>> {
        self.list(&format!("/collections/{}/books", collection))
            .await
    }

    pub async fn chapters(&self, collection: &str, book_number: &str) -> Result<Vec<ApiChapter>> {
        self.list(&format!(
            "/collections/{}/books/{}/chapters",
            collection, book_number
        ))
        .await
    }

    /// Follow `next` pages; a 404 is an empty listing
    async fn list<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let headers: Vec<(&str, &str)> = self
            .api_key
            .as_deref()
            .map(|key| vec![("X-API-Key", key)])
            .unwrap_or_default();

        let mut items = Vec::new();
        let mut page = 1_u64;
        loop {
            let url = format!(
                "{}{}?limit={}&page={}",
                self.base_url, path, self.page_limit, page
            );
            let Some(body) = self.fetcher.get_json::<Page<T>>(&url, &headers).await? else {
                debug!("{} not found", url);
                break;
            };
            items.extend(body.data);

            match body.next.as_ref().and_then(Value::as_u64) {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::test_fetcher;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_books_follow_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/bukhari/books"))
            .and(query_param("page", "1"))
            .and(header("X-API-Key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": [{"bookNumber": "1", "book": [{"lang": "en", "name": "Revelation"}, {"lang": "ar", "name": "بدء الوحي"}]}], "next": 2}"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/collections/bukhari/books"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": [{"bookNumber": 2, "book": []}], "next": null}"#,
            ))
            .mount(&server)
            .await;

        let client = SunnahClient::new(test_fetcher(3), &server.uri(), Some("k".to_string()), 200);
        let books = client.books("bukhari").await.unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].number().as_deref(), Some("1"));
        assert_eq!(books[0].name("ar").as_deref(), Some("بدء الوحي"));
        assert_eq!(books[1].number().as_deref(), Some("2"));
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn test_chapters_and_missing_book() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/muslim/books/1/chapters"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": [{"chapterId": "1.00", "chapter": [{"lang": "en", "chapterTitle": "Intentions", "intro": "i", "ending": null}]}]}"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/collections/muslim/books/99/chapters"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = SunnahClient::new(test_fetcher(3), &server.uri(), None, 200);
        let chapters = client.chapters("muslim", "1").await.unwrap();
        assert_eq!(chapters[0].id().as_deref(), Some("1.00"));
        let en = chapters[0].localized("en").unwrap();
        assert_eq!(en.title.as_deref(), Some("Intentions"));
        assert_eq!(en.intro.as_deref(), Some("i"));

        assert!(client.chapters("muslim", "99").await.unwrap().is_empty());
    }
}
