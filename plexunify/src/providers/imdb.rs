//! IMDb parental guide scraping for content ratings
//!
//! The parental guide page links each certificate as
//! `/search/title?certificates=<COUNTRY>:<LABEL>`; the first link for the
//! requested country wins.

use crate::error::ProviderError;
use crate::providers::http::HttpFetcher;
use crate::providers::RatingSource;
use async_trait::async_trait;
use tracing::debug;

const IMDB_TITLE_URL: &str = "https://www.imdb.com/title";

/// Content ratings from IMDb certificate links
pub struct ImdbRatings {
    fetcher: HttpFetcher,
}

impl ImdbRatings {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl RatingSource for ImdbRatings {
    async fn fetch_content_rating(
        &self,
        imdb_id: &str,
        country_code: &str,
    ) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/{}/parentalguide", IMDB_TITLE_URL, imdb_id);
        let page = self
            .fetcher
            .get_text("certification page on imdb", &url, &[])
            .await?;

        let certificate = parse_certificate(&page, country_code);
        debug!(imdb_id, country_code, certificate = ?certificate, "IMDb certificate lookup");
        Ok(certificate)
    }
}

/// Extract the first certificate label for `country_code` from a page
pub fn parse_certificate(page: &str, country_code: &str) -> Option<String> {
    let separators = [":", "%3A", "%3a"];

    for separator in separators {
        let needle = format!("certificates={}{}", country_code, separator);
        let mut search_from = 0;

        while let Some(offset) = page[search_from..].find(&needle) {
            let start = search_from + offset + needle.len();
            let label: String = page[start..]
                .chars()
                .take_while(|c| !matches!(c, '"' | '\'' | '&' | '<' | '>' | ' '))
                .collect();
            let label = label.replace("%20", " ").replace('+', " ");
            if !label.is_empty() {
                return Some(label);
            }
            search_from = start;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_for_country() {
        let page = r#"<li><a href="/search/title?certificates=US:R">United States:R</a></li>
            <li><a href="/search/title?certificates=SE:15">Sweden:15</a></li>"#;
        assert_eq!(parse_certificate(page, "SE"), Some("15".to_string()));
        assert_eq!(parse_certificate(page, "US"), Some("R".to_string()));
    }

    #[test]
    fn test_encoded_separator() {
        let page = r#"<a href="/search/title/?certificates=SE%3ABtl&ref_=x">Btl</a>"#;
        assert_eq!(parse_certificate(page, "SE"), Some("Btl".to_string()));
    }

    #[test]
    fn test_missing_country_is_none() {
        let page = r#"<a href="/search/title?certificates=US:PG-13">PG-13</a>"#;
        assert_eq!(parse_certificate(page, "SE"), None);
        assert_eq!(parse_certificate("", "SE"), None);
    }
}
