use crate::feed::parser::{parse_document, FetchedDocument};
use futures::StreamExt;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use thiserror::Error;

/// Sent with every feed request
pub const GATOR_USER_AGENT: &str = "gator/1.0";

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a feed.
///
/// None of these are retried here; the caller decides what a failed fetch
/// means for the current cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Any status other than 200 OK
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Body is not a well-formed RSS document
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Fetch and decode the feed at `url`.
///
/// Performs a single GET with the gator user agent. Anything but `200 OK`
/// is a [`FetchError::HttpStatus`]; redirects are followed by the client.
/// The returned document's text is already entity-unescaped.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
) -> Result<FetchedDocument, FetchError> {
    let response = client
        .get(url)
        .header(USER_AGENT, GATOR_USER_AGENT)
        .send()
        .await?;

    if response.status() != StatusCode::OK {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    let document = parse_document(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    tracing::debug!(
        url = %url,
        title = %document.title,
        items = document.items.len(),
        "Feed fetched"
    );

    Ok(document)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Test &amp;amp; Feed</title>
    <description>About things</description>
    <item>
        <title>One</title>
        <link>https://example.com/1</link>
        <description>First</description>
        <pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate>
    </item>
</channel></rss>"#;

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(header("user-agent", GATOR_USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let doc = fetch_feed(&client, &format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(doc.title, "Test & Feed");
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].link, "https://example.com/1");
    }

    #[tokio::test]
    async fn test_fetch_404_is_http_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch_feed(&client, &format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch_feed(&client, &format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(500)));
    }

    #[tokio::test]
    async fn test_fetch_non_200_success_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch_feed(&client, &format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(204)));
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch_feed(&client, &format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        match err {
            FetchError::Parse(_) => {}
            e => panic!("Expected Parse error, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let mock_server = MockServer::start().await;
        let url = format!("{}/feed", mock_server.uri());
        drop(mock_server);

        let client = reqwest::Client::new();
        let err = fetch_feed(&client, &url).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "got {:?}", err);
    }
}
