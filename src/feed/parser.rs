use serde::Deserialize;

/// A feed document as fetched: channel metadata plus items in document order.
///
/// All text has already been passed through [`unescape`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub title: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

/// One `<item>` of a channel. `pub_date` is the raw, unparsed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

// Wire shape. Unknown elements (guid, category, ...) are ignored and missing
// text elements decode as empty strings.
//
// Element names match on their local part, so `<itunes:title>` and
// `<atom:link>` arrive under the same key as `<title>` and `<link>`. Each
// text field is therefore collected as a list and the first non-empty entry
// wins.

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(default)]
    title: Vec<TextElement>,
    #[serde(default)]
    description: Vec<TextElement>,
    #[serde(default, rename = "item")]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Vec<TextElement>,
    #[serde(default)]
    link: Vec<TextElement>,
    #[serde(default)]
    description: Vec<TextElement>,
    #[serde(default, rename = "pubDate")]
    pub_date: Vec<TextElement>,
}

/// Text content of an element; attributes and child elements are ignored.
#[derive(Debug, Default, Deserialize)]
struct TextElement {
    #[serde(default, rename = "$text")]
    text: String,
}

fn first_text(elements: Vec<TextElement>) -> String {
    elements
        .into_iter()
        .map(|e| e.text)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// Decode an RSS document and unescape HTML entities in its text.
///
/// The XML layer resolves only the five predefined entities, so text that
/// publishers escaped twice (`&amp;amp;`) arrives here as `&amp;` and is
/// unescaped once more.
pub fn parse_document(bytes: &[u8]) -> Result<FetchedDocument, quick_xml::DeError> {
    let doc: RssDocument = quick_xml::de::from_reader(bytes)?;
    let channel = doc.channel;

    Ok(FetchedDocument {
        title: unescape(&first_text(channel.title)),
        description: unescape(&first_text(channel.description)),
        items: channel
            .items
            .into_iter()
            .map(|item| FeedItem {
                title: unescape(&first_text(item.title)),
                link: first_text(item.link),
                description: unescape(&first_text(item.description)),
                pub_date: first_text(item.pub_date),
            })
            .collect(),
    })
}

fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
