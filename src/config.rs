//! Endpoint configuration.

use reqwest::Url;

use crate::error::{DriveError, Result};
use crate::models::AccountEndpoint;

/// Default metadata endpoint of Cloud Drive.
pub const DEFAULT_METADATA_URL: &str = "https://cdws.us-east-1.amazonaws.com/drive/v1/";

/// Default content endpoint of Cloud Drive.
pub const DEFAULT_CONTENT_URL: &str = "https://content-na.drive.amazonaws.com/cdproxy/";

/// The two base URLs every request is made against.
///
/// Node and account metadata live on the metadata endpoint, file bytes are
/// moved through the content endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub metadata: Url,
    pub content: Url,
}

impl Endpoints {
    pub fn new(metadata: &str, content: &str) -> Result<Self> {
        Ok(Self {
            metadata: parse_base(metadata)?,
            content: parse_base(content)?,
        })
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            metadata: Url::parse(DEFAULT_METADATA_URL).expect("valid default metadata URL"),
            content: Url::parse(DEFAULT_CONTENT_URL).expect("valid default content URL"),
        }
    }
}

impl TryFrom<AccountEndpoint> for Endpoints {
    type Error = DriveError;

    fn try_from(endpoint: AccountEndpoint) -> Result<Self> {
        Self::new(&endpoint.metadata_url, &endpoint.content_url)
    }
}

/// Parse a base URL, making sure it ends in `/` so relative paths join
/// below it instead of replacing its last segment.
fn parse_base(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let parsed =
        Url::parse(&normalized).map_err(|e| DriveError::InvalidEndpoint(format!("{}: {}", url, e)))?;

    if parsed.cannot_be_a_base() {
        return Err(DriveError::InvalidEndpoint(url.to_string()));
    }

    Ok(parsed)
}
