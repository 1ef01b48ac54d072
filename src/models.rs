//! Data models for Cloud Drive API responses.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The kind tag the API attaches to every node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    File,
    Folder,
    /// Any kind this client has no typed view for (e.g. `ASSET`).
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::File => "FILE",
            NodeKind::Folder => "FOLDER",
            NodeKind::Other(kind) => kind,
        }
    }
}

impl From<String> for NodeKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "FILE" => NodeKind::File,
            "FOLDER" => NodeKind::Folder,
            _ => NodeKind::Other(kind),
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => f.write_str("file"),
            NodeKind::Folder => f.write_str("folder"),
            NodeKind::Other(kind) => f.write_str(kind),
        }
    }
}

/// Content properties, present on nodes that carry content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentProperties {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// A file or folder on Cloud Drive.
///
/// Nodes are plain values. Follow-up calls (children, download, ...) go
/// through [`crate::nodes::NodesService`] with the node passed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub modified_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub content_properties: Option<ContentProperties>,
}

impl Node {
    /// Whether the node represents a file.
    pub fn is_file(&self) -> bool {
        self.kind == Some(NodeKind::File)
    }

    /// Whether the node represents a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == Some(NodeKind::Folder)
    }

    /// Content size in bytes, if the server reported one.
    pub fn size(&self) -> Option<u64> {
        self.content_properties.as_ref().and_then(|p| p.size)
    }

    /// Classify the node into its typed view.
    ///
    /// Never fails: nodes with an absent or unknown kind come back as
    /// [`TypedNode::Node`].
    pub fn typed(self) -> TypedNode {
        if self.is_file() {
            TypedNode::File(File(self))
        } else if self.is_folder() {
            TypedNode::Folder(Folder(self))
        } else {
            TypedNode::Node(self)
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size_str = self
            .size()
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        let kind = self.kind.as_ref().map(NodeKind::as_str).unwrap_or("-");
        write!(f, "{}\t{}\t{}\t{}", self.id, size_str, kind, self.name)
    }
}

/// A node seen through its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedNode {
    File(File),
    Folder(Folder),
    /// Neither a file nor a folder.
    Node(Node),
}

impl TypedNode {
    pub fn node(&self) -> &Node {
        match self {
            TypedNode::File(file) => &file.0,
            TypedNode::Folder(folder) => &folder.0,
            TypedNode::Node(node) => node,
        }
    }

    pub fn into_node(self) -> Node {
        match self {
            TypedNode::File(file) => file.0,
            TypedNode::Folder(folder) => folder.0,
            TypedNode::Node(node) => node,
        }
    }
}

/// A node of kind `FILE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File(Node);

/// A node of kind `FOLDER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder(Node);

macro_rules! typed_view {
    ($view:ident, $variant:ident) => {
        impl $view {
            pub fn into_node(self) -> Node {
                self.0
            }
        }

        impl Deref for $view {
            type Target = Node;

            fn deref(&self) -> &Node {
                &self.0
            }
        }

        impl TryFrom<Node> for $view {
            type Error = Node;

            /// Gives the node back unchanged when it is of another kind.
            fn try_from(node: Node) -> Result<Self, Node> {
                match node.typed() {
                    TypedNode::$variant(view) => Ok(view),
                    other => Err(other.into_node()),
                }
            }
        }

        impl fmt::Display for $view {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

typed_view!(File, File);
typed_view!(Folder, Folder);

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Response envelope of every node listing endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeList {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next_token: Option<String>,
    #[serde(default)]
    pub data: Vec<Node>,
}

/// Status of the account and the accepted terms of use.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub terms_of_use: Option<String>,
    pub status: Option<String>,
}

/// Storage quota and availability.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuota {
    pub quota: Option<u64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_calculated: Option<OffsetDateTime>,
    pub available: Option<u64>,
}

/// Usage broken down by content category.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUsage {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_calculated: Option<OffsetDateTime>,
    pub other: Option<CategoryUsage>,
    pub doc: Option<CategoryUsage>,
    pub photo: Option<CategoryUsage>,
    pub video: Option<CategoryUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryUsage {
    pub total: Option<UsageNumbers>,
    pub billable: Option<UsageNumbers>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UsageNumbers {
    pub bytes: Option<u64>,
    pub count: Option<u64>,
}

/// Customer specific endpoints from `account/endpoint`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEndpoint {
    #[serde(default)]
    pub customer_exists: bool,
    pub content_url: String,
    pub metadata_url: String,
}

/// Cloud Drive error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub logref: Option<String>,
}

/// OAuth2 refresh credentials from JSON file.
#[derive(Debug, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_uri: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: Option<&str>) -> Node {
        let mut json = serde_json::json!({"id": "n1", "name": "thing"});
        if let Some(kind) = kind {
            json["kind"] = kind.into();
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_typed_file() {
        let n = node(Some("FILE"));
        assert!(n.is_file());
        assert!(!n.is_folder());
        assert!(matches!(n.typed(), TypedNode::File(f) if f.id == "n1"));
    }

    #[test]
    fn test_typed_folder() {
        let n = node(Some("FOLDER"));
        assert!(n.is_folder());
        assert!(matches!(n.typed(), TypedNode::Folder(f) if f.name == "thing"));
    }

    #[test]
    fn test_typed_unknown_or_missing_kind() {
        for kind in [None, Some("WHATEVER")] {
            let n = node(kind);
            assert!(!n.is_file());
            assert!(!n.is_folder());
            assert_eq!(n.clone().typed(), TypedNode::Node(n));
        }
    }

    #[test]
    fn test_try_from_gives_node_back() {
        let n = node(Some("FILE"));
        let back = Folder::try_from(n.clone()).unwrap_err();
        assert_eq!(back, n);
        assert!(File::try_from(n).is_ok());
    }

    #[test]
    fn test_node_kind_round_trips_unknown() {
        let kind: NodeKind = serde_json::from_str("\"ASSET\"").unwrap();
        assert_eq!(kind, NodeKind::Other("ASSET".to_string()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"ASSET\"");
    }

    #[test]
    fn test_node_size_from_content_properties() {
        let json = r#"{
            "id": "abc123",
            "name": "test.txt",
            "kind": "FILE",
            "contentProperties": {"size": 1024, "md5": "d41d8cd9"}
        }"#;

        let n: Node = serde_json::from_str(json).unwrap();
        assert_eq!(n.size(), Some(1024));
        assert_eq!(node(Some("FOLDER")).size(), None);
    }

    #[test]
    fn test_node_display() {
        let json = r#"{"id":"abc123","name":"test.txt","kind":"FILE","contentProperties":{"size":1024}}"#;
        let n: Node = serde_json::from_str(json).unwrap();

        let display = format!("{}", n);
        assert!(display.contains("abc123"));
        assert!(display.contains("test.txt"));
        assert!(display.contains("1.00 KB"));
        assert!(display.contains("FILE"));
    }
}
