//! Node listing, folder navigation and content transfer.

use std::io;
use std::path::Path;

use futures::{future, stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;

use crate::client::CloudDriveClient;
use crate::error::{DriveError, Incomplete, Result};
use crate::models::{File, Folder, Node, NodeKind, NodeList};

/// Filter selecting the root folder.
const ROOT_FILTER: &str = "kind:FOLDER AND isRoot:true";

/// Buffer between the upload producer and the HTTP body.
const UPLOAD_PIPE_CAPACITY: usize = 64 * 1024;

/// Filter, sort and page size of a node listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: Option<u32>,
    pub filters: Option<String>,
    pub sort: Option<String>,
}

impl ListOptions {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filters(mut self, filters: impl Into<String>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

/// Position within a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cursor {
    /// Nothing fetched yet.
    #[default]
    Start,
    /// Continue from the server's token.
    Next(String),
    /// The server reported the last page.
    End,
}

impl Cursor {
    pub fn is_end(&self) -> bool {
        matches!(self, Cursor::End)
    }
}

/// One page of a listing plus the cursor to fetch the next one with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub nodes: Vec<Node>,
    pub count: Option<u64>,
    pub cursor: Cursor,
}

impl Page {
    fn end() -> Self {
        Self {
            nodes: Vec::new(),
            count: None,
            cursor: Cursor::End,
        }
    }
}

/// Query string of a listing request. Unset values are left out.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_token: Option<&'a str>,
}

/// Result of a path walk: the deepest node reached and every node resolved
/// along the way, in path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    pub node: Node,
    pub steps: Vec<Node>,
}

/// Quote a filter value, escaping backslashes and double quotes.
pub fn quote_filter_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Filter matching the children of `parent_id` named exactly `name`.
pub fn child_name_filter(parent_id: &str, name: &str) -> String {
    format!(
        "parents:{} AND name:{}",
        quote_filter_value(parent_id),
        quote_filter_value(name)
    )
}

/// Access to the nodes of a Cloud Drive.
pub struct NodesService<'a> {
    client: &'a CloudDriveClient,
}

impl<'a> NodesService<'a> {
    pub fn new(client: &'a CloudDriveClient) -> Self {
        Self { client }
    }

    /// Fetch one page of nodes from `path`.
    ///
    /// Issues exactly one request unless `cursor` is already
    /// [`Cursor::End`], in which case an empty page comes back without
    /// touching the network.
    pub async fn list_page(&self, path: &str, options: &ListOptions, cursor: &Cursor) -> Result<Page> {
        let start_token = match cursor {
            Cursor::End => return Ok(Page::end()),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token.as_str()),
        };

        let query = ListQuery {
            limit: options.limit,
            filters: options.filters.as_deref(),
            sort: options.sort.as_deref(),
            start_token,
        };

        let request = self
            .client
            .metadata_request(Method::GET, path)
            .await?
            .query(&query);
        let list: NodeList = self.client.send_json(request).await?;

        tracing::debug!(
            path,
            received = list.data.len(),
            more = list.next_token.is_some(),
            "listed page"
        );

        let cursor = match list.next_token {
            Some(token) => Cursor::Next(token),
            None => Cursor::End,
        };

        Ok(Page {
            nodes: list.data,
            count: list.count,
            cursor,
        })
    }

    /// Fetch every page of nodes from `path`, in server order.
    ///
    /// There is no page limit: a server that keeps handing out continuation
    /// tokens keeps this looping. On failure the nodes received so far are
    /// returned inside the error.
    pub async fn list_all(
        &self,
        path: &str,
        options: Option<&ListOptions>,
    ) -> std::result::Result<Vec<Node>, Incomplete<Vec<Node>>> {
        let default_options = ListOptions::default();
        let options = options.unwrap_or(&default_options);

        let mut result = Vec::new();
        let mut cursor = Cursor::Start;

        while !cursor.is_end() {
            match self.list_page(path, options, &cursor).await {
                Ok(page) => {
                    result.extend(page.nodes);
                    cursor = page.cursor;
                }
                Err(error) => return Err(Incomplete::new(result, error)),
            }
        }

        Ok(result)
    }

    /// Get the root folder of the drive.
    pub async fn get_root(&self) -> Result<Folder> {
        let options = ListOptions::default().with_filters(ROOT_FILTER);
        let page = self.get_nodes(&options, &Cursor::Start).await?;

        let root = page.nodes.into_iter().next().ok_or_else(|| DriveError::NotFound {
            name: "root".to_string(),
        })?;

        Folder::try_from(root).map_err(|_| DriveError::WrongKind {
            name: "root".to_string(),
            expected: NodeKind::Folder,
        })
    }

    /// Get one page of all nodes on the drive.
    pub async fn get_nodes(&self, options: &ListOptions, cursor: &Cursor) -> Result<Page> {
        self.list_page("nodes", options, cursor).await
    }

    /// Get all nodes on the drive.
    pub async fn get_all_nodes(
        &self,
        options: Option<&ListOptions>,
    ) -> std::result::Result<Vec<Node>, Incomplete<Vec<Node>>> {
        self.list_all("nodes", options).await
    }

    /// Get one page of the children of `folder`.
    pub async fn get_children(&self, folder: &Folder, options: &ListOptions, cursor: &Cursor) -> Result<Page> {
        self.list_page(&children_path(folder), options, cursor).await
    }

    /// Get all children of `folder`.
    pub async fn get_all_children(
        &self,
        folder: &Folder,
        options: Option<&ListOptions>,
    ) -> std::result::Result<Vec<Node>, Incomplete<Vec<Node>>> {
        self.list_all(&children_path(folder), options).await
    }

    /// Get the child of `folder` named `name`.
    ///
    /// It is an error if not exactly one node has that name.
    pub async fn get_node(&self, folder: &Folder, name: &str) -> Result<Node> {
        let options = ListOptions::default().with_filters(child_name_filter(&folder.id, name));
        let mut nodes = self.get_nodes(&options, &Cursor::Start).await?.nodes;

        match nodes.len() {
            0 => Err(DriveError::NotFound {
                name: name.to_string(),
            }),
            1 => Ok(nodes.remove(0)),
            count => {
                tracing::warn!(folder = %folder.id, name, count, "ambiguous node name");
                Err(DriveError::Ambiguous {
                    name: name.to_string(),
                    count,
                })
            }
        }
    }

    /// Get the subfolder of `folder` named `name`.
    pub async fn get_folder(&self, folder: &Folder, name: &str) -> Result<Folder> {
        let node = self.get_node(folder, name).await?;
        Folder::try_from(node).map_err(|_| DriveError::WrongKind {
            name: name.to_string(),
            expected: NodeKind::Folder,
        })
    }

    /// Get the file in `folder` named `name`.
    pub async fn get_file(&self, folder: &Folder, name: &str) -> Result<File> {
        let node = self.get_node(folder, name).await?;
        File::try_from(node).map_err(|_| DriveError::WrongKind {
            name: name.to_string(),
            expected: NodeKind::File,
        })
    }

    /// Resolve `names` one after another below `folder`.
    ///
    /// Every name but the last must be a folder; the last may be any node.
    /// An empty path resolves to `folder` itself without a request. On
    /// failure the error carries the deepest folder reached and the nodes
    /// resolved before the failing step.
    pub async fn walk<S: AsRef<str>>(
        &self,
        folder: &Folder,
        names: &[S],
    ) -> std::result::Result<Walk, Incomplete<Walk>> {
        let mut steps = Vec::with_capacity(names.len());

        let Some((last, parents)) = names.split_last() else {
            return Ok(Walk {
                node: folder.clone().into_node(),
                steps,
            });
        };

        let mut current = folder.clone();
        for name in parents {
            match self.get_folder(&current, name.as_ref()).await {
                Ok(next) => {
                    steps.push(next.clone().into_node());
                    current = next;
                }
                Err(error) => {
                    let walk = Walk {
                        node: current.into_node(),
                        steps,
                    };
                    return Err(Incomplete::new(walk, error));
                }
            }
        }

        match self.get_node(&current, last.as_ref()).await {
            Ok(node) => {
                steps.push(node.clone());
                Ok(Walk { node, steps })
            }
            Err(error) => {
                let walk = Walk {
                    node: current.into_node(),
                    steps,
                };
                Err(Incomplete::new(walk, error))
            }
        }
    }

    /// Get the full metadata of `node` as pretty-printed JSON, including a
    /// temporary download link for files.
    pub async fn get_metadata(&self, node: &Node) -> Result<String> {
        let path = format!("nodes/{}?tempLink=true", node.id);
        let request = self.client.metadata_request(Method::GET, &path).await?;
        let metadata: serde_json::Value = self.client.send_json(request).await?;

        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        metadata.serialize(&mut serializer)?;

        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Create a folder named `name` inside `parent`.
    pub async fn create_folder(&self, parent: &Folder, name: &str) -> Result<Folder> {
        let metadata = serde_json::json!({
            "name": name,
            "kind": "FOLDER",
            "parents": [parent.id]
        });

        let request = self
            .client
            .metadata_request(Method::POST, "nodes")
            .await?
            .json(&metadata);
        let node: Node = self.client.send_json(request).await?;

        tracing::info!(id = %node.id, name, "created folder");

        Folder::try_from(node).map_err(|_| DriveError::WrongKind {
            name: name.to_string(),
            expected: NodeKind::Folder,
        })
    }

    /// Download the content of `file` into a new file at `destination`.
    ///
    /// Fails if `destination` already exists. Intermediate directories are
    /// not created. Returns the number of bytes written.
    pub async fn download<P: AsRef<Path>>(&self, file: &File, destination: P) -> Result<u64> {
        let destination = destination.as_ref();
        let path = format!("nodes/{}/content", file.id);
        let request = self.client.content_request(Method::GET, &path).await?;

        let mut out = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .await
        {
            Ok(out) => out,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(DriveError::DestinationExists(destination.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let written = async {
            let response = self.client.send(request).await?;
            let mut stream = response.bytes_stream();
            let mut written = 0u64;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                out.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }

            out.flush().await?;
            Ok::<_, DriveError>(written)
        }
        .await;

        match written {
            Ok(written) => {
                tracing::info!(id = %file.id, bytes = written, path = %destination.display(), "downloaded");
                Ok(written)
            }
            Err(error) => {
                // Leave nothing half-written behind.
                drop(out);
                let _ = tokio::fs::remove_file(destination).await;
                Err(error)
            }
        }
    }

    /// Upload the local file at `local_path` into `folder` as `name`.
    ///
    /// The file is copied into the request body by a separate task while the
    /// request is being sent. A producer failure (e.g. a read error on the
    /// local file) aborts the request body, so the server never sees a
    /// complete upload, and fails the upload even if the server answered.
    pub async fn upload<P: AsRef<Path>>(&self, folder: &Folder, local_path: P, name: &str) -> Result<File> {
        let local_path = local_path.as_ref();
        let source = tokio::fs::File::open(local_path).await?;

        let metadata = serde_json::json!({
            "name": name,
            "kind": "FILE",
            "parents": [folder.id]
        });
        let filename = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();

        let request = self
            .client
            .content_request(Method::POST, "nodes?suppress=deduplication")
            .await?;

        let (reader, writer) = tokio::io::duplex(UPLOAD_PIPE_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = oneshot::channel::<io::Error>();

        tokio::spawn(async move {
            let result = copy_source(source, writer).await;
            if let Err(e) = &result {
                let _ = abort_tx.send(io::Error::new(e.kind(), e.to_string()));
            }
            let _ = done_tx.send(result);
        });

        // The pipe reaches EOF whether the producer finished or failed; a
        // failure is appended as a stream error so the body never completes.
        let abort = stream::once(abort_rx).filter_map(|failure| future::ready(failure.ok().map(Err)));
        let content = ReaderStream::new(reader).chain(abort);

        let form = Form::new()
            .part("metadata", Part::text(metadata.to_string()).mime_str("application/json")?)
            .part(
                "content",
                Part::stream(Body::wrap_stream(content))
                    .file_name(filename)
                    .mime_str(&mime_type)?,
            );

        let response = self.client.send_json::<Node>(request.multipart(form)).await;
        let produced = done_rx
            .await
            .map_err(|_| DriveError::Upload("producer stopped without a result".to_string()))?;

        let (node, copied) = match (response, produced) {
            (Ok(node), Ok(copied)) => (node, copied),
            (Err(error @ DriveError::Api { .. }), _) => return Err(error),
            (_, Err(e)) => return Err(DriveError::Upload(e.to_string())),
            (Err(error), Ok(_)) => return Err(error),
        };

        tracing::info!(id = %node.id, name, bytes = copied, "uploaded");

        File::try_from(node).map_err(|_| DriveError::WrongKind {
            name: name.to_string(),
            expected: NodeKind::File,
        })
    }
}

/// Copy `source` into the upload pipe, returning the number of bytes copied.
async fn copy_source<R, W>(mut source: R, mut pipe: W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = tokio::io::copy(&mut source, &mut pipe).await?;
    pipe.shutdown().await?;
    Ok(copied)
}

fn children_path(folder: &Folder) -> String {
    format!("nodes/{}/children", folder.id)
}
