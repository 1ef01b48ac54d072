//! cloud_drive CLI - Interact with Amazon Cloud Drive.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use tracing_subscriber::EnvFilter;

use cloud_drive::models::{format_size, CategoryUsage};
use cloud_drive::{
    Authenticator, CloudDriveClient, DriveError, Endpoints, Folder, NodesService, TypedNode,
};

/// CLI tool for interacting with Amazon Cloud Drive.
#[derive(Parser)]
#[command(name = "cloud_drive")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to OAuth2 credentials JSON file.
    #[arg(long, env = "ACD_CREDENTIALS")]
    credentials: PathBuf,

    /// Metadata endpoint URL.
    #[arg(long, env = "ACD_METADATA_URL", default_value = cloud_drive::config::DEFAULT_METADATA_URL)]
    metadata_url: String,

    /// Content endpoint URL.
    #[arg(long, env = "ACD_CONTENT_URL", default_value = cloud_drive::config::DEFAULT_CONTENT_URL)]
    content_url: String,

    /// Ask the account for its own endpoints before running the command.
    #[arg(long)]
    discover: bool,

    /// Log requests (same as RUST_LOG=cloud_drive=debug).
    #[arg(long, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show account status.
    Info,

    /// Show storage quota.
    Quota,

    /// Show storage usage per category.
    Usage,

    /// List the children of a folder.
    Ls {
        /// Folder path, e.g. /Pictures/2014.
        #[arg(default_value = "/")]
        path: String,
    },

    /// Print the full metadata of a node.
    Stat {
        /// Node path.
        path: String,
    },

    /// Create a folder.
    Mkdir {
        /// Path of the new folder; its parent must exist.
        path: String,
    },

    /// Download a file to local filesystem.
    Download {
        /// Remote file path.
        path: String,

        /// Local destination path (file or directory). Must not exist yet.
        #[arg(long, short = 't', default_value = ".")]
        to: PathBuf,
    },

    /// Upload files to a folder.
    Upload {
        /// File patterns to upload (supports glob patterns like *.tar, file_{1,2,3}.txt).
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Destination folder path.
        #[arg(long, short = 't')]
        to: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let auth = Authenticator::from_file(&cli.credentials)
        .with_context(|| format!("Failed to load credentials from {:?}", cli.credentials))?;

    let endpoints = Endpoints::new(&cli.metadata_url, &cli.content_url)
        .context("Invalid endpoint configuration")?;
    let mut client = CloudDriveClient::new(auth, endpoints);

    if cli.discover {
        let endpoint = client
            .account()
            .get_endpoint()
            .await
            .context("Failed to discover account endpoints")?;
        client.set_endpoints(Endpoints::try_from(endpoint)?);
    }

    let nodes = client.nodes();

    match cli.command {
        Commands::Info => {
            let info = client.account().get_info().await.context("Failed to get account info")?;
            println!("Status:       {}", info.status.as_deref().unwrap_or("-"));
            println!("Terms of use: {}", info.terms_of_use.as_deref().unwrap_or("-"));
        }

        Commands::Quota => {
            let quota = client.account().get_quota().await.context("Failed to get quota")?;
            println!("Quota:     {}", quota.quota.map(format_size).unwrap_or_else(|| "-".into()));
            println!(
                "Available: {}",
                quota.available.map(format_size).unwrap_or_else(|| "-".into())
            );
            if let Some(at) = quota.last_calculated {
                println!("As of:     {}", at);
            }
        }

        Commands::Usage => {
            let usage = client.account().get_usage().await.context("Failed to get usage")?;
            println!("{:<8} {:>12} {:>8} {:>12} {:>8}", "", "TOTAL", "FILES", "BILLABLE", "FILES");
            for (label, category) in [
                ("doc", &usage.doc),
                ("photo", &usage.photo),
                ("video", &usage.video),
                ("other", &usage.other),
            ] {
                println!("{:<8} {}", label, usage_row(category.as_ref()));
            }
        }

        Commands::Ls { path } => {
            let folder = resolve_folder(&nodes, &path).await?;
            let children = nodes
                .get_all_children(&folder, None)
                .await
                .with_context(|| format!("Failed to list folder: {}", path))?;

            if children.is_empty() {
                println!("No nodes found.");
            } else {
                println!("{:<24} {:>10} {:<8} {}", "ID", "SIZE", "KIND", "NAME");
                println!("{}", "-".repeat(70));
                for child in children {
                    println!("{}", child);
                }
            }
        }

        Commands::Stat { path } => {
            let root = nodes.get_root().await.context("Failed to get root folder")?;
            let walk = nodes
                .walk(&root, &split_path(&path))
                .await
                .with_context(|| format!("Failed to resolve {}", path))?;
            println!("{}", nodes.get_metadata(&walk.node).await?);
        }

        Commands::Mkdir { path } => {
            let mut segments = split_path(&path);
            let name = segments
                .pop()
                .with_context(|| format!("Invalid folder path: {}", path))?;
            let parent = resolve_segments(&nodes, &segments).await?;
            let folder = nodes
                .create_folder(&parent, name)
                .await
                .with_context(|| format!("Failed to create folder {}", path))?;
            println!("Created {} ({})", path, folder.id);
        }

        Commands::Download { path, to } => {
            let root = nodes.get_root().await.context("Failed to get root folder")?;
            let walk = nodes
                .walk(&root, &split_path(&path))
                .await
                .with_context(|| format!("Failed to resolve {}", path))?;
            let file = match walk.node.typed() {
                TypedNode::File(file) => file,
                other => anyhow::bail!("Not a file: {} is {}", path, kind_label(&other)),
            };

            let final_path = if to.is_dir() { to.join(&file.name) } else { to };

            print!("Downloading {}... ", path);
            let written = nodes
                .download(&file, &final_path)
                .await
                .with_context(|| format!("Failed to download {}", path))?;

            println!("OK ({})", format_size(written));
            println!("Saved to: {:?}", final_path);
        }

        Commands::Upload { patterns, to } => {
            let folder = resolve_folder(&nodes, &to).await?;
            let files_to_upload = expand_patterns(&patterns)?;

            println!("Uploading {} file(s) to {}...", files_to_upload.len(), to);

            for (idx, file_path) in files_to_upload.iter().enumerate() {
                let filename = file_path.file_name().unwrap_or_default().to_string_lossy();
                print!("[{}/{}] Uploading {}... ", idx + 1, files_to_upload.len(), filename);

                match nodes.upload(&folder, file_path, &filename).await {
                    Ok(file) => {
                        println!("OK ({})", file.id);
                    }
                    Err(e) => {
                        println!("FAILED");
                        eprintln!("  Error: {}", e);
                    }
                }
            }

            println!("Done.");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "cloud_drive=debug" } else { "cloud_drive=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn usage_row(category: Option<&CategoryUsage>) -> String {
    let numbers = |n: Option<cloud_drive::models::UsageNumbers>| {
        let bytes = n.and_then(|n| n.bytes).map(format_size).unwrap_or_else(|| "-".into());
        let count = n
            .and_then(|n| n.count)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into());
        format!("{:>12} {:>8}", bytes, count)
    };
    let total = category.and_then(|c| c.total);
    let billable = category.and_then(|c| c.billable);
    format!("{} {}", numbers(total), numbers(billable))
}

/// Split a `/`-separated remote path into its non-empty segments.
fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

async fn resolve_folder(nodes: &NodesService<'_>, path: &str) -> Result<Folder> {
    resolve_segments(nodes, &split_path(path)).await
}

async fn resolve_segments(nodes: &NodesService<'_>, segments: &[&str]) -> Result<Folder> {
    let root = nodes.get_root().await.context("Failed to get root folder")?;
    let walk = nodes
        .walk(&root, segments)
        .await
        .with_context(|| format!("Failed to resolve /{}", segments.join("/")))?;

    match walk.node.typed() {
        TypedNode::Folder(folder) => Ok(folder),
        other => anyhow::bail!("Not a folder: /{} is {}", segments.join("/"), kind_label(&other)),
    }
}

fn kind_label(typed: &TypedNode) -> String {
    match &typed.node().kind {
        Some(kind) => format!("a {}", kind),
        None => "a node without a kind".to_string(),
    }
}

/// Expand glob and brace patterns into the list of local files to upload.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        for expanded_pattern in expand_braces(pattern) {
            let matches: Vec<PathBuf> = glob(&expanded_pattern)
                .with_context(|| format!("Invalid glob pattern: {}", expanded_pattern))?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file())
                .collect();

            if matches.is_empty() {
                // If no glob matches, treat as literal path
                let path = Path::new(&expanded_pattern);
                if path.is_file() {
                    files.push(path.to_path_buf());
                } else {
                    tracing::warn!("No files matched pattern: {}", expanded_pattern);
                }
            } else {
                files.extend(matches);
            }
        }
    }

    if files.is_empty() {
        return Err(DriveError::NoFilesMatched(patterns.join(" ")).into());
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Expand brace patterns like file_{1,2,3}.txt into multiple patterns.
fn expand_braces(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let alternatives = &pattern[start + 1..end];

            return alternatives
                .split(',')
                .flat_map(|alt| {
                    let expanded = format!("{}{}{}", prefix, alt.trim(), suffix);
                    expand_braces(&expanded)
                })
                .collect();
        }
    }

    vec![pattern.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_braces_simple() {
        let result = expand_braces("file_{1,2,3}.txt");
        assert_eq!(result, vec!["file_1.txt", "file_2.txt", "file_3.txt"]);
    }

    #[test]
    fn test_expand_braces_no_braces() {
        assert_eq!(expand_braces("*.tar"), vec!["*.tar"]);
    }

    #[test]
    fn test_expand_braces_nested() {
        let result = expand_braces("{a,b}_{1,2}.txt");
        assert_eq!(result, vec!["a_1.txt", "a_2.txt", "b_1.txt", "b_2.txt"]);
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("/").is_empty());
        assert_eq!(split_path("/Pictures/2014/"), vec!["Pictures", "2014"]);
        assert_eq!(split_path("a//b"), vec!["a", "b"]);
    }

    #[test]
    fn test_expand_patterns_dedups_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();

        let base = dir.path().display();
        let patterns = vec![
            format!("{}/*.txt", base),
            format!("{}/a.txt", base),
            format!("{}/missing.bin", base),
        ];

        let files = expand_patterns(&patterns).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.txt"));
        assert!(files[1].ends_with("b.txt"));
    }

    #[test]
    fn test_kind_label() {
        let node: cloud_drive::Node =
            serde_json::from_value(serde_json::json!({"id": "f", "name": "docs", "kind": "FOLDER"})).unwrap();
        assert_eq!(kind_label(&node.typed()), "a folder");

        let node: cloud_drive::Node =
            serde_json::from_value(serde_json::json!({"id": "n", "name": "bare"})).unwrap();
        assert_eq!(kind_label(&node.typed()), "a node without a kind");
    }

    #[test]
    fn test_expand_patterns_without_matches() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = vec![format!("{}/*.none", dir.path().display())];

        let err = expand_patterns(&patterns).unwrap_err();
        let err = err.downcast::<DriveError>().unwrap();
        assert!(matches!(err, DriveError::NoFilesMatched(ref p) if p.ends_with("*.none")));
    }
}
