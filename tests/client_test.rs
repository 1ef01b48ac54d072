//! Tests for models, credentials and error reporting.

use mockito::{Matcher, Server};
use serde_json::json;
use cloud_drive::models::{NodeList, OAuthCredentials};
use cloud_drive::{Authenticator, Node, TypedNode};
use std::io::Write;
use tempfile::NamedTempFile;

mod models {
    use super::*;

    #[test]
    fn test_node_deserialization() {
        let json = json!({
            "id": "file123",
            "name": "document.pdf",
            "kind": "FILE",
            "contentProperties": {"size": 2048, "contentType": "application/pdf"}
        });

        let node: Node = serde_json::from_value(json).unwrap();

        assert_eq!(node.id, "file123");
        assert_eq!(node.name, "document.pdf");
        assert!(node.is_file());
        assert_eq!(node.size(), Some(2048));
        assert_eq!(
            node.content_properties.unwrap().content_type.as_deref(),
            Some("application/pdf")
        );
    }

    #[test]
    fn test_folder_without_content_properties() {
        let json = json!({
            "id": "folder123",
            "name": "My Folder",
            "kind": "FOLDER"
        });

        let node: Node = serde_json::from_value(json).unwrap();

        assert_eq!(node.size(), None);
        assert!(matches!(node.typed(), TypedNode::Folder(f) if f.name == "My Folder"));
    }

    #[test]
    fn test_node_list_deserialization() {
        let json = json!({
            "count": 2,
            "data": [
                {"id": "f1", "name": "file1.txt", "kind": "FILE"},
                {"id": "f2", "name": "file2.txt", "kind": "FILE"}
            ],
            "nextToken": "token123"
        });

        let list: NodeList = serde_json::from_value(json).unwrap();

        assert_eq!(list.count, Some(2));
        assert_eq!(list.data.len(), 2);
        assert_eq!(list.next_token, Some("token123".to_string()));
    }

    #[test]
    fn test_node_list_last_page() {
        let list: NodeList = serde_json::from_value(json!({"count": 0, "data": []})).unwrap();

        assert!(list.data.is_empty());
        assert!(list.next_token.is_none());
    }

    #[test]
    fn test_typed_node_keeps_identity() {
        let node: Node =
            serde_json::from_value(json!({"id": "x", "name": "x.bin", "kind": "FILE"})).unwrap();

        let typed = node.clone().typed();
        assert_eq!(typed.node(), &node);
        assert_eq!(typed.into_node(), node);
    }
}

mod credentials {
    use super::*;

    #[test]
    fn test_credentials_from_json() {
        let json = json!({
            "client_id": "amzn1.application-oa2-client.abc",
            "client_secret": "secret",
            "refresh_token": "Atzr|refresh",
            "token_uri": "https://api.amazon.com/auth/o2/token"
        });

        let creds: OAuthCredentials = serde_json::from_value(json).unwrap();

        assert_eq!(creds.client_id, "amzn1.application-oa2-client.abc");
        assert_eq!(creds.token_uri, Some("https://api.amazon.com/auth/o2/token".to_string()));
    }

    #[test]
    fn test_authenticator_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let creds_json = json!({
            "client_id": "id",
            "client_secret": "secret",
            "refresh_token": "refresh"
        });

        temp_file.write_all(creds_json.to_string().as_bytes()).unwrap();

        let auth = Authenticator::from_file(temp_file.path());
        assert!(auth.is_ok());
    }

    #[test]
    fn test_authenticator_from_invalid_file() {
        let auth = Authenticator::from_file("/nonexistent/path/credentials.json");
        assert!(auth.is_err());
    }

    #[test]
    fn test_authenticator_from_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"not valid json").unwrap();

        let auth = Authenticator::from_file(temp_file.path());
        assert!(auth.is_err());
    }

    #[tokio::test]
    async fn test_refresh_is_cached() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/o2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".to_string(), "refresh_token".to_string()),
                Matcher::UrlEncoded("refresh_token".to_string(), "refresh".to_string()),
                Matcher::UrlEncoded("client_id".to_string(), "id".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"Atza|fresh","token_type":"bearer","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let auth = Authenticator::new(OAuthCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
            token_uri: Some(format!("{}/auth/o2/token", server.url())),
        });

        assert_eq!(auth.get_access_token().await.unwrap(), "Atza|fresh");
        assert_eq!(auth.get_access_token().await.unwrap(), "Atza|fresh");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/o2/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let auth = Authenticator::new(OAuthCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "revoked".to_string(),
            token_uri: Some(format!("{}/auth/o2/token", server.url())),
        });

        let err = auth.get_access_token().await.unwrap_err();
        assert!(matches!(err, cloud_drive::DriveError::TokenRefresh(ref m) if m.contains("invalid_grant")));
    }
}

mod error_handling {
    use cloud_drive::error::{DriveError, Incomplete};
    use cloud_drive::NodeKind;

    #[test]
    fn test_error_display() {
        let err = DriveError::Api {
            status: 404,
            message: "Node not found".to_string(),
        };

        let display = format!("{}", err);
        assert!(display.contains("404"));
        assert!(display.contains("Node not found"));
    }

    #[test]
    fn test_lookup_errors_carry_context() {
        let err = DriveError::Ambiguous {
            name: "dup".to_string(),
            count: 3,
        };
        assert_eq!(err.to_string(), "Too many nodes 'dup' found (3)");

        let err = DriveError::WrongKind {
            name: "notes.txt".to_string(),
            expected: NodeKind::Folder,
        };
        assert_eq!(err.to_string(), "Node 'notes.txt' is not a folder");

        let err = DriveError::NotFound {
            name: "gone".to_string(),
        };
        assert_eq!(err.to_string(), "No node 'gone' found");
    }

    #[test]
    fn test_incomplete_converts_to_error() {
        let incomplete = Incomplete::new(
            vec![1, 2],
            DriveError::NotFound {
                name: "x".to_string(),
            },
        );
        assert_eq!(incomplete.to_string(), "No node 'x' found");
        assert_eq!(incomplete.partial, vec![1, 2]);

        let err: DriveError = incomplete.into();
        assert!(matches!(err, DriveError::NotFound { .. }));
    }
}
