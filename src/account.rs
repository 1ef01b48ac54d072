//! Account information: status, quota and usage.

use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::client::CloudDriveClient;
use crate::error::Result;
use crate::models::{AccountEndpoint, AccountInfo, AccountQuota, AccountUsage};

/// Access to the account resources of Cloud Drive.
pub struct AccountService<'a> {
    client: &'a CloudDriveClient,
}

impl<'a> AccountService<'a> {
    pub fn new(client: &'a CloudDriveClient) -> Self {
        Self { client }
    }

    /// Account status and the accepted terms of use.
    pub async fn get_info(&self) -> Result<AccountInfo> {
        self.get("account/info").await
    }

    /// Storage quota and availability.
    pub async fn get_quota(&self) -> Result<AccountQuota> {
        self.get("account/quota").await
    }

    /// Usage broken down by content category.
    pub async fn get_usage(&self) -> Result<AccountUsage> {
        self.get("account/usage").await
    }

    /// Endpoints assigned to this customer.
    pub async fn get_endpoint(&self) -> Result<AccountEndpoint> {
        self.get("account/endpoint").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.client.metadata_request(Method::GET, path).await?;
        self.client.send_json(request).await
    }
}
