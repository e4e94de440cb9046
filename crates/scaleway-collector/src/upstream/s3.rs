//! Bucket name enumeration over the S3-compatible object storage API.

use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region as S3Region},
    error::DisplayErrorContext,
    Client, Config,
};

use super::{ScrapeContext, UpstreamError};
use crate::model::Region;

/// Buckets owned by the credentials in a region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketListing {
    /// Project owning the buckets.
    pub project_id: String,
    /// Bucket names.
    pub names: Vec<String>,
}

/// Lists bucket names in a region.
#[async_trait]
pub trait BucketLister: fmt::Debug + Send + Sync {
    /// Lists buckets in `region`.
    async fn list_buckets(
        &self,
        region: &Region,
        cx: &ScrapeContext,
    ) -> Result<BucketListing, UpstreamError>;
}

/// [`BucketLister`] backed by the Scaleway S3 endpoints (`https://s3.<region>.scw.cloud`).
#[derive(Debug)]
pub struct S3BucketLister {
    clients: HashMap<Region, Client>,
}

impl S3BucketLister {
    /// Creates S3 clients for all `regions`.
    pub fn new(access_key: &str, secret_key: &str, regions: &[Region]) -> Self {
        let clients = regions
            .iter()
            .map(|region| {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "scaleway-exporter");
                let config = Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
                    .region(S3Region::new(region.to_string()))
                    .endpoint_url(format!("https://s3.{region}.scw.cloud"))
                    .force_path_style(true)
                    .build();
                (region.clone(), Client::from_conf(config))
            })
            .collect();
        Self { clients }
    }
}

#[async_trait]
impl BucketLister for S3BucketLister {
    async fn list_buckets(
        &self,
        region: &Region,
        cx: &ScrapeContext,
    ) -> Result<BucketListing, UpstreamError> {
        let client = self.clients.get(region).ok_or_else(|| {
            UpstreamError::ObjectStorage(format!("no S3 endpoint configured for region {region}"))
        })?;
        let response = cx
            .bounded(async {
                client.list_buckets().send().await.map_err(|err| {
                    UpstreamError::ObjectStorage(DisplayErrorContext(&err).to_string())
                })
            })
            .await?;

        let owner_id = response.owner().and_then(|owner| owner.id()).unwrap_or("");
        // Owner IDs have the `<project_id>:<project_id>` form.
        let project_id = owner_id.split(':').next().unwrap_or(owner_id);
        let names = response
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_owned))
            .collect();
        Ok(BucketListing {
            project_id: project_id.to_owned(),
            names,
        })
    }
}
