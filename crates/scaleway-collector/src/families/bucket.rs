//! Object storage buckets.
//!
//! Buckets are enumerated via the S3 API, then their details are resolved via the Scaleway
//! object storage API. Unlike other families, each bucket metric is requested separately.

use std::{collections::BTreeMap, fmt};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    collector::ResourceFamily,
    descriptors::{GaugeDescriptor, SeriesRegistry},
    label_set,
    model::{Region, Resource, SeriesResponse, TimeSeries, Window},
    upstream::{
        BucketLister, BucketListing, S3BucketLister, ScalewayClient, ScrapeContext, UpstreamError,
    },
};

label_set! {
    /// Labels of bucket gauges.
    pub struct BucketLabels {
        name => "name",
        region => "region",
        public => "public",
    }
}

label_set! {
    /// Labels of the storage usage gauge.
    pub struct StorageLabels {
        name => "name",
        region => "region",
        public => "public",
        /// Storage class, e.g. `STANDARD` or `GLACIER`.
        storage_class => "storage_class",
    }
}

static OBJECT_COUNT: GaugeDescriptor<BucketLabels> = GaugeDescriptor::new(
    "scaleway_s3_object_total",
    "Number of objects, excluding parts",
);
static BANDWIDTH: GaugeDescriptor<BucketLabels> =
    GaugeDescriptor::new("scaleway_s3_bandwidth_bytes", "Bucket's Bandwidth usage");
static STORAGE_USAGE: GaugeDescriptor<StorageLabels> =
    GaugeDescriptor::new("scaleway_s3_storage_usage_bytes", "Bucket's Storage usage");

/// Bucket metric requested from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketMetric {
    /// Number of objects.
    ObjectCount,
    /// Outbound traffic.
    BytesSent,
    /// Storage usage per storage class.
    StorageUsage,
}

impl BucketMetric {
    /// All metrics collected for each bucket.
    pub const ALL: &'static [Self] = &[Self::ObjectCount, Self::BytesSent, Self::StorageUsage];

    /// Returns the upstream metric name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObjectCount => "object_count",
            Self::BytesSent => "bytes_sent",
            Self::StorageUsage => "storage_usage",
        }
    }
}

/// Object storage bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// Region the bucket is located in.
    pub region: Region,
    /// Whether the bucket is publicly readable.
    pub public: bool,
}

impl Resource for Bucket {
    fn id(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Bucket {
    fn labels(&self) -> BucketLabels {
        BucketLabels {
            name: self.name.clone(),
            region: self.region.to_string(),
            public: self.public.to_string(),
        }
    }

    fn storage_labels(&self, series: &TimeSeries) -> StorageLabels {
        StorageLabels {
            name: self.name.clone(),
            region: self.region.to_string(),
            public: self.public.to_string(),
            storage_class: series.metadata("type").to_owned(),
        }
    }
}

/// Details of a bucket returned by the object storage API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketInfo {
    /// Whether the bucket is publicly readable.
    #[serde(default)]
    pub is_public: bool,
    /// Bucket status.
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize)]
struct BucketInfoRequest<'a> {
    project_id: &'a str,
    buckets_name: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BucketInfoList {
    #[serde(default)]
    buckets: BTreeMap<String, BucketInfo>,
}

/// Object storage API calls used by the collector.
#[async_trait]
pub trait ObjectStorageApi: fmt::Debug + Send + Sync + 'static {
    /// Resolves details of listed buckets.
    async fn bucket_details(
        &self,
        region: &Region,
        listing: &BucketListing,
        cx: &ScrapeContext,
    ) -> Result<BTreeMap<String, BucketInfo>, UpstreamError>;

    /// Fetches series of a single bucket metric.
    async fn bucket_metric(
        &self,
        bucket: &Bucket,
        metric: BucketMetric,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError>;
}

#[async_trait]
impl ObjectStorageApi for ScalewayClient {
    async fn bucket_details(
        &self,
        region: &Region,
        listing: &BucketListing,
        cx: &ScrapeContext,
    ) -> Result<BTreeMap<String, BucketInfo>, UpstreamError> {
        let path = format!("/object-private/v1/regions/{region}/buckets-info/");
        let request = BucketInfoRequest {
            project_id: &listing.project_id,
            buckets_name: &listing.names,
        };
        let response: BucketInfoList = self.post(&path, &request, cx).await?;
        Ok(response.buckets)
    }

    async fn bucket_metric(
        &self,
        bucket: &Bucket,
        metric: BucketMetric,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError> {
        let path = format!(
            "/object-private/v1/regions/{}/buckets/{}/metrics",
            bucket.region, bucket.name
        );
        let mut query = window.query().to_vec();
        query.push(("metric_name", metric.as_str().to_owned()));
        let response: SeriesResponse = self.get(&path, &query, cx).await?;
        Ok(response.timeseries)
    }
}

/// Object storage bucket family, partitioned by region.
#[derive(Debug)]
pub struct BucketFamily<A = ScalewayClient, L = S3BucketLister> {
    api: A,
    lister: L,
}

impl<A: ObjectStorageApi, L: BucketLister + 'static> BucketFamily<A, L> {
    /// Creates a family using the specified API and bucket lister.
    pub fn new(api: A, lister: L) -> Self {
        Self { api, lister }
    }
}

fn bucket_labels(bucket: &Bucket, _: &TimeSeries) -> BucketLabels {
    bucket.labels()
}

#[async_trait]
impl<A, L> ResourceFamily for BucketFamily<A, L>
where
    A: ObjectStorageApi,
    L: BucketLister + 'static,
{
    const NAME: &'static str = "bucket";
    const QUERIES: &'static [BucketMetric] = BucketMetric::ALL;

    type Partition = Region;
    type Resource = Bucket;
    type Query = BucketMetric;

    fn series_registry(&self) -> SeriesRegistry<Bucket> {
        SeriesRegistry::new()
            .map(BucketMetric::ObjectCount.as_str(), &OBJECT_COUNT, bucket_labels)
            .map(BucketMetric::BytesSent.as_str(), &BANDWIDTH, bucket_labels)
            .map(
                BucketMetric::StorageUsage.as_str(),
                &STORAGE_USAGE,
                Bucket::storage_labels,
            )
    }

    async fn list(&self, region: &Region, cx: &ScrapeContext) -> Result<Vec<Bucket>, UpstreamError> {
        let listing = self.lister.list_buckets(region, cx).await?;
        tracing::debug!(
            %region,
            names = ?listing.names,
            "Found {} buckets",
            listing.names.len()
        );
        if listing.names.is_empty() {
            return Ok(vec![]);
        }

        let details = self.api.bucket_details(region, &listing, cx).await?;
        let buckets = details
            .into_iter()
            .map(|(name, info)| Bucket {
                name,
                region: region.clone(),
                public: info.is_public,
            })
            .collect();
        Ok(buckets)
    }

    async fn fetch_series(
        &self,
        bucket: &Bucket,
        metric: BucketMetric,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError> {
        let mut all_series = self.api.bucket_metric(bucket, metric, window, cx).await?;
        // Series are reported under the requested metric regardless of their upstream naming.
        for series in &mut all_series {
            metric.as_str().clone_into(&mut series.name);
        }
        Ok(all_series)
    }
}
