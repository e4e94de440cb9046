//! Resource families with a region or zone inventory.
//!
//! Each family describes how its resources are listed and how their metric series map to gauges;
//! the scraping itself is performed by the generic [`Collector`](crate::Collector).

pub use self::{
    bucket::{BucketFamily, ObjectStorageApi},
    database::{DatabaseApi, DatabaseFamily},
    loadbalancer::{LoadBalancerApi, LoadBalancerFamily},
    redis::{RedisApi, RedisFamily},
};

pub mod bucket;
pub mod database;
pub mod loadbalancer;
pub mod redis;
