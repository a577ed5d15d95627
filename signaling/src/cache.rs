//! Caching policy for `describe`/`get-endpoint` calls. With `CachingPolicy::
//! File`, a successful `get-endpoint` is persisted so a restart within
//! `caching_period` can jump straight to `get-ice-config`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachingPolicy {
    None,
    DescribeAndEndpoint,
    File,
}

#[derive(Debug, Clone)]
pub struct CachedChannel {
    pub channel_name: String,
    pub region: String,
    pub role: String,
    pub channel_arn: String,
    pub https_endpoint: String,
    pub wss_endpoint: String,
    pub creation_ts_epoch_seconds: u64,
}

impl CachedChannel {
    /// Serializes as one `version,channelName,region,role,channelArn,
    /// httpsEndpoint,wssEndpoint,creationTsEpochSeconds` line.
    pub fn to_line(&self) -> String {
        format!(
            "1,{},{},{},{},{},{},{}",
            self.channel_name,
            self.region,
            self.role,
            self.channel_arn,
            self.https_endpoint,
            self.wss_endpoint,
            self.creation_ts_epoch_seconds,
        )
    }

    pub fn from_line(line: &str) -> Option<Self> {
        let mut parts = line.trim().splitn(8, ',');
        let version = parts.next()?;
        if version != "1" {
            return None;
        }
        Some(Self {
            channel_name: parts.next()?.to_owned(),
            region: parts.next()?.to_owned(),
            role: parts.next()?.to_owned(),
            channel_arn: parts.next()?.to_owned(),
            https_endpoint: parts.next()?.to_owned(),
            wss_endpoint: parts.next()?.to_owned(),
            creation_ts_epoch_seconds: parts.next()?.parse().ok()?,
        })
    }

    pub fn is_fresh(&self, caching_period: Duration, now: SystemTime) -> bool {
        let age = now
            .duration_since(UNIX_EPOCH + Duration::from_secs(self.creation_ts_epoch_seconds))
            .unwrap_or(Duration::MAX);
        age < caching_period
    }
}

/// Whether `describe`/`get-endpoint` calls can be skipped this run, given
/// the configured policy and whatever was recovered from the file cache (if
/// any).
pub fn should_skip_describe_and_endpoint(
    policy: CachingPolicy,
    cached: Option<&CachedChannel>,
    caching_period: Duration,
    now: SystemTime,
) -> bool {
    match policy {
        CachingPolicy::None => false,
        CachingPolicy::DescribeAndEndpoint | CachingPolicy::File => cached
            .map(|c| c.is_fresh(caching_period, now))
            .unwrap_or(false),
    }
}
