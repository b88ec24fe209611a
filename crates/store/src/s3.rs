//! S3 implementation of BackupCatalog.

use async_trait::async_trait;
use aws_sdk_s3::{config::Region, error::DisplayErrorContext, Client};
use chrono::{DateTime, Utc};

use retention_core::{traits::BackupCatalog, types::ObjectEntry, Error, Result};

/// S3 (or S3-compatible) bucket holding backup archives.
pub struct S3BackupCatalog {
    client: Client,
    bucket: String,
}

impl S3BackupCatalog {
    /// Create a catalog from the ambient AWS configuration.
    ///
    /// `endpoint` targets S3-compatible services (MinIO, R2); those usually
    /// also need `force_path_style`.
    pub async fn new(
        bucket: &str,
        endpoint: Option<&str>,
        region: Option<&str>,
        force_path_style: bool,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(force_path_style);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        }
    }

    /// Create with custom client (for testing/custom config).
    pub fn new_with_client(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    /// Bucket this catalog operates on.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BackupCatalog for S3BackupCatalog {
    fn name(&self) -> &str {
        "s3"
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| Error::listing(format!("S3 list error: {}", DisplayErrorContext(&e))))?;
            pages += 1;

            for object in output.contents() {
                let key = object
                    .key()
                    .ok_or_else(|| Error::listing("S3 returned an object without a key"))?;
                let modified = object.last_modified().ok_or_else(|| {
                    Error::listing(format!("object {} has no last-modified time", key))
                })?;
                let last_modified = DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())
                    .ok_or_else(|| {
                        Error::listing(format!("object {} has an out-of-range timestamp", key))
                    })?;
                let size_bytes = u64::try_from(object.size().unwrap_or(0)).unwrap_or(0);

                entries.push(ObjectEntry::new(key, size_bytes, last_modified));
            }

            if output.is_truncated() == Some(true) {
                match output.next_continuation_token() {
                    Some(token) => continuation = Some(token.to_string()),
                    None => {
                        return Err(Error::listing(
                            "S3 reported a truncated listing without a continuation token",
                        ))
                    }
                }
            } else {
                break;
            }
        }

        tracing::debug!(
            bucket = %self.bucket,
            prefix = %prefix,
            pages,
            objects = entries.len(),
            "Listed backup objects"
        );
        Ok(entries)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::deletion(key, format!("S3 delete error: {}", DisplayErrorContext(&e))))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials};
    use aws_smithy_runtime::client::http::test_util::{ReplayEvent, StaticReplayClient};
    use aws_smithy_types::body::SdkBody;

    const PAGE_ONE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>db-backups</Name>
  <Prefix>backups/</Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>page-2</NextContinuationToken>
  <Contents>
    <Key>backups/2024-06-13.sql.gz</Key>
    <LastModified>2024-06-13T02:00:00.000Z</LastModified>
    <Size>100</Size>
  </Contents>
  <Contents>
    <Key>backups/2024-06-14.sql.gz</Key>
    <LastModified>2024-06-14T02:00:00.000Z</LastModified>
    <Size>200</Size>
  </Contents>
</ListBucketResult>"#;

    const PAGE_TWO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>db-backups</Name>
  <Prefix>backups/</Prefix>
  <KeyCount>1</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>backups/2024-06-15.sql.gz</Key>
    <LastModified>2024-06-15T02:00:00.500Z</LastModified>
    <Size>300</Size>
  </Contents>
</ListBucketResult>"#;

    const TRUNCATED_WITHOUT_TOKEN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>db-backups</Name>
  <Prefix>backups/</Prefix>
  <KeyCount>1</KeyCount>
  <MaxKeys>1</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <Contents>
    <Key>backups/2024-06-13.sql.gz</Key>
    <LastModified>2024-06-13T02:00:00.000Z</LastModified>
    <Size>100</Size>
  </Contents>
</ListBucketResult>"#;

    const MISSING_LAST_MODIFIED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>db-backups</Name>
  <Prefix>backups/</Prefix>
  <KeyCount>1</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>backups/partial.sql.gz</Key>
    <Size>100</Size>
  </Contents>
</ListBucketResult>"#;

    const ACCESS_DENIED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>AccessDenied</Code>
  <Message>Access Denied</Message>
  <RequestId>4442587FB7D0A2F9</RequestId>
</Error>"#;

    fn event(status: u16, body: &'static str) -> ReplayEvent {
        ReplayEvent::new(
            http::Request::builder()
                .uri("https://db-backups.s3.us-east-1.amazonaws.com/?list-type=2&prefix=backups%2F")
                .body(SdkBody::empty())
                .unwrap(),
            http::Response::builder()
                .status(status)
                .body(SdkBody::from(body))
                .unwrap(),
        )
    }

    /// A catalog whose requests are answered, in order, from `events`.
    fn replay_catalog(events: Vec<ReplayEvent>) -> (S3BackupCatalog, StaticReplayClient) {
        let http_client = StaticReplayClient::new(events);
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .region(Region::new("us-east-1"))
            .http_client(http_client.clone())
            .build();
        (
            S3BackupCatalog::new_with_client(Client::from_conf(config), "db-backups"),
            http_client,
        )
    }

    #[test]
    fn test_new_with_client() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let catalog = S3BackupCatalog::new_with_client(Client::from_conf(config), "db-backups");
        assert_eq!(catalog.bucket(), "db-backups");
        assert_eq!(catalog.name(), "s3");
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let (catalog, http_client) =
            replay_catalog(vec![event(200, PAGE_ONE), event(200, PAGE_TWO)]);

        let entries = catalog.list("backups/").await.unwrap();

        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "backups/2024-06-13.sql.gz",
                "backups/2024-06-14.sql.gz",
                "backups/2024-06-15.sql.gz",
            ]
        );
        let sizes: Vec<_> = entries.iter().map(|e| e.size_bytes).collect();
        assert_eq!(sizes, vec![100, 200, 300]);
        assert_eq!(entries[2].last_modified.to_rfc3339(), "2024-06-15T02:00:00.500+00:00");

        let uris: Vec<String> = http_client
            .actual_requests()
            .map(|request| request.uri().to_string())
            .collect();
        assert_eq!(uris.len(), 2);
        assert!(uris[0].contains("prefix=backups%2F"));
        assert!(!uris[0].contains("continuation-token"));
        assert!(uris[1].contains("continuation-token=page-2"));
    }

    #[tokio::test]
    async fn test_truncated_page_without_token_is_listing_error() {
        let (catalog, http_client) = replay_catalog(vec![event(200, TRUNCATED_WITHOUT_TOKEN)]);

        let err = catalog.list("backups/").await.unwrap_err();

        assert!(matches!(err, Error::Listing(_)), "unexpected error: {:?}", err);
        assert!(err.to_string().contains("continuation token"));
        assert_eq!(http_client.actual_requests().count(), 1);
    }

    #[tokio::test]
    async fn test_object_without_last_modified_is_listing_error() {
        let (catalog, _) = replay_catalog(vec![event(200, MISSING_LAST_MODIFIED)]);

        let err = catalog.list("backups/").await.unwrap_err();

        assert!(matches!(err, Error::Listing(_)), "unexpected error: {:?}", err);
        assert!(err.to_string().contains("backups/partial.sql.gz"));
    }

    #[tokio::test]
    async fn test_access_denied_is_listing_error() {
        let (catalog, _) = replay_catalog(vec![event(403, ACCESS_DENIED)]);

        let err = catalog.list("backups/").await.unwrap_err();

        assert!(matches!(err, Error::Listing(_)), "unexpected error: {:?}", err);
        assert!(err.to_string().contains("AccessDenied"));
    }
}
