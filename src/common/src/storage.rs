//! Object-store construction from a storage DSN.
//!
//! Supported schemes:
//! - `file:///path/to/dir`: local filesystem rooted at the given directory
//! - `memory://`: transient in-memory store
//! - `s3://[key:secret@]host[:port]/bucket`: S3 or an S3-compatible endpoint

use anyhow::{Result, bail};
use object_store::{ObjectStore, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory};
use std::sync::Arc;
use url::Url;

/// Resolve a storage DSN to an object store handle.
pub fn object_store_from_dsn(dsn: &str) -> Result<Arc<dyn ObjectStore>> {
    let url = Url::parse(dsn).map_err(|e| anyhow::anyhow!("invalid storage DSN '{dsn}': {e}"))?;

    match url.scheme() {
        "file" => {
            let path = url.path();
            if path.is_empty() || path == "/" {
                bail!("file DSN must carry a directory: file:///path/to/dir");
            }
            Ok(Arc::new(LocalFileSystem::new_with_prefix(path)?))
        }
        "memory" => Ok(Arc::new(InMemory::new())),
        "s3" => Ok(Arc::new(s3_builder(&url)?.build()?)),
        other => bail!("unsupported storage scheme '{other}' (expected file, memory, or s3)"),
    }
}

/// Build an S3 client from the DSN, distinguishing real AWS endpoints from
/// S3-compatible servers such as MinIO (which need path-style addressing).
fn s3_builder(url: &Url) -> Result<AmazonS3Builder> {
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("s3 DSN is missing a host"))?;
    let bucket = url.path().trim_start_matches('/');
    if bucket.is_empty() {
        bail!("s3 DSN must name a bucket: s3://host/bucket");
    }

    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_region("us-east-1");

    let access_key = url.username();
    if !access_key.is_empty() {
        builder = builder
            .with_access_key_id(access_key)
            .with_secret_access_key(url.password().unwrap_or(""));
    }

    if !host.contains("amazonaws.com") {
        let scheme = if url.port() == Some(443) { "https" } else { "http" };
        let endpoint = match url.port() {
            Some(p) => format!("{scheme}://{host}:{p}"),
            None => format!("{scheme}://{host}"),
        };
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(true)
            .with_virtual_hosted_style_request(false);
    }

    Ok(builder)
}
