//! XML formatting for S3 responses

use chrono::{DateTime, Utc};
use s3ftp_core::error::xml_escape;

use crate::listing::{Listing, ListingRequest, VirtualObject, MAX_KEYS};

const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// S3 timestamp format used in listings
fn iso8601(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

/// Format ListBuckets response with the single virtual bucket
pub fn format_list_buckets(bucket: &str, created: &DateTime<Utc>) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="{}">
  <Owner>
    <ID>s3ftp</ID>
    <DisplayName>s3ftp</DisplayName>
  </Owner>
  <Buckets>
    <Bucket>
      <Name>{}</Name>
      <CreationDate>{}</CreationDate>
    </Bucket>
  </Buckets>
</ListAllMyBucketsResult>"#,
        S3_NAMESPACE,
        xml_escape(bucket),
        iso8601(created)
    )
}

fn format_contents(objects: &[VirtualObject]) -> String {
    objects
        .iter()
        .map(|obj| {
            format!(
                r#"  <Contents>
    <Key>{}</Key>
    <LastModified>{}</LastModified>
    <ETag>{}</ETag>
    <Size>{}</Size>
    <StorageClass>{}</StorageClass>
  </Contents>
"#,
                xml_escape(&obj.key),
                iso8601(&obj.last_modified),
                xml_escape(obj.etag),
                obj.size,
                obj.storage_class
            )
        })
        .collect()
}

/// Format ListObjectsV2 response
pub fn format_list_objects_v2(request: &ListingRequest, listing: &Listing) -> String {
    let common_prefixes: String = listing
        .common_prefixes
        .iter()
        .map(|p| {
            format!(
                "  <CommonPrefixes>\n    <Prefix>{}</Prefix>\n  </CommonPrefixes>\n",
                xml_escape(p)
            )
        })
        .collect();

    let delimiter_element = match &request.delimiter {
        Some(d) => format!("  <Delimiter>{}</Delimiter>\n", xml_escape(d)),
        None => String::new(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="{}">
  <Name>{}</Name>
  <Prefix>{}</Prefix>
  <KeyCount>{}</KeyCount>
  <MaxKeys>{}</MaxKeys>
{}  <IsTruncated>false</IsTruncated>
{}{}</ListBucketResult>"#,
        S3_NAMESPACE,
        xml_escape(&request.bucket),
        xml_escape(&request.prefix),
        listing.key_count(),
        MAX_KEYS,
        delimiter_element,
        format_contents(&listing.objects),
        common_prefixes
    )
}

/// Format legacy ListObjects response: flat, without KeyCount
pub fn format_list_objects_v1(request: &ListingRequest, listing: &Listing) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="{}">
  <Name>{}</Name>
  <Prefix>{}</Prefix>
  <Marker></Marker>
  <MaxKeys>{}</MaxKeys>
  <IsTruncated>false</IsTruncated>
{}</ListBucketResult>"#,
        S3_NAMESPACE,
        xml_escape(&request.bucket),
        xml_escape(&request.prefix),
        MAX_KEYS,
        format_contents(&listing.objects)
    )
}
