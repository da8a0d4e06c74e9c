//! Scorecard byte intake: URL canonicalization, host allowlisting and a
//! size-capped download.

use std::time::Duration;

use tracing::info;
use url::Url;

use crate::import::types::{ImportError, ImportErrorCode, ImportMetadata};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Canonicalize a user-supplied export URL.
///
/// Accepts scheme-less input, `/scorecards/<id>` and `/rounds/<id>` shapes,
/// and query/fragment noise; produces `https://<host>/scorecards/<id>/export`.
/// The host allowlist is enforced here, before any network I/O happens.
pub fn canonicalize_export_url(
    raw: &str,
    allowed_hosts: &[String],
    metadata: &ImportMetadata,
) -> Result<Url, ImportError> {
    let invalid = |message: String| ImportError::new(ImportErrorCode::InvalidUdiscUrl, message, metadata);

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("export URL is empty".into()));
    }

    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        // Scheme-less input like `udisc.com/scorecards/abc`.
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{trimmed}"))
            .map_err(|err| invalid(format!("unrecognizable export URL: {err}")))?,
        Err(err) => return Err(invalid(format!("unrecognizable export URL: {err}"))),
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported URL scheme `{}`", url.scheme())));
    }

    let host = url
        .host_str()
        .ok_or_else(|| invalid("export URL has no host".into()))?
        .to_ascii_lowercase();
    if !allowed_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(&host)) {
        return Err(invalid(format!("host `{host}` is not an allowed scorecard source")));
    }

    let segments: Vec<String> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).map(str::to_owned).collect())
        .unwrap_or_default();
    let scorecard_id = match segments.as_slice() {
        [first, id, ..] if first == "scorecards" || first == "rounds" => id.clone(),
        _ => return Err(invalid(format!("unrecognized export path `{}`", url.path()))),
    };

    url.set_path(&format!("/scorecards/{scorecard_id}/export"));
    url.set_query(None);
    url.set_fragment(None);
    if url.set_scheme("https").is_err() {
        return Err(invalid("could not normalize URL scheme".into()));
    }
    Ok(url)
}

/// Download an export, refusing to read past `max_bytes`.
pub async fn fetch_export(
    url: &Url,
    max_bytes: usize,
    metadata: &ImportMetadata,
) -> Result<Vec<u8>, ImportError> {
    let fetch_failed =
        |message: String| ImportError::new(ImportErrorCode::FetchFailed, message, metadata);

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|err| fetch_failed(format!("failed to build HTTP client: {err}")))?;

    let mut response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| fetch_failed(format!("download failed: {err}")))?
        .error_for_status()
        .map_err(|err| fetch_failed(format!("export responded with an error: {err}")))?;

    if let Some(length) = response.content_length()
        && length > max_bytes as u64
    {
        return Err(too_large(length as usize, max_bytes, metadata));
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| fetch_failed(format!("download interrupted: {err}")))?
    {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(too_large(bytes.len() + chunk.len(), max_bytes, metadata));
        }
        bytes.extend_from_slice(&chunk);
    }

    info!(
        round_id = %metadata.round_id,
        bytes = bytes.len(),
        "fetched scorecard export"
    );
    Ok(bytes)
}

/// Enforce the size cap on directly uploaded content.
pub fn check_upload_size(
    content: &[u8],
    max_bytes: usize,
    metadata: &ImportMetadata,
) -> Result<(), ImportError> {
    if content.len() > max_bytes {
        return Err(too_large(content.len(), max_bytes, metadata));
    }
    Ok(())
}

fn too_large(actual: usize, max_bytes: usize, metadata: &ImportMetadata) -> ImportError {
    ImportError::new(
        ImportErrorCode::FileTooLarge,
        format!("scorecard is {actual} bytes; the limit is {max_bytes}"),
        metadata,
    )
}
