//! Google Drive v3 transport scoped to the hidden `appDataFolder`.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::remote::{RemoteError, RemoteFileStore, RemoteResult};
use crate::auth::AccessTokenProvider;
use crate::models::RemoteFile;
use crate::util::compact_text;

const APP_DATA_SPACE: &str = "appDataFolder";
const FILE_FIELDS: &str = "id,name,modifiedTime";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,modifiedTime)";
const LIST_PAGE_SIZE: &str = "1000";
const MULTIPART_BOUNDARY: &str = "cardforge-drive-upload-boundary";

/// Drive-backed `RemoteFileStore`.
#[derive(Clone)]
pub struct GoogleDriveStore<P: AccessTokenProvider> {
    api_base_url: String,
    client: Client,
    tokens: P,
}

impl<P: AccessTokenProvider> GoogleDriveStore<P> {
    pub fn new(api_base_url: impl AsRef<str>, tokens: P) -> RemoteResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|error| RemoteError::Transport(error.to_string()))?;
        Ok(Self {
            api_base_url: api_base_url.as_ref().trim_end_matches('/').to_string(),
            client,
            tokens,
        })
    }

    #[must_use]
    pub const fn tokens(&self) -> &P {
        &self.tokens
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base_url)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.api_base_url)
    }

    async fn authorized(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let token = self.ensure_signed_in().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|error| RemoteError::Transport(error.to_string()))?;
        check_status(response).await
    }

    async fn list_page(
        &self,
        query: Option<&str>,
        page_token: Option<&str>,
    ) -> RemoteResult<DriveFileList> {
        let mut params = vec![
            ("spaces", APP_DATA_SPACE),
            ("fields", LIST_FIELDS),
            ("pageSize", LIST_PAGE_SIZE),
        ];
        if let Some(query) = query {
            params.push(("q", query));
        }
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token));
        }

        let response = self
            .authorized(self.client.get(self.files_url()).query(&params))
            .await?;
        response
            .json::<DriveFileList>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))
    }

    async fn find_by_name(&self, name: &str) -> RemoteResult<Option<DriveFile>> {
        let query = name_query(name);
        let page = self.list_page(Some(&query), None).await?;
        Ok(page.files.into_iter().next())
    }
}

impl<P: AccessTokenProvider> RemoteFileStore for GoogleDriveStore<P> {
    async fn ensure_signed_in(&self) -> RemoteResult<String> {
        self.tokens
            .ensure_signed_in()
            .await
            .map_err(|error| RemoteError::Auth(error.to_string()))
    }

    fn has_credentials(&self) -> bool {
        self.tokens.is_signed_in()
    }

    async fn list_files(&self) -> RemoteResult<Vec<RemoteFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(None, page_token.as_deref()).await?;
            for file in page.files {
                files.push(file.into_remote_file()?);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(count = files.len(), "Listed Drive appData files");
        Ok(files)
    }

    async fn get_file_content(&self, file_id: &str) -> RemoteResult<Vec<u8>> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/{}", self.files_url(), urlencoding::encode(file_id)))
                    .query(&[("alt", "media")]),
            )
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| RemoteError::Transport(error.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn save_file(
        &self,
        name: &str,
        content: &[u8],
        mime_type: &str,
    ) -> RemoteResult<RemoteFile> {
        let request = match self.find_by_name(name).await? {
            Some(existing) => self
                .client
                .patch(format!(
                    "{}/{}",
                    self.upload_url(),
                    urlencoding::encode(&existing.id)
                ))
                .query(&[("uploadType", "media"), ("fields", FILE_FIELDS)])
                .header(reqwest::header::CONTENT_TYPE, mime_type)
                .body(content.to_vec()),
            None => self
                .client
                .post(self.upload_url())
                .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
                .header(
                    reqwest::header::CONTENT_TYPE,
                    format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
                )
                .body(multipart_body(name, content, mime_type)?),
        };

        let response = self.authorized(request).await?;
        let file = response
            .json::<DriveFile>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        file.into_remote_file()
    }

    async fn delete_file(&self, file_id: &str) -> RemoteResult<()> {
        self.authorized(
            self.client
                .delete(format!("{}/{}", self.files_url(), urlencoding::encode(file_id))),
        )
        .await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(status, &body))
}

fn error_for_status(status: StatusCode, body: &str) -> RemoteError {
    let message = parse_api_error(body);
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Auth(message),
        StatusCode::NOT_FOUND | StatusCode::GONE => RemoteError::NotFound(message),
        _ => RemoteError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[derive(Debug, Deserialize)]
struct DriveErrorResponse {
    error: DriveErrorBody,
}

#[derive(Debug, Deserialize)]
struct DriveErrorBody {
    message: Option<String>,
}

fn parse_api_error(body: &str) -> String {
    serde_json::from_str::<DriveErrorResponse>(body)
        .ok()
        .and_then(|payload| payload.error.message)
        .map_or_else(|| compact_text(body), |message| message.trim().to_string())
}

/// Drive query matching one file by exact name.
fn name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and trashed = false")
}

fn multipart_body(name: &str, content: &[u8], mime_type: &str) -> RemoteResult<Vec<u8>> {
    let metadata = serde_json::json!({
        "name": name,
        "parents": [APP_DATA_SPACE],
        "mimeType": mime_type,
    });
    let metadata = serde_json::to_string(&metadata)
        .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;

    let mut body = Vec::with_capacity(content.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{MULTIPART_BOUNDARY}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    Ok(body)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    modified_time: Option<String>,
}

impl DriveFile {
    fn into_remote_file(self) -> RemoteResult<RemoteFile> {
        let raw = self.modified_time.ok_or_else(|| {
            RemoteError::InvalidPayload(format!("file {} has no modifiedTime", self.id))
        })?;
        let modified_at = chrono::DateTime::parse_from_rfc3339(&raw)
            .map_err(|error| {
                RemoteError::InvalidPayload(format!("invalid modifiedTime '{raw}': {error}"))
            })?
            .timestamp_millis();

        Ok(RemoteFile {
            id: self.id,
            name: self.name,
            modified_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn name_query_escapes_quotes_and_backslashes() {
        assert_eq!(
            name_query(r"it's\odd.json"),
            r"name = 'it\'s\\odd.json' and trashed = false"
        );
    }

    #[test]
    fn drive_file_parses_rfc3339_modified_time() {
        let list: DriveFileList = serde_json::from_str(
            r#"{"nextPageToken":"abc","files":[{"id":"1","name":"deck-x.json","modifiedTime":"2024-03-01T12:00:00.250Z"}]}"#,
        )
        .unwrap();
        assert_eq!(list.next_page_token.as_deref(), Some("abc"));

        let file = list.files.into_iter().next().unwrap().into_remote_file().unwrap();
        assert_eq!(
            file,
            RemoteFile {
                id: "1".to_string(),
                name: "deck-x.json".to_string(),
                modified_at: 1_709_294_400_250,
            }
        );
    }

    #[test]
    fn drive_file_without_time_is_invalid_payload() {
        let file = DriveFile {
            id: "1".to_string(),
            name: "n".to_string(),
            modified_time: None,
        };
        assert!(matches!(
            file.into_remote_file(),
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn status_mapping() {
        let body = r#"{"error":{"code":404,"message":"File not found: abc."}}"#;
        assert_eq!(
            error_for_status(StatusCode::NOT_FOUND, body),
            RemoteError::NotFound("File not found: abc.".to_string())
        );
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, ""),
            RemoteError::Auth(_)
        ));
        let server = error_for_status(StatusCode::SERVICE_UNAVAILABLE, "upstream down");
        assert!(server.is_transport());
        assert_eq!(
            server,
            RemoteError::Api {
                status: 503,
                message: "upstream down".to_string()
            }
        );
    }

    #[test]
    fn multipart_body_has_metadata_and_content() {
        let body = multipart_body("img-a.png", b"\x89PNG", "image/png").unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with(&format!("--{MULTIPART_BOUNDARY}\r\n")));
        assert!(text.contains(r#""parents":["appDataFolder"]"#));
        assert!(text.contains("Content-Type: image/png\r\n\r\n"));
        assert!(text.ends_with(&format!("\r\n--{MULTIPART_BOUNDARY}--\r\n")));
    }
}
