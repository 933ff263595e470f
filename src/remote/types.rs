//! Google Drive API v3 request/response shapes.

use serde::{Deserialize, Serialize};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// RFC 3339; absent on some shared items.
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest<'a> {
    pub name: &'a str,
    pub mime_type: &'a str,
    pub parents: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_files_list_page() {
        let body = r#"{
            "nextPageToken": "abc",
            "files": [
                {"id": "f1", "name": "a.jpg", "mimeType": "image/jpeg",
                 "createdTime": "2024-03-01T10:00:00.000Z", "description": "gull"},
                {"id": "d1", "name": "Birds", "mimeType": "application/vnd.google-apps.folder"}
            ]
        }"#;
        let page: FilesListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        assert_eq!(page.files.len(), 2);
        assert!(!page.files[0].is_folder());
        assert!(page.files[1].is_folder());
        assert_eq!(page.files[0].description.as_deref(), Some("gull"));
        assert_eq!(page.files[1].created_time, None);
    }

    #[test]
    fn serializes_folder_creation() {
        let req = CreateFolderRequest {
            name: "shuffle_true",
            mime_type: FOLDER_MIME_TYPE,
            parents: ["settings-id"],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["mimeType"], FOLDER_MIME_TYPE);
        assert_eq!(json["parents"][0], "settings-id");
    }
}
