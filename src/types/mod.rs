//! Wire types for the Drive v3 `files` endpoints.

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

macro_rules! file_fields {
    () => {
        "id,name,mimeType,size,createdTime,modifiedTime,webContentLink,webViewLink"
    };
}

/// Partial-response selector for one file.
pub const FILE_FIELDS: &str = file_fields!();

/// Partial-response selector for a listing page.
pub const LIST_FIELDS: &str = concat!("nextPageToken,incompleteSearch,files(", file_fields!(), ")");

/// A file or folder as `files.get` and `files.list` return it.
///
/// Every field defaults because partial responses omit whatever `fields`
/// did not select. `size` is a decimal string and is absent for folders and
/// native Google documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    /// RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    /// Direct download link; Drive omits it for folders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_content_link: Option<String>,
    /// Link to the file in the Drive web UI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

impl DriveFile {
    /// Folders are files with [`FOLDER_MIME_TYPE`].
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// One page of `files.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileList {
    pub next_page_token: Option<String>,
    /// Drive gave up before searching every corpus.
    pub incomplete_search: bool,
    pub files: Vec<DriveFile>,
}

/// Metadata body for `files.create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
}

impl CreateFileRequest {
    /// A file named `name` inside `parent_id`.
    pub fn file(name: impl Into<String>, mime_type: impl Into<String>, parent_id: &str) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            parents: vec![parent_id.to_string()],
        }
    }

    pub fn folder(name: impl Into<String>, parent_id: &str) -> Self {
        Self::file(name, FOLDER_MIME_TYPE, parent_id)
    }
}

/// Query string for `files.list`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Lets folders on shared drives be listed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub supports_all_drives: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub include_items_from_all_drives: bool,
}

impl ListFilesParams {
    /// Non-trashed children of `folder_id`, optionally only those whose name
    /// contains `name_filter`.
    pub fn children_of(folder_id: &str, name_filter: Option<&str>) -> Self {
        Self {
            q: Some(children_query(folder_id, name_filter)),
            fields: Some(LIST_FIELDS.to_string()),
            supports_all_drives: true,
            include_items_from_all_drives: true,
            ..Default::default()
        }
    }

    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }
}

/// Escapes backslashes and single quotes for a `'...'` query literal.
pub fn escape_query_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// The `q` expression for a folder's children.
pub fn children_query(folder_id: &str, name_filter: Option<&str>) -> String {
    let parent = format!(
        "'{}' in parents and trashed = false",
        escape_query_literal(folder_id)
    );
    match name_filter {
        Some(filter) => format!("{} and name contains '{}'", parent, escape_query_literal(filter)),
        None => parent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_deserializes() {
        let file: DriveFile =
            serde_json::from_str(r#"{"id":"1","name":"a.txt","mimeType":"text/plain"}"#).unwrap();
        assert_eq!(file.id, "1");
        assert_eq!(file.size, None);
        assert!(!file.is_folder());

        let folder: DriveFile = serde_json::from_str(
            r#"{"id":"2","name":"Docs","mimeType":"application/vnd.google-apps.folder"}"#,
        )
        .unwrap();
        assert!(folder.is_folder());
    }

    #[test]
    fn test_file_list_defaults() {
        let list: FileList = serde_json::from_str(r#"{"files":[]}"#).unwrap();
        assert!(list.next_page_token.is_none());
        assert!(!list.incomplete_search);
        assert!(list.files.is_empty());

        let list: FileList =
            serde_json::from_str(r#"{"incompleteSearch":true,"nextPageToken":"n"}"#).unwrap();
        assert!(list.incomplete_search);
        assert_eq!(list.next_page_token.as_deref(), Some("n"));
    }

    #[test]
    fn test_list_fields_selects_file_fields() {
        assert!(LIST_FIELDS.contains(&format!("files({})", FILE_FIELDS)));
        assert!(LIST_FIELDS.contains("incompleteSearch"));
    }

    #[test]
    fn test_children_query() {
        assert_eq!(
            children_query("abc", None),
            "'abc' in parents and trashed = false"
        );
        assert_eq!(
            children_query("abc", Some("O'Brien")),
            "'abc' in parents and trashed = false and name contains 'O\\'Brien'"
        );
        assert_eq!(escape_query_literal(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_folder_request_serialization() {
        let json = serde_json::to_value(CreateFileRequest::folder("New", "parent")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "New",
                "mimeType": FOLDER_MIME_TYPE,
                "parents": ["parent"]
            })
        );
    }

    #[test]
    fn test_list_params_query_string() {
        let encoded =
            serde_urlencoded::to_string(ListFilesParams::children_of("abc", None).with_page_size(10))
                .unwrap();
        assert!(encoded.contains("pageSize=10"));
        assert!(encoded.contains("supportsAllDrives=true"));
        assert!(!encoded.contains("pageToken"));

        let bare = serde_urlencoded::to_string(ListFilesParams::default()).unwrap();
        assert_eq!(bare, "");
    }
}
