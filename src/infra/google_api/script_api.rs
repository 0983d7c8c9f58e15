use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::api_client::GoogleApiClient;
use crate::core::session::CredentialSession;
use crate::core::workspace::{RemoteError, ScriptFile, ScriptFileType, ScriptProject, ScriptService};

const SCRIPT_BASE: &str = "https://script.googleapis.com/v1/projects";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiProject {
    script_id: String,
    #[serde(default)]
    title: String,
    parent_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFile {
    name: String,
    #[serde(rename = "type")]
    file_type: ScriptFileType,
    #[serde(default)]
    source: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default)]
    files: Vec<ApiFile>,
}

impl From<ApiFile> for ScriptFile {
    fn from(api: ApiFile) -> Self {
        ScriptFile {
            name: api.name,
            file_type: api.file_type,
            source: api.source,
        }
    }
}

impl From<ScriptFile> for ApiFile {
    fn from(file: ScriptFile) -> Self {
        ApiFile {
            name: file.name,
            file_type: file.file_type,
            source: file.source,
        }
    }
}

pub struct GoogleScriptApi {
    api: GoogleApiClient,
}

impl GoogleScriptApi {
    pub fn new(http: Client, session: Arc<dyn CredentialSession>) -> Self {
        Self {
            api: GoogleApiClient::new(http, session),
        }
    }
}

#[async_trait]
impl ScriptService for GoogleScriptApi {
    async fn create_project(
        &self,
        title: &str,
        parent_id: &str,
    ) -> Result<ScriptProject, RemoteError> {
        let url = GoogleApiClient::url(SCRIPT_BASE, &[])?;
        let request = self
            .api
            .request(Method::POST, url)
            .await?
            .json(&json!({ "title": title, "parentId": parent_id }));
        let project: ApiProject = self.api.send(request).await?;

        Ok(ScriptProject {
            script_id: project.script_id,
            title: project.title,
            parent_id: project.parent_id,
        })
    }

    async fn update_content(
        &self,
        script_id: &str,
        files: Vec<ScriptFile>,
    ) -> Result<Vec<ScriptFile>, RemoteError> {
        let url = GoogleApiClient::url(SCRIPT_BASE, &[script_id, "content"])?;
        let body = ApiContent {
            files: files.into_iter().map(Into::into).collect(),
        };
        let request = self.api.request(Method::PUT, url).await?.json(&body);
        let content: ApiContent = self.api.send(request).await?;
        Ok(content.files.into_iter().map(Into::into).collect())
    }

    async fn get_content(&self, script_id: &str) -> Result<Vec<ScriptFile>, RemoteError> {
        let url = GoogleApiClient::url(SCRIPT_BASE, &[script_id, "content"])?;
        let request = self.api.request(Method::GET, url).await?;
        let content: ApiContent = self.api.send(request).await?;
        Ok(content.files.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_uses_the_wire_type_names() {
        let body = ApiContent {
            files: vec![ScriptFile {
                name: "Code".into(),
                file_type: ScriptFileType::ServerJs,
                source: "function main() {}".into(),
            }
            .into()],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["files"][0]["type"], "SERVER_JS");

        let parsed: ApiContent = serde_json::from_value(json!({
            "scriptId": "abc",
            "files": [{ "name": "index", "type": "HTML", "source": "<p/>",
                        "lastModifyUser": {}, "functionSet": {} }]
        }))
        .unwrap();
        let files: Vec<ScriptFile> = parsed.files.into_iter().map(Into::into).collect();
        assert_eq!(files[0].file_type, ScriptFileType::Html);
    }
}
