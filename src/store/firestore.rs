use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::document::{
    FIELD_DESCRIPTION, FIELD_DUE_DATE, FIELD_IS_FINISHED, FIELD_NAME, FIELD_OWNER, TaskDocument,
    normalize_listing,
};
use super::{StoreError, TaskStore};
use crate::core::task::Task;

pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// A document as returned by the REST API.
#[derive(Debug, Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// One element of a `:runQuery` response stream. Elements that only report
/// progress carry no document.
#[derive(Debug, Deserialize)]
struct QueryItem {
    document: Option<RestDocument>,
}

/// Task store backed by a Firestore collection over its REST API.
pub struct FirestoreTaskStore {
    documents_url: Url,
    collection: String,
    id_token: RwLock<Option<String>>,
    http: Client,
}

impl FirestoreTaskStore {
    pub fn new(project_id: &str, collection: &str) -> Result<Self, StoreError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, project_id, collection)
    }

    /// Point at a different API root, e.g. a local emulator.
    pub fn with_endpoint(
        endpoint: &str,
        project_id: &str,
        collection: &str,
    ) -> Result<Self, StoreError> {
        let mut documents_url = Url::parse(endpoint)
            .map_err(|e| StoreError::Endpoint(format!("{}: {}", endpoint, e)))?;
        documents_url
            .path_segments_mut()
            .map_err(|_| StoreError::Endpoint(format!("{}: not a base URL", endpoint)))?
            .pop_if_empty()
            .extend(["projects", project_id, "databases", "(default)", "documents"]);
        let http = Client::builder().build()?;
        Ok(Self {
            documents_url,
            collection: collection.to_string(),
            id_token: RwLock::new(None),
            http,
        })
    }

    /// Bearer token attached to every request. `None` sends unauthenticated requests.
    pub fn set_id_token(&self, token: Option<String>) {
        let mut slot = self.id_token.write().unwrap_or_else(|e| e.into_inner());
        *slot = token;
    }

    /// Collection name and id are pushed as escaped path segments, so an id
    /// containing `/`, `?` or `#` still addresses exactly one document.
    fn document_url(&self, id: &str) -> Url {
        let mut url = self.documents_url.clone();
        // Checked to be a base URL in `with_endpoint`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&self.collection).push(id);
        }
        url
    }

    fn query_url(&self) -> String {
        format!("{}:runQuery", self.documents_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .id_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn check_status(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Http { status, body })
}

#[async_trait]
impl TaskStore for FirestoreTaskStore {
    async fn put(&self, task: &Task) -> Result<(), StoreError> {
        // PATCH without an update mask replaces the whole document, creating it if absent.
        let body = json!({ "fields": encode_fields(&TaskDocument::from_task(task)) });
        let resp = self
            .authorize(self.http.patch(self.document_url(&task.id)))
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        log::debug!("Stored task document {}", task.id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let resp = self
            .authorize(self.http.get(self.document_url(id)))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc: RestDocument = check_status(resp).await?.json().await?;
        decode_fields(&doc.fields).into_task(document_id(&doc.name)).map(Some)
    }

    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<Task>, StoreError> {
        let body = owner_query(&self.collection, owner_id);
        let resp = self
            .authorize(self.http.post(self.query_url()))
            .json(&body)
            .send()
            .await?;
        let items: Vec<QueryItem> = check_status(resp).await?.json().await?;

        let documents = items
            .into_iter()
            .filter_map(|item| item.document)
            .map(|doc| (document_id(&doc.name).to_string(), decode_fields(&doc.fields)))
            .collect();
        Ok(normalize_listing(documents))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let resp = self
            .authorize(self.http.delete(self.document_url(id)))
            .send()
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(()),
            _ => check_status(resp).await.map(|_| ()),
        }
    }

    async fn set_finished(&self, id: &str, is_finished: bool) -> Result<(), StoreError> {
        let body = json!({
            "fields": { FIELD_IS_FINISHED: { "booleanValue": is_finished } }
        });
        let resp = self
            .authorize(self.http.patch(self.document_url(id)))
            .query(&[
                ("updateMask.fieldPaths", FIELD_IS_FINISHED),
                ("currentDocument.exists", "true"),
            ])
            .json(&body)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        check_status(resp).await.map(|_| ())
    }
}

/// The trailing path segment of a document resource name is its id.
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn owner_query(collection: &str, owner_id: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": FIELD_OWNER },
                    "op": "EQUAL",
                    "value": { "stringValue": owner_id }
                }
            }
        }
    })
}

fn encode_fields(doc: &TaskDocument) -> Map<String, Value> {
    let mut fields = Map::new();
    let strings = [
        (FIELD_NAME, &doc.name),
        (FIELD_DESCRIPTION, &doc.description),
        (FIELD_DUE_DATE, &doc.due_date),
        (FIELD_OWNER, &doc.owner_id),
    ];
    for (key, value) in strings {
        if let Some(v) = value {
            fields.insert(key.to_string(), json!({ "stringValue": v }));
        }
    }
    if let Some(finished) = doc.is_finished {
        fields.insert(
            FIELD_IS_FINISHED.to_string(),
            json!({ "booleanValue": finished }),
        );
    }
    fields
}

fn decode_fields(fields: &Map<String, Value>) -> TaskDocument {
    let string = |key: &str| {
        fields
            .get(key)
            .and_then(|v| v.get("stringValue"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    TaskDocument {
        name: string(FIELD_NAME),
        description: string(FIELD_DESCRIPTION),
        due_date: string(FIELD_DUE_DATE),
        is_finished: fields
            .get(FIELD_IS_FINISHED)
            .and_then(|v| v.get("booleanValue"))
            .and_then(Value::as_bool),
        owner_id: string(FIELD_OWNER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::DueDate;

    #[test]
    fn encodes_typed_values() {
        let mut task = Task::new("Buy milk", "u1");
        task.due_date = DueDate::on(2024, 5, 1).unwrap();
        let fields = encode_fields(&TaskDocument::from_task(&task));

        assert_eq!(fields[FIELD_NAME], json!({ "stringValue": "Buy milk" }));
        assert_eq!(fields[FIELD_DUE_DATE], json!({ "stringValue": "2024-05-01" }));
        assert_eq!(fields[FIELD_IS_FINISHED], json!({ "booleanValue": false }));
        assert_eq!(fields[FIELD_OWNER], json!({ "stringValue": "u1" }));
    }

    #[test]
    fn decodes_partial_document() {
        let raw = json!({
            "name": "projects/p/databases/(default)/documents/tasks/abc123",
            "fields": {
                "taskName": { "stringValue": "Buy milk" },
                "taskIsFinished": { "booleanValue": true },
                "userId": { "stringValue": "u1" },
                "taskDueDate": { "nullValue": null }
            }
        });
        let doc: RestDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(document_id(&doc.name), "abc123");

        let task = decode_fields(&doc.fields).into_task("abc123").unwrap();
        assert_eq!(task.name, "Buy milk");
        assert_eq!(task.description, "");
        assert_eq!(task.due_date, DueDate::Unset);
        assert!(task.is_finished);
    }

    #[test]
    fn query_response_skips_items_without_documents() {
        let raw = json!([
            { "readTime": "2024-05-01T00:00:00Z" },
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/tasks/t1",
                    "fields": { "userId": { "stringValue": "u1" } }
                },
                "readTime": "2024-05-01T00:00:00Z"
            }
        ]);
        let items: Vec<QueryItem> = serde_json::from_value(raw).unwrap();
        let docs: Vec<RestDocument> = items.into_iter().filter_map(|i| i.document).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(document_id(&docs[0].name), "t1");
    }

    #[test]
    fn owner_query_filters_on_user_field() {
        let query = owner_query("tasks", "u1");
        let filter = &query["structuredQuery"]["where"]["fieldFilter"];
        assert_eq!(filter["field"]["fieldPath"], FIELD_OWNER);
        assert_eq!(filter["op"], "EQUAL");
        assert_eq!(filter["value"]["stringValue"], "u1");
        assert_eq!(query["structuredQuery"]["from"][0]["collectionId"], "tasks");
    }

    #[test]
    fn document_urls() {
        let store = FirestoreTaskStore::with_endpoint("http://localhost:8080/v1/", "demo", "tasks")
            .unwrap();
        assert_eq!(
            store.document_url("t1").as_str(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/tasks/t1"
        );
        assert_eq!(
            store.query_url(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents:runQuery"
        );
    }

    #[test]
    fn ids_are_escaped_as_one_path_segment() {
        let store = FirestoreTaskStore::with_endpoint("http://localhost:8080/v1", "demo", "tasks")
            .unwrap();

        let url = store.document_url("t1?x=1");
        assert!(url.query().is_none());
        assert!(url.path().ends_with("/documents/tasks/t1%3Fx=1"));

        let url = store.document_url("a/b");
        assert!(url.path().ends_with("/documents/tasks/a%2Fb"));

        let url = store.document_url("c#d");
        assert!(url.fragment().is_none());
        assert!(url.path().ends_with("/documents/tasks/c%23d"));
    }

    #[test]
    fn rejects_unusable_endpoints() {
        assert!(matches!(
            FirestoreTaskStore::with_endpoint("not a url", "demo", "tasks"),
            Err(StoreError::Endpoint(_))
        ));
        assert!(matches!(
            FirestoreTaskStore::with_endpoint("mailto:someone@example.com", "demo", "tasks"),
            Err(StoreError::Endpoint(_))
        ));
    }
}
