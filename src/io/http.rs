use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::io::api::{ApiError, RemoteApi, error_message};
use crate::model::{
    Note, NoteDraft, NoteUpdate, ProfileUpdate, Registration, Tag, TokenResponse, User,
};

/// Blocking HTTP client for the notes backend.
///
/// Every request except login/register carries the bearer token.
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::NotLoggedIn)?;
        Ok(self.client.request(method, self.url(path)).bearer_auth(token))
    }

    /// Execute a request and return the body of a 2xx response. Other
    /// statuses become `ApiError::Status` with the backend's message.
    fn exchange(&self, rb: RequestBuilder) -> Result<String, ApiError> {
        let req = rb.build()?;
        debug!(method = %req.method(), url = %req.url(), "api request");
        let resp = self.client.execute(req)?;
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        debug!(status = status.as_u16(), bytes = body.len(), "api response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }
        Ok(body)
    }

    /// Send an authenticated request. A 401 here means the stored token
    /// is no longer accepted.
    fn send(&self, rb: RequestBuilder) -> Result<String, ApiError> {
        match self.exchange(rb) {
            Err(ApiError::Status { status: 401, .. }) => Err(ApiError::SessionExpired),
            other => other,
        }
    }

    fn send_json<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(rb)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Login and registration: a 401 is a credentials problem, reported
    /// with the backend's own message.
    fn send_credentials<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<T, ApiError> {
        let body = self.exchange(rb)?;
        Ok(serde_json::from_str(&body)?)
    }

    fn send_empty(&self, rb: RequestBuilder) -> Result<(), ApiError> {
        self.send(rb).map(|_| ())
    }

    /// Fetch a collection. Anything that is not a list (or `{"notes": [...]}`)
    /// counts as empty, as do the backend's "empty table" errors.
    fn get_list<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<T>, ApiError> {
        let body = match self.send(self.request(Method::GET, path)?) {
            Ok(body) => body,
            Err(e) if e.is_empty_collection() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        decode_list(&body, key)
    }

    // -----------------------------------------------------------------------
    // Account endpoints
    // -----------------------------------------------------------------------

    /// Exchange credentials for a token. The endpoint takes an OAuth2
    /// password form where the e-mail goes in `username`.
    pub fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let rb = self
            .client
            .post(self.url("/auth/user/login/"))
            .form(&[("username", email), ("password", password)]);
        self.send_credentials(rb)
    }

    pub fn register(&self, registration: &Registration) -> Result<User, ApiError> {
        let rb = self
            .client
            .post(self.url("/auth/user/register/"))
            .json(registration);
        self.send_credentials(rb)
    }

    pub fn me(&self) -> Result<User, ApiError> {
        self.send_json(self.request(Method::GET, "/auth/users/me")?)
    }

    pub fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let rb = self
            .request(Method::PATCH, "/auth/users/update-user/")?
            .json(update);
        self.send_json(rb)
    }

    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), ApiError> {
        let rb = self
            .request(Method::PUT, "/auth/users/reset-password-in-profile")?
            .json(&json!({
                "old_password": old_password,
                "new_password": new_password,
                "confirm_password": new_password,
            }));
        self.send_empty(rb)
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.send_empty(self.request(Method::POST, "/auth/users/logout/")?)
    }
}

fn decode_list<T: DeserializeOwned>(body: &str, key: &str) -> Result<Vec<T>, ApiError> {
    let value: Value = serde_json::from_str(body)?;
    let items = match value {
        list @ Value::Array(_) => list,
        Value::Object(mut map) => match map.remove(key) {
            Some(list @ Value::Array(_)) => list,
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };
    Ok(serde_json::from_value(items)?)
}

impl RemoteApi for HttpClient {
    fn get_notes(&self) -> Result<Vec<Note>, ApiError> {
        self.get_list("/notes/notes/get-all-notes/", "notes")
    }

    fn get_tags(&self) -> Result<Vec<Tag>, ApiError> {
        self.get_list("/tags/tag/get-all-tags", "tags")
    }

    fn create_tag(&self, name: &str) -> Result<Tag, ApiError> {
        let rb = self
            .request(Method::POST, "/tags/tag/create")?
            .json(&json!({ "name": name }));
        self.send_json(rb)
    }

    fn update_tag(&self, id: i64, name: &str) -> Result<Tag, ApiError> {
        let rb = self
            .request(Method::PUT, &format!("/tags/tag/update-tag/{}", id))?
            .json(&json!({ "name": name }));
        self.send_json(rb)
    }

    fn delete_tag(&self, id: i64) -> Result<(), ApiError> {
        self.send_empty(self.request(Method::DELETE, &format!("/tags/tag/delete/{}", id))?)
    }

    fn delete_note(&self, id: i64) -> Result<(), ApiError> {
        self.send_empty(self.request(Method::DELETE, &format!("/notes/notes/delete/{}", id))?)
    }

    fn add_tag_to_note(&self, note_id: i64, tag_id: i64) -> Result<(), ApiError> {
        let path = format!("/notes/notes/{}/tags/{}", note_id, tag_id);
        self.send_empty(self.request(Method::POST, &path)?)
    }

    fn create_note(&self, draft: &NoteDraft) -> Result<Note, ApiError> {
        let rb = self
            .request(Method::POST, "/notes/notes/create-note/")?
            .json(draft);
        self.send_json(rb)
    }

    fn update_note(&self, id: i64, update: &NoteUpdate) -> Result<Note, ApiError> {
        let rb = self
            .request(Method::PATCH, &format!("/notes/notes/update-note/{}", id))?
            .json(update);
        self.send_json(rb)
    }

    fn delete_notes(&self, ids: &[i64]) -> Result<(), ApiError> {
        let rb = self
            .request(Method::DELETE, "/notes/notes/delete-selected-notes")?
            .json(&json!({ "ids": ids }));
        self.send_empty(rb)
    }

    fn toggle_pin(&self, id: i64) -> Result<Note, ApiError> {
        let path = format!("/notes/notes/toggle-pin/{}", id);
        self.send_json(self.request(Method::PATCH, &path)?)
    }

    fn search_notes(&self, query: &str) -> Result<Vec<Note>, ApiError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rb = self
            .request(Method::GET, "/notes/notes/search/")?
            .query(&[("query", query)]);
        let body = self.send(rb)?;
        decode_list(&body, "notes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const NOTE_JSON: &str = r#"{"id":10,"title":"Groceries","content":"milk","priority":"Low",
        "created_at":"2025-03-01T08:30:00","updated_at":"2025-03-01T08:30:00",
        "tags":[{"id":3,"name":"personal"}]}"#;

    fn client(server: &mockito::Server) -> HttpClient {
        HttpClient::new(&server.url(), Duration::from_secs(5))
            .unwrap()
            .with_token("tok-123")
    }

    #[test]
    fn get_notes_sends_bearer_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/notes/notes/get-all-notes/")
            .match_header("authorization", "Bearer tok-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!("[{}]", NOTE_JSON))
            .create();

        let notes = client(&server).get_notes().unwrap();
        mock.assert();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].tags[0].name, "personal");
    }

    #[test]
    fn get_notes_accepts_wrapped_list_and_empty_errors() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/notes/notes/get-all-notes/")
            .with_status(200)
            .with_body(format!(r#"{{"notes":[{}]}}"#, NOTE_JSON))
            .create();
        assert_eq!(client(&server).get_notes().unwrap().len(), 1);

        server
            .mock("GET", "/tags/tag/get-all-tags")
            .with_status(404)
            .with_body(r#"{"detail":"Database is empty"}"#)
            .create();
        assert!(client(&server).get_tags().unwrap().is_empty());
    }

    #[test]
    fn error_detail_becomes_message() {
        let mut server = mockito::Server::new();
        server
            .mock("DELETE", "/tags/tag/delete/3")
            .with_status(404)
            .with_body(r#"{"detail":"Tag not found"}"#)
            .create();

        let err = client(&server).delete_tag(3).unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Tag not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unauthorized_is_session_expired() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/auth/users/me")
            .with_status(401)
            .with_body(r#"{"detail":"Could not validate credentials"}"#)
            .create();
        assert!(matches!(
            client(&server).me().unwrap_err(),
            ApiError::SessionExpired
        ));
    }

    #[test]
    fn missing_token_fails_before_network() {
        let server = mockito::Server::new();
        let client = HttpClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.get_notes().unwrap_err(),
            ApiError::NotLoggedIn
        ));
    }

    #[test]
    fn login_posts_password_form() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/auth/user/login/")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "ada@example.com".into()),
                Matcher::UrlEncoded("password".into(), "secret1".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"abc","refresh_token":"def","token_type":"bearer"}"#)
            .create();

        let client = HttpClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let token = client.login("ada@example.com", "secret1").unwrap();
        mock.assert();
        assert_eq!(token.access_token, "abc");
    }

    #[test]
    fn wrong_password_is_not_an_expired_session() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/user/login/")
            .with_status(401)
            .with_body(r#"{"detail":"User or password is incorrect"}"#)
            .create();

        let client = HttpClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.login("ada@example.com", "wrong").unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 401, .. }));
        assert_eq!(err.to_string(), "User or password is incorrect (HTTP 401)");
    }

    #[test]
    fn add_tag_by_name_creates_missing_tag() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/tags/tag/get-all-tags")
            .with_status(200)
            .with_body(r#"[{"id":3,"name":"personal"}]"#)
            .create();
        let create = server
            .mock("POST", "/tags/tag/create")
            .match_body(Matcher::Json(json!({"name": "general"})))
            .with_status(200)
            .with_body(r#"{"id":9,"name":"general"}"#)
            .create();
        let attach = server
            .mock("POST", "/notes/notes/10/tags/9")
            .with_status(201)
            .with_body(r#"{"message":"ok"}"#)
            .create();

        client(&server).add_tag_to_note_by_name(10, "general").unwrap();
        create.assert();
        attach.assert();
    }

    #[test]
    fn add_tag_by_name_reuses_existing_tag() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/tags/tag/get-all-tags")
            .with_status(200)
            .with_body(r#"[{"id":3,"name":"personal"},{"id":9,"name":"general"}]"#)
            .create();
        let create = server.mock("POST", "/tags/tag/create").expect(0).create();
        let attach = server
            .mock("POST", "/notes/notes/10/tags/9")
            .with_status(201)
            .create();

        client(&server).add_tag_to_note_by_name(10, "general").unwrap();
        create.assert();
        attach.assert();
    }

    #[test]
    fn delete_selected_sends_ids_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("DELETE", "/notes/notes/delete-selected-notes")
            .match_body(Matcher::Json(json!({"ids": [1, 2, 3]})))
            .with_status(200)
            .create();
        client(&server).delete_notes(&[1, 2, 3]).unwrap();
        mock.assert();
    }

    #[test]
    fn blank_search_skips_request() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create();
        assert!(client(&server).search_notes("   ").unwrap().is_empty());
        mock.assert();
    }

    #[test]
    fn search_encodes_query() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/notes/notes/search/")
            .match_query(Matcher::UrlEncoded("query".into(), "milk & eggs".into()))
            .with_status(200)
            .with_body(format!("[{}]", NOTE_JSON))
            .create();
        assert_eq!(client(&server).search_notes("milk & eggs").unwrap().len(), 1);
    }
}
