use reqwest::StatusCode;

use crate::common::{ChatError, UserRef};

/// Client cho dịch vụ tìm người dùng và tạo cuộc trò chuyện mới.
#[derive(Clone)]
pub struct UserDirectory {
    client: reqwest::Client,
    base_url: String,
    search_path: String,
    start_chat_path: String,
    min_query_chars: usize,
}

impl UserDirectory {
    pub fn new(
        base_url: &str,
        search_path: &str,
        start_chat_path: &str,
        min_query_chars: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            search_path: normalize_path(search_path),
            start_chat_path: normalize_path(start_chat_path),
            min_query_chars,
        }
    }

    /// Gate so short prefixes do not fire a request per keystroke.
    pub fn should_search(&self, query: &str) -> bool {
        query.trim().chars().count() >= self.min_query_chars
    }

    pub async fn search(&self, query: &str) -> Result<Vec<UserRef>, ChatError> {
        let url = format!("{}{}", self.base_url, self.search_path);
        let users = self
            .client
            .get(url)
            .query(&[("query", query.trim())])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<UserRef>>()
            .await?;
        log::debug!("Directory returned {} users for {query:?}", users.len());
        Ok(users)
    }

    /// Makes sure the server knows about the conversation before a view opens.
    pub async fn start_chat(&self, user_id: i64) -> Result<(), ChatError> {
        let url = format!(
            "{}{}/{user_id}/",
            self.base_url,
            self.start_chat_path.trim_end_matches('/')
        );
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChatError::UserNotFound(user_id));
        }
        response.error_for_status()?;
        log::info!("Conversation with user {user_id} is ready");
        Ok(())
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    #[test]
    fn short_queries_are_gated() {
        let directory = UserDirectory::new("http://localhost", "/search", "/start_chat", 3);
        assert!(!directory.should_search(""));
        assert!(!directory.should_search("  bo "));
        assert!(directory.should_search("bob"));
    }

    #[tokio::test]
    async fn search_returns_user_refs() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/search").query_param("query", "bob");
                then.status(200)
                    .json_body(json!([{ "id": 7, "username": "bob" }, { "id": 9, "username": "bobby" }]));
            })
            .await;

        let directory = UserDirectory::new(&server.base_url(), "search", "/start_chat", 3);
        let users = directory.search(" bob ").await.unwrap();
        mock.assert_async().await;
        assert_eq!(
            users,
            vec![
                UserRef { id: 7, username: "bob".to_string() },
                UserRef { id: 9, username: "bobby".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn search_surfaces_server_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search");
                then.status(500);
            })
            .await;

        let directory = UserDirectory::new(&server.base_url(), "/search", "/start_chat", 3);
        assert!(matches!(
            directory.search("bob").await,
            Err(ChatError::Directory(_))
        ));
    }

    #[tokio::test]
    async fn start_chat_maps_missing_user() {
        let server = MockServer::start_async().await;
        let found = server
            .mock_async(|when, then| {
                when.method(GET).path("/start_chat/7/");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/start_chat/99/");
                then.status(404);
            })
            .await;

        let directory = UserDirectory::new(&server.base_url(), "/search", "/start_chat/", 3);
        directory.start_chat(7).await.unwrap();
        found.assert_async().await;
        assert!(matches!(
            directory.start_chat(99).await,
            Err(ChatError::UserNotFound(99))
        ));
    }
}
