//! Service factory for building command dependencies.
//!
//! Keeps construction of the process runner, git client and HTTP client out
//! of the command functions so tests can pass their own collaborators.

use anyhow::Result;
use reqwest::Client;

use crate::{
    http::HttpClient,
    package::GitCli,
    process::TokioRunner,
};

use super::config::SyncConfig;

/// Build an HTTP client for tool downloads.
pub fn build_http_client() -> Result<HttpClient> {
    let client = Client::builder()
        .user_agent(concat!("clockwork-cli/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(HttpClient::new(client))
}

/// Build the git client with the configured clone/pull timeout.
pub fn build_git(config: &SyncConfig) -> GitCli<TokioRunner> {
    GitCli::new(TokioRunner, config.timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_http_client_sends_user_agent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", Matcher::Regex("^clockwork-cli/".to_string()))
            .create_async()
            .await;

        let client = build_http_client().unwrap();
        let _ = client.inner().get(server.url()).send().await;

        mock.assert_async().await;
    }
}
