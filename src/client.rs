//! Remote endpoints and the authenticated HTTP client

use crate::error::{Result, SyncError};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use urlencoding::encode;

const CLIENT_USER_AGENT: &str = "StashSync/0.1";

const CHARACTER_START: &str = "C({\"name\":\"";
const CHARACTER_END: &str = "\",\"class";

/// URL builders for the endpoints the worker consumes
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Landing page carrying the active character
    pub fn main_page(&self) -> String {
        format!("{}/my-account", self.base_url)
    }

    pub fn characters(&self, account: &str) -> String {
        format!(
            "{}/character-window/get-characters?accountName={}",
            self.base_url,
            encode(account)
        )
    }

    /// Stash tab contents; with `include_tabs` the reply also carries the tab index
    pub fn stash_items(
        &self,
        account: &str,
        league: &str,
        tab_index: usize,
        include_tabs: bool,
    ) -> String {
        format!(
            "{}/character-window/get-stash-items?league={}&tabs={}&tabIndex={}&accountName={}",
            self.base_url,
            encode(league),
            if include_tabs { 1 } else { 0 },
            tab_index,
            encode(account)
        )
    }

    pub fn character_items(&self, account: &str, character: &str) -> String {
        format!(
            "{}/character-window/get-items?character={}&accountName={}",
            self.base_url,
            encode(character),
            encode(account)
        )
    }
}

/// Build the shared client, attaching the session cookie when present
pub fn build_client(session_id: Option<&str>) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    if let Some(session) = session_id.filter(|s| !s.is_empty()) {
        let cookie = HeaderValue::from_str(&format!("POESESSID={}", session))
            .map_err(|e| SyncError::MalformedReply(format!("invalid session id: {}", e)))?;
        headers.insert(COOKIE, cookie);
    }
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Active character name scraped from the landing page
pub fn extract_selected_character(page: &str) -> Option<String> {
    let start = page.find(CHARACTER_START)? + CHARACTER_START.len();
    let rest = &page[start..];
    let end = rest.find(CHARACTER_END)?;
    let name = &rest[..end];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CharacterEntry {
    name: String,
    #[serde(default)]
    league: String,
}

/// Names of the characters playing in `league`, in reply order
pub fn parse_character_list(body: &str, league: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(body)?;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(map) if map.contains_key("error") => {
            return Err(SyncError::RemoteError(map["error"].to_string()));
        }
        _ => {
            return Err(SyncError::MalformedReply(
                "character list is not an array".to_string(),
            ))
        }
    };

    let names: Vec<String> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<CharacterEntry>(entry).ok())
        .filter(|entry| entry.league == league)
        .map(|entry| entry.name)
        .collect();

    if names.is_empty() {
        return Err(SyncError::NoCharacters(league.to_string()));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_are_encoded() {
        let endpoints = Endpoints::new("https://example.com/");
        assert_eq!(endpoints.main_page(), "https://example.com/my-account");
        assert_eq!(
            endpoints.stash_items("some one", "Hardcore Settlers", 3, true),
            "https://example.com/character-window/get-stash-items?league=Hardcore%20Settlers&tabs=1&tabIndex=3&accountName=some%20one"
        );
        assert_eq!(
            endpoints.character_items("acc", "Hero"),
            "https://example.com/character-window/get-items?character=Hero&accountName=acc"
        );
        assert_eq!(
            endpoints.characters("acc"),
            "https://example.com/character-window/get-characters?accountName=acc"
        );
    }

    #[test]
    fn extracts_active_character() {
        let page = r#"<script>new C({"name":"MyWitch","class":"Witch","league":"Standard"});</script>"#;
        assert_eq!(extract_selected_character(page), Some("MyWitch".to_string()));
        assert_eq!(extract_selected_character("<html></html>"), None);
        assert_eq!(extract_selected_character(r#"C({"name":"","class"#), None);
    }

    #[test]
    fn character_list_filters_league() {
        let body = r#"[
            {"name": "A", "league": "Standard", "class": "Witch"},
            {"name": "B", "league": "Hardcore"},
            {"name": "C", "league": "Standard"}
        ]"#;
        assert_eq!(
            parse_character_list(body, "Standard").unwrap(),
            vec!["A".to_string(), "C".to_string()]
        );
    }

    #[test]
    fn character_list_errors() {
        assert!(matches!(
            parse_character_list(r#"[{"name": "B", "league": "Hardcore"}]"#, "Standard"),
            Err(SyncError::NoCharacters(_))
        ));
        assert!(matches!(
            parse_character_list("not json", "Standard"),
            Err(SyncError::Parse(_))
        ));
        assert!(matches!(
            parse_character_list(r#"{"error": {"code": 6}}"#, "Standard"),
            Err(SyncError::RemoteError(_))
        ));
        assert!(matches!(
            parse_character_list(r#"{"foo": 1}"#, "Standard"),
            Err(SyncError::MalformedReply(_))
        ));
    }

    #[test]
    fn client_builds_with_and_without_session() {
        assert!(build_client(None).is_ok());
        assert!(build_client(Some("abc123")).is_ok());
        assert!(build_client(Some("bad\nvalue")).is_err());
    }
}
