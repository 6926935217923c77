//! Token persistence and message payloads for the KakaoTalk API.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::NotifyError;

/// Default location of the persisted token pair.
pub const DEFAULT_TOKEN_FILE: &str = "kakao_tokens.json";

/// OAuth credential pair as returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// JSON file holding the current [`TokenPair`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored pair. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<TokenPair>, NotifyError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(NotifyError::Store(format!("{}: {}", self.path.display(), e))),
        };
        let tokens: TokenPair = serde_json::from_str(&text)
            .map_err(|e| NotifyError::Store(format!("{}: {}", self.path.display(), e)))?;
        if tokens.access_token.is_empty() {
            return Ok(None);
        }
        Ok(Some(tokens))
    }

    pub fn save(&self, tokens: &TokenPair) -> Result<(), NotifyError> {
        let json = serde_json::to_string_pretty(tokens)
            .map_err(|e| NotifyError::Store(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| NotifyError::Store(format!("{}: {}", self.path.display(), e)))
    }
}

/// One newly found auction item listed in a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub tid: i64,
    pub case_number: Option<String>,
}

/// Build the digest text, or `None` when there is nothing to report.
pub fn format_digest(entries: &[DigestEntry], link: Option<&str>) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let mut lines = vec![
        format!("새로운 경매 항목 {}개가 발견되었습니다.", entries.len()),
        String::new(),
    ];
    for (idx, entry) in entries.iter().enumerate() {
        lines.push(format!(
            "{}. 사건번호: {} / TID: {}",
            idx + 1,
            entry.case_number.as_deref().unwrap_or("N/A"),
            entry.tid
        ));
    }
    if let Some(link) = link {
        lines.push(String::new());
        lines.push(format!("엑셀 파일: {}", link));
    }
    Some(lines.join("\n"))
}

#[derive(Debug, Serialize)]
pub(crate) struct TextTemplate<'a> {
    pub object_type: &'static str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<TemplateLink<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TemplateLink<'a> {
    pub web_url: &'a str,
    pub mobile_web_url: &'a str,
}

impl<'a> TextTemplate<'a> {
    pub fn new(text: &'a str, link: Option<&'a str>) -> Self {
        Self {
            object_type: "text",
            text,
            link: link.map(|url| TemplateLink {
                web_url: url,
                mobile_web_url: url,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_lists_items_in_order() {
        let entries = vec![
            DigestEntry { tid: 11, case_number: Some("2024-16379".into()) },
            DigestEntry { tid: 12, case_number: None },
        ];
        let text = format_digest(&entries, None).unwrap();
        assert_eq!(
            text,
            "새로운 경매 항목 2개가 발견되었습니다.\n\n\
             1. 사건번호: 2024-16379 / TID: 11\n\
             2. 사건번호: N/A / TID: 12"
        );
    }

    #[test]
    fn digest_appends_link() {
        let entries = vec![DigestEntry { tid: 1, case_number: None }];
        let text = format_digest(&entries, Some("https://files.test/a.xlsx")).unwrap();
        assert!(text.ends_with("\n\n엑셀 파일: https://files.test/a.xlsx"));
    }

    #[test]
    fn empty_digest_is_none() {
        assert_eq!(format_digest(&[], Some("https://x")), None);
    }

    #[test]
    fn template_omits_missing_link() {
        let json = serde_json::to_value(TextTemplate::new("hi", None)).unwrap();
        assert_eq!(json, serde_json::json!({"object_type": "text", "text": "hi"}));
        let json = serde_json::to_value(TextTemplate::new("hi", Some("https://x"))).unwrap();
        assert_eq!(json["link"]["mobile_web_url"], "https://x");
    }

    #[test]
    fn store_round_trips_and_missing_file_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        assert_eq!(store.load().unwrap(), None);

        let tokens = TokenPair {
            access_token: "a".into(),
            refresh_token: Some("r".into()),
            token_type: Some("bearer".into()),
            expires_in: Some(21599),
            refresh_token_expires_in: None,
            scope: None,
        };
        store.save(&tokens).unwrap();
        assert_eq!(store.load().unwrap(), Some(tokens));
    }

    #[test]
    fn store_rejects_corrupt_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(TokenStore::new(path).load(), Err(NotifyError::Store(_))));
    }
}
