use serde::{Deserialize, Serialize};

/// User-facing collection settings, persisted by the settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Export flat minimal records instead of full captured nodes.
    pub minimal_data: bool,
    pub include_replies: bool,
    /// Stop after this many items; 0 means unlimited.
    pub max_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            minimal_data: true,
            include_replies: false,
            max_count: 0,
        }
    }
}

impl Settings {
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(minimal_data) = patch.minimal_data {
            self.minimal_data = minimal_data;
        }
        if let Some(include_replies) = patch.include_replies {
            self.include_replies = include_replies;
        }
        if let Some(max_count) = patch.max_count {
            self.max_count = max_count;
        }
    }
}

/// Partial settings update; absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimal_data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_replies: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,
}
