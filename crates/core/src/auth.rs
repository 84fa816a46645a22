use serde::{Deserialize, Serialize};

/// Editor on whose behalf server-side drafts are held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorIdentity {
    username: String,
    display_name: String,
}

impl EditorIdentity {
    /// Creates an editor identity.
    #[must_use]
    pub fn new(username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns the username that owns drafts on the backend.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the display name for the current editor.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }
}
