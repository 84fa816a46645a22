use std::str::FromStr;

use schemata_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Access restriction applied to entity instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityMode {
    /// Every user may access instances.
    #[default]
    #[serde(rename = "NONE")]
    Unrestricted,
    /// Only listed users may access instances.
    #[serde(rename = "USERS")]
    Users,
    /// Only users holding a listed role may access instances.
    #[serde(rename = "ROLES")]
    Roles,
}

impl SecurityMode {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrestricted => "NONE",
            Self::Users => "USERS",
            Self::Roles => "ROLES",
        }
    }
}

impl FromStr for SecurityMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "NONE" => Ok(Self::Unrestricted),
            "USERS" => Ok(Self::Users),
            "ROLES" => Ok(Self::Roles),
            _ => Err(AppError::Validation(format!(
                "unknown security mode '{value}'"
            ))),
        }
    }
}

/// Security mode plus the member lists it governs. Only the list matching
/// the active mode is authoritative; the other list is always empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySettings {
    mode: SecurityMode,
    users: Vec<String>,
    roles: Vec<String>,
}

impl SecuritySettings {
    /// Builds settings from a mode and its member list.
    pub fn new(mode: SecurityMode, members: Vec<String>) -> AppResult<Self> {
        let mut settings = Self::default();
        settings.save(mode, members)?;
        Ok(settings)
    }

    /// Returns the active mode.
    #[must_use]
    pub fn mode(&self) -> SecurityMode {
        self.mode
    }

    /// Returns the users list (empty unless the mode is `USERS`).
    #[must_use]
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Returns the roles list (empty unless the mode is `ROLES`).
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Returns the member list matching the active mode.
    #[must_use]
    pub fn members(&self) -> &[String] {
        match self.mode {
            SecurityMode::Unrestricted => &[],
            SecurityMode::Users => &self.users,
            SecurityMode::Roles => &self.roles,
        }
    }

    /// Switches mode and clears every list that does not match it.
    pub fn change_mode(&mut self, mode: SecurityMode) {
        if mode != SecurityMode::Users {
            self.users.clear();
        }
        if mode != SecurityMode::Roles {
            self.roles.clear();
        }
        self.mode = mode;
    }

    /// Sets the mode together with its members.
    pub fn save(&mut self, mode: SecurityMode, members: Vec<String>) -> AppResult<()> {
        if mode == SecurityMode::Unrestricted && !members.is_empty() {
            return Err(AppError::Validation(
                "security members are only allowed for USERS or ROLES mode".to_owned(),
            ));
        }

        let mut unique: Vec<String> = Vec::with_capacity(members.len());
        for member in members {
            let member = member.trim().to_owned();
            if member.is_empty() {
                return Err(AppError::Validation(
                    "security member must not be empty".to_owned(),
                ));
            }
            if !unique.contains(&member) {
                unique.push(member);
            }
        }

        self.change_mode(mode);
        match mode {
            SecurityMode::Unrestricted => {}
            SecurityMode::Users => self.users = unique,
            SecurityMode::Roles => self.roles = unique,
        }
        Ok(())
    }
}
