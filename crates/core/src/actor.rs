use serde::{Deserialize, Serialize};

/// The person triggering an upload, as reported by the caller.
///
/// Authentication happens outside this crate; an `Actor` is trusted as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Staff members bypass the upload cooldown.
    #[serde(default)]
    pub staff: bool,
    /// Superusers bypass both the cooldown and the group check.
    #[serde(default)]
    pub superuser: bool,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            staff: false,
            superuser: false,
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn staff(mut self) -> Self {
        self.staff = true;
        self
    }

    pub fn superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    /// Privileged actors are never held back by the upload cadence.
    pub fn is_privileged(&self) -> bool {
        self.staff || self.superuser
    }

    /// Group names compare case-sensitively, like the directory they come from.
    pub fn is_in_any_group(&self, allowed: &[String]) -> bool {
        self.groups.iter().any(|g| allowed.iter().any(|a| a == g))
    }

    pub fn may_upload(&self, allowed_groups: &[String]) -> bool {
        self.superuser || self.is_in_any_group(allowed_groups)
    }
}
