use crate::error::ApiError;
use std::fmt;

/// Identifier of a pod as handed out by the vendor. Stored trimmed, and never `.` or `..`
/// since it becomes a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: &str) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() || id == "." || id == ".." {
            None
        } else {
            Some(Self(id.to_string()))
        }
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pod status. Only `running` counts as ready, anything the vendor invents is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Pending,
    Running,
    Other(String),
}

impl InstanceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" => Self::Running,
            "pending" => Self::Pending,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Backend able to create, inspect and delete remote GPU pods.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn create_instance(&self) -> Result<InstanceId, ApiError>;
    async fn instance_status(&self, id: &InstanceId) -> Result<InstanceStatus, ApiError>;
    /// Address a Dagger engine can attach to, trimmed.
    async fn instance_host(&self, id: &InstanceId) -> Result<String, ApiError>;
    async fn delete_instance(&self, id: &InstanceId) -> Result<(), ApiError>;
}
