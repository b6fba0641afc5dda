use crate::provider::InstanceId;
use std::fmt;
use thiserror::Error;

/// Failures talking to the Thunder API. Transport, status and decoding problems all end up here.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid API URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("status probe failed")]
    Probe(#[source] ApiError),

    #[error("wait was cancelled")]
    Cancelled,

    #[error("instance not ready after {attempts} status checks")]
    TimedOut { attempts: u32 },
}

/// Which part of a workflow failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Wait,
    GetHost,
    Delete,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "failed to create Thunder instance"),
            Self::Wait => write!(f, "failed waiting for instance to be ready"),
            Self::GetHost => write!(f, "failed to get instance host"),
            Self::Delete => write!(f, "failed to delete Thunder instance"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("TNR_API_TOKEN is required")]
    MissingToken,

    #[error("instance id is required")]
    MissingInstanceId,

    /// `instance_id` is set once the instance exists, so a failed deploy can still be destroyed.
    #[error("{step}{}", instance_suffix(.instance_id.as_ref()))]
    Step {
        step: Step,
        instance_id: Option<InstanceId>,
        #[source]
        source: StepError,
    },
}

fn instance_suffix(instance_id: Option<&InstanceId>) -> String {
    instance_id
        .map(|id| format!(" (instance {id})"))
        .unwrap_or_default()
}

impl RunnerError {
    pub fn at<E: Into<StepError>>(
        step: Step,
        instance_id: Option<&InstanceId>,
    ) -> impl FnOnce(E) -> Self {
        let instance_id = instance_id.cloned();
        move |e| Self::Step {
            step,
            instance_id,
            source: e.into(),
        }
    }
}
