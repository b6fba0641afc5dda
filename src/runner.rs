//! Provisioning and teardown of a Dagger runner on Thunder Compute.
//!
//! Deploy walks create, wait-for-running and get-host in order and stops at the first error,
//! tagging it with the step that failed. Destroy is a single delete.

use crate::config::{ApiToken, PollConfig, ThunderConfig};
use crate::error::{ApiError, RunnerError, Step, StepError};
use crate::provider::{InstanceId, Provider};
use crate::thunder::ThunderClient;
use crate::wait::wait_until_ready;
use std::fmt;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Environment variable the Dagger CLI reads to find a remote engine.
pub const RUNNER_HOST_VAR: &str = "_EXPERIMENTAL_DAGGER_RUNNER_HOST";

/// Connection host of a ready instance. Displays as a shell `export` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerHost(String);

impl fmt::Display for RunnerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "export {RUNNER_HOST_VAR}={}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub instance_id: InstanceId,
    pub host: RunnerHost,
}

/// Runs one API call unless the token fires first. Dropping the future aborts the request.
async fn unless_cancelled<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, StepError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StepError::Cancelled),
        res = call => res.map_err(StepError::from),
    }
}

/// Creates an instance, waits until it runs and returns where to reach it.
pub async fn provision<P: Provider + ?Sized>(
    provider: &P,
    poll: &PollConfig,
    cancel: &CancellationToken,
) -> Result<Deployment, RunnerError> {
    let instance_id = unless_cancelled(cancel, provider.create_instance())
        .await
        .map_err(RunnerError::at(Step::Create, None))?;

    info!(instance_id = %instance_id, "Waiting for instance to be ready");
    let id = &instance_id;
    let attempts = wait_until_ready(move || provider.instance_status(id), poll, cancel)
        .await
        .map_err(RunnerError::at(Step::Wait, Some(id)))?;
    info!(instance_id = %instance_id, attempts, "Instance is running");

    let host = unless_cancelled(cancel, provider.instance_host(id))
        .await
        .map_err(RunnerError::at(Step::GetHost, Some(id)))?;
    info!(instance_id = %instance_id, host = %host, "Runner host available");

    Ok(Deployment {
        instance_id,
        host: RunnerHost(host),
    })
}

pub async fn deprovision<P: Provider + ?Sized>(
    provider: &P,
    instance_id: &InstanceId,
) -> Result<(), RunnerError> {
    provider
        .delete_instance(instance_id)
        .await
        .map_err(RunnerError::at(Step::Delete, Some(instance_id)))
}

/// Deploys a Dagger runner on Thunder. A blank token is rejected before any request.
pub async fn deploy_on_thunder(
    config: &ThunderConfig,
    token: &str,
    cancel: &CancellationToken,
) -> Result<Deployment, RunnerError> {
    let token = ApiToken::new(token).ok_or(RunnerError::MissingToken)?;
    let client = ThunderClient::new(config, token).map_err(RunnerError::at(Step::Create, None))?;
    provision(&client, &config.poll, cancel).await
}

/// Destroys a Thunder instance. Blank token or id are rejected before any request.
pub async fn destroy_on_thunder(
    config: &ThunderConfig,
    token: &str,
    instance_id: &str,
) -> Result<(), RunnerError> {
    let token = ApiToken::new(token).ok_or(RunnerError::MissingToken)?;
    let instance_id = InstanceId::new(instance_id).ok_or(RunnerError::MissingInstanceId)?;
    let client = ThunderClient::new(config, token)
        .map_err(RunnerError::at(Step::Delete, Some(&instance_id)))?;
    deprovision(&client, &instance_id).await
}
