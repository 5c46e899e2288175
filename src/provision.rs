//! Launching new worker processes.

use crate::error::ProvisionError;
use crate::job::ClaimPayload;

use async_trait::async_trait;
use log::info;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Environment variable carrying the JSON job payload to a new worker.
pub const JOB_ENV: &str = "WORKER_JOB";

/// Everything a freshly launched worker needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    /// Job display name.
    pub name: String,
    /// Address the worker reports heartbeats to.
    pub callback_url: String,
    /// Job description; `https_proxys` holds the assigned slice.
    pub payload: ClaimPayload,
}

/// Starts worker processes. The dispatcher does not wait for them.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn spawn(&self, request: SpawnRequest) -> Result<(), ProvisionError>;
}

/// Runs the worker program as a detached child process.
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandProvisioner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Extra arguments placed before the generated ones.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn command(&self, request: &SpawnRequest) -> Result<Command, ProvisionError> {
        let job = serde_json::to_string(&request.payload).map_err(|source| ProvisionError::Encode {
            job: request.name.clone(),
            source,
        })?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--endpoint-url")
            .arg(&request.callback_url)
            .arg("--filename")
            .arg(&request.name)
            .arg("--https-proxys")
            .arg(&request.payload.https_proxys)
            .env(JOB_ENV, job)
            .stdin(Stdio::null());
        Ok(command)
    }
}

#[async_trait]
impl Provisioner for CommandProvisioner {
    async fn spawn(&self, request: SpawnRequest) -> Result<(), ProvisionError> {
        let child = self
            .command(&request)?
            .spawn()
            .map_err(|source| ProvisionError::Spawn {
                job: request.name.clone(),
                source,
            })?;
        info!(
            "Started worker for {} (pid {:?}) with proxies [{}]",
            request.name,
            child.id(),
            request.payload.https_proxys
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, Notifications, RunOptions};

    fn request() -> SpawnRequest {
        let payload = ClaimPayload::new(
            &Job::new("a.json", "{}"),
            &RunOptions::default(),
            &Notifications::default(),
        )
        .with_proxies("none,http://u:p@1.2.3.4:80");
        SpawnRequest {
            name: "a.json".into(),
            callback_url: "http://127.0.0.1:7860".into(),
            payload,
        }
    }

    #[test]
    fn command_passes_callback_and_slice() {
        let provisioner = CommandProvisioner::new("worker").arg("run");
        let command = provisioner.command(&request()).unwrap();
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "run",
                "--endpoint-url",
                "http://127.0.0.1:7860",
                "--filename",
                "a.json",
                "--https-proxys",
                "none,http://u:p@1.2.3.4:80",
            ]
        );
        let job_env = command
            .as_std()
            .get_envs()
            .find(|(k, _)| *k == JOB_ENV)
            .and_then(|(_, v)| v)
            .map(|v| v.to_string_lossy().into_owned())
            .unwrap();
        let payload: ClaimPayload = serde_json::from_str(&job_env).unwrap();
        assert_eq!(payload.https_proxys, "none,http://u:p@1.2.3.4:80");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let provisioner = CommandProvisioner::new("/nonexistent/worker-binary");
        let err = provisioner.spawn(request()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Spawn { .. }));
    }
}
