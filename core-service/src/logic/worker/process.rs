//! Out-of-process worker over the file protocol
//!
//! Each call writes the request to a fresh input file, runs
//! `argv... <input> <output>`, and reads the response from the output file.
//! A non-zero exit, a timeout or unparseable output are all failures.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::process::Command;
use uuid::Uuid;

use super::protocol::{PredictionRequest, PredictionResponse, TrainingResponse, TrainingRow};
use super::{ModelingWorker, WorkerError};
use crate::logic::config::EngineConfig;

/// Longest stderr excerpt kept in an error
const STDERR_EXCERPT: usize = 2000;

pub struct ProcessWorker {
    train_cmd: Vec<String>,
    predict_cmd: Vec<String>,
    timeout: Duration,
    tmp_dir: PathBuf,
}

/// Request/response files removed on every exit path
struct ExchangeFiles {
    input: PathBuf,
    output: PathBuf,
}

impl ExchangeFiles {
    fn new(dir: &std::path::Path, kind: &str) -> Self {
        let id = Uuid::new_v4();
        Self {
            input: dir.join(format!("ml_{}_{}_in.json", kind, id)),
            output: dir.join(format!("ml_{}_{}_out.json", kind, id)),
        }
    }
}

impl Drop for ExchangeFiles {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.input);
        let _ = std::fs::remove_file(&self.output);
    }
}

impl ProcessWorker {
    pub fn new(
        train_cmd: Vec<String>,
        predict_cmd: Vec<String>,
        timeout: Duration,
        tmp_dir: PathBuf,
    ) -> Self {
        Self {
            train_cmd,
            predict_cmd,
            timeout,
            tmp_dir,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.worker_train_cmd.clone(),
            config.worker_predict_cmd.clone(),
            config.worker_timeout(),
            config.worker_tmp_dir.clone(),
        )
    }

    async fn invoke<Req, Resp>(&self, cmd: &[String], kind: &str, request: &Req) -> Result<Resp, WorkerError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let (program, args) = cmd.split_first().ok_or(WorkerError::EmptyCommand)?;

        tokio::fs::create_dir_all(&self.tmp_dir).await?;
        let files = ExchangeFiles::new(&self.tmp_dir, kind);
        tokio::fs::write(&files.input, serde_json::to_vec(request)?).await?;

        let child = Command::new(program)
            .args(args)
            .arg(&files.input)
            .arg(&files.output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WorkerError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Dropping the future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(WorkerError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .trim()
                .chars()
                .take(STDERR_EXCERPT)
                .collect();
            return Err(WorkerError::Exit {
                status: output.status.to_string(),
                stderr,
            });
        }

        let data = tokio::fs::read(&files.output).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[async_trait]
impl ModelingWorker for ProcessWorker {
    async fn train_batch(&self, rows: &[TrainingRow]) -> Result<TrainingResponse, WorkerError> {
        let response: TrainingResponse = self.invoke(&self.train_cmd, "training", rows).await?;
        response.validate()
    }

    async fn predict_one(&self, request: &PredictionRequest) -> Result<PredictionResponse, WorkerError> {
        self.invoke(&self.predict_cmd, "predict", request).await
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
