use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::core::errors::{GatewayError, GatewayResult};
use crate::models::job::{CommandSpec, JobDescriptor, JobSubmission, TaskName};
use crate::services::launcher::spawn_detached;
use crate::services::traits::JobSubmitter;

/// Turns task names into cluster submissions and kicks off the
/// reproducible pipeline. Neither operation waits for the work to finish.
pub struct JobCoordinator {
    submitter: Arc<dyn JobSubmitter>,
    job_id_prefix: String,
    spark_submit_bin: String,
    scripts: HashMap<TaskName, String>,
    pipeline: CommandSpec,
    pipeline_cwd: PathBuf,
}

impl JobCoordinator {
    pub fn new(submitter: Arc<dyn JobSubmitter>, cfg: &Config) -> Result<Self, String> {
        let (program, args) = cfg
            .pipeline_command
            .split_first()
            .ok_or_else(|| "pipeline command is empty".to_string())?;

        let scripts = HashMap::from([
            (TaskName::Recommender, cfg.spark_script_recommender.clone()),
            (TaskName::Forecasting, cfg.spark_script_forecasting.clone()),
        ]);

        Ok(Self {
            submitter,
            job_id_prefix: cfg.job_id_prefix.clone(),
            spark_submit_bin: cfg.spark_submit_bin.clone(),
            scripts,
            pipeline: CommandSpec::new(program.clone(), args.to_vec()),
            pipeline_cwd: cfg.pipeline_cwd.clone(),
        })
    }

    pub fn submitter_backend(&self) -> &'static str {
        self.submitter.backend()
    }

    fn spark_command(&self, task: TaskName) -> GatewayResult<CommandSpec> {
        let script = self.scripts.get(&task).ok_or_else(|| {
            GatewayError::InvalidTask(format!("no processing script configured for {task}"))
        })?;
        Ok(CommandSpec::new(
            self.spark_submit_bin.clone(),
            vec![
                "--master".to_string(),
                "yarn".to_string(),
                "--deploy-mode".to_string(),
                "cluster".to_string(),
                script.clone(),
                "--task".to_string(),
                task.to_string(),
            ],
        ))
    }

    /// Unknown names are rejected before anything is sent to the cluster.
    pub async fn submit_named_job(&self, task_name: &str) -> GatewayResult<JobSubmission> {
        let task: TaskName = task_name.parse()?;
        let descriptor = JobDescriptor::new(&self.job_id_prefix, task, self.spark_command(task)?);

        info!(
            "[JOBS] submitting {} as {} via {}",
            task.display_name(),
            descriptor.job_id(),
            self.submitter.backend()
        );
        match self.submitter.submit(&descriptor).await {
            Ok(application_id) => Ok(JobSubmission {
                descriptor,
                application_id,
            }),
            Err(err) => {
                warn!("[JOBS] submission of {} failed: {}", descriptor.job_id(), err);
                Err(err)
            }
        }
    }

    /// Starts the pipeline command in its working directory and returns once
    /// the process is running.
    pub fn trigger_reproducible_pipeline(&self) -> GatewayResult<Option<u32>> {
        let pid = spawn_detached("PIPELINE", &self.pipeline, Some(&self.pipeline_cwd))?;
        info!(
            "[PIPELINE] triggered `{}` in {}",
            self.pipeline.command_line(),
            self.pipeline_cwd.display()
        );
        Ok(pid)
    }
}
