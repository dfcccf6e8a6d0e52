use std::path::PathBuf;

use once_cell::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreClientMode {
    /// Talk to the NameNode's WebHDFS REST endpoint directly.
    WebHdfs,
    /// Shell out to the `hdfs dfs` client, optionally wrapped (e.g. `docker exec -i namenode hdfs`).
    Cli,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSubmitMode {
    YarnRest,
    SparkSubmit,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub node_env: String,
    pub host: String,
    pub log_level: String,
    pub log_max_files: String,
    pub cors_origins: Vec<String>,

    pub hdfs_client_mode: StoreClientMode,
    pub hdfs_api_url: String,
    pub hdfs_user: String,
    pub hdfs_default_dir: String,
    pub hdfs_cli_command: Vec<String>,

    pub job_submit_mode: JobSubmitMode,
    pub yarn_api_url: String,
    pub job_id_prefix: String,
    pub spark_submit_bin: String,
    pub spark_script_recommender: String,
    pub spark_script_forecasting: String,

    pub pipeline_command: Vec<String>,
    pub pipeline_cwd: PathBuf,

    pub staging_dir: PathBuf,
    pub remote_timeout_secs: u64,
    pub max_upload_bytes: u64,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn init_global() -> Result<&'static Config, String> {
        let cfg = Config::from_env()?;
        CONFIG.set(cfg).map_err(|_| "Config already initialized".to_string())?;
        CONFIG.get().ok_or_else(|| "Config not initialized".to_string())
    }

    fn from_env() -> Result<Config, String> {
        let read_u64 = |key: &str, def: u64| -> u64 {
            match std::env::var(key) {
                Ok(v) => v.trim().parse::<u64>().unwrap_or(def),
                Err(_) => def,
            }
        };
        let read_str = |key: &str, def: &str| -> String {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| def.to_string())
        };

        let port = std::env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()).unwrap_or(8000);
        let node_env = read_str("NODE_ENV", "development");
        let host = read_str("HOST", "0.0.0.0");

        let log_level = read_str("LOG_LEVEL", "info");
        let log_max_files = read_str("LOG_MAX_FILES", "7d");

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(v) => v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            Err(_) => vec!["*".to_string()],
        };

        let hdfs_client_mode = parse_store_mode(&read_str("HDFS_CLIENT_MODE", "webhdfs"))?;
        let hdfs_api_url = read_str("HDFS_API_URL", "http://namenode:9870/webhdfs/v1");
        let hdfs_user = read_str("HDFS_USER", "root");
        let hdfs_default_dir = read_str("HDFS_DEFAULT_DIR", "/user/hashiramart");
        let hdfs_cli_command = split_command(&read_str("HDFS_CLI_COMMAND", "hdfs"));
        if hdfs_cli_command.is_empty() {
            return Err("HDFS_CLI_COMMAND must not be empty".to_string());
        }

        let job_submit_mode = parse_submit_mode(&read_str("JOB_SUBMIT_MODE", "yarn-rest"))?;
        let yarn_api_url = read_str("YARN_API_URL", "http://resourcemanager:8088/ws/v1/cluster/apps");
        let job_id_prefix = read_str("JOB_ID_PREFIX", "hashiramart");
        let spark_submit_bin = read_str("SPARK_SUBMIT_BIN", "/opt/spark/bin/spark-submit");
        let spark_script_path = read_str("SPARK_SCRIPT_PATH", "/app/process_data.py");
        let spark_script_recommender = read_str("SPARK_SCRIPT_RECOMMENDER", &spark_script_path);
        let spark_script_forecasting = read_str("SPARK_SCRIPT_FORECASTING", &spark_script_path);

        let pipeline_command = split_command(&read_str("PIPELINE_COMMAND", "dvc repro"));
        if pipeline_command.is_empty() {
            return Err("PIPELINE_COMMAND must not be empty".to_string());
        }
        let pipeline_cwd = PathBuf::from(read_str("PIPELINE_CWD", "/app"));

        let staging_dir = std::env::var("STAGING_DIR")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("bigdata-gateway-staging"));
        let remote_timeout_secs = read_u64("REMOTE_TIMEOUT_SECS", 30).max(1);
        let max_upload_bytes = read_u64("MAX_UPLOAD_BYTES", 50 * 1024 * 1024);

        Ok(Config {
            port,
            node_env,
            host,
            log_level,
            log_max_files,
            cors_origins,
            hdfs_client_mode,
            hdfs_api_url,
            hdfs_user,
            hdfs_default_dir,
            hdfs_cli_command,
            job_submit_mode,
            yarn_api_url,
            job_id_prefix,
            spark_submit_bin,
            spark_script_recommender,
            spark_script_forecasting,
            pipeline_command,
            pipeline_cwd,
            staging_dir,
            remote_timeout_secs,
            max_upload_bytes,
        })
    }

    pub fn print(&self) {
        println!("Current configuration:");
        println!("  - NODE_ENV: {}", self.node_env);
        println!("  - PORT: {}", self.port);
        println!("  - HOST: {}", self.host);
        println!("  - LOG_LEVEL: {}", self.log_level);
        println!("  - Distributed store:");
        println!("    • HDFS_CLIENT_MODE: {:?}", self.hdfs_client_mode);
        println!("    • HDFS_API_URL: {}", self.hdfs_api_url);
        println!("    • HDFS_USER: {}", self.hdfs_user);
        println!("    • HDFS_DEFAULT_DIR: {}", self.hdfs_default_dir);
        println!("    • HDFS_CLI_COMMAND: {}", self.hdfs_cli_command.join(" "));
        println!("  - Resource manager:");
        println!("    • JOB_SUBMIT_MODE: {:?}", self.job_submit_mode);
        println!("    • YARN_API_URL: {}", self.yarn_api_url);
        println!("    • JOB_ID_PREFIX: {}", self.job_id_prefix);
        println!("    • SPARK_SUBMIT_BIN: {}", self.spark_submit_bin);
        println!("  - Pipeline:");
        println!("    • PIPELINE_COMMAND: {}", self.pipeline_command.join(" "));
        println!("    • PIPELINE_CWD: {}", self.pipeline_cwd.display());
        println!("  - STAGING_DIR: {}", self.staging_dir.display());
        println!("  - REMOTE_TIMEOUT_SECS: {}", self.remote_timeout_secs);
        println!("  - MAX_UPLOAD_BYTES: {}", self.max_upload_bytes);
    }
}

fn parse_store_mode(raw: &str) -> Result<StoreClientMode, String> {
    match raw.to_lowercase().as_str() {
        "webhdfs" | "http" => Ok(StoreClientMode::WebHdfs),
        "cli" | "command" => Ok(StoreClientMode::Cli),
        other => Err(format!("unknown HDFS_CLIENT_MODE: {other}")),
    }
}

fn parse_submit_mode(raw: &str) -> Result<JobSubmitMode, String> {
    match raw.to_lowercase().as_str() {
        "yarn-rest" | "yarn" | "rest" => Ok(JobSubmitMode::YarnRest),
        "spark-submit" | "spark" => Ok(JobSubmitMode::SparkSubmit),
        other => Err(format!("unknown JOB_SUBMIT_MODE: {other}")),
    }
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(|s| s.to_string()).collect()
}

#[cfg(test)]
impl Config {
    /// Baseline configuration for tests, pointing at unroutable defaults.
    pub fn for_tests() -> Config {
        Config {
            port: 0,
            node_env: "test".to_string(),
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            log_max_files: "0".to_string(),
            cors_origins: vec!["*".to_string()],
            hdfs_client_mode: StoreClientMode::WebHdfs,
            hdfs_api_url: "http://127.0.0.1:9/webhdfs/v1".to_string(),
            hdfs_user: "root".to_string(),
            hdfs_default_dir: "/user/hashiramart".to_string(),
            hdfs_cli_command: vec!["hdfs".to_string()],
            job_submit_mode: JobSubmitMode::YarnRest,
            yarn_api_url: "http://127.0.0.1:9/ws/v1/cluster/apps".to_string(),
            job_id_prefix: "hashiramart".to_string(),
            spark_submit_bin: "/opt/spark/bin/spark-submit".to_string(),
            spark_script_recommender: "/app/process_data.py".to_string(),
            spark_script_forecasting: "/app/process_data.py".to_string(),
            pipeline_command: vec!["dvc".to_string(), "repro".to_string()],
            pipeline_cwd: std::env::temp_dir(),
            staging_dir: std::env::temp_dir().join(format!("gateway-test-{}", uuid::Uuid::new_v4())),
            remote_timeout_secs: 5,
            max_upload_bytes: 1024 * 1024,
        }
    }
}
