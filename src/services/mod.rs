pub mod artifact_manager;
pub mod gateway;
pub mod hdfs;
pub mod job_coordinator;
pub mod launcher;
pub mod staging;
pub mod traits;
pub mod yarn;

#[cfg(test)]
pub mod test_support;
