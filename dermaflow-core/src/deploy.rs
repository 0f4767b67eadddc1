//! Deployment hand-off for the promoted model.
//!
//! The pipeline's responsibility ends at producing the winning
//! (name, uri, version) triple; pushing it to a serving endpoint belongs to
//! the deployment collaborator. The helpers here build the deployment
//! coordinates; the actual cloud call lives behind the [`Deployer`] trait.

use crate::config::DeployConfig;
use crate::error::PipelineError;
use crate::tracking::ExperimentTracker;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything the deployment collaborator needs for one endpoint rollout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub model_name: String,
    pub model_uri: String,
    pub experiment_name: String,
    pub model_version: u32,
    pub endpoint_name: String,
    pub instance_type: String,
}

/// ECR image URL for the serving container.
pub fn build_image_url(aws_id: &str, aws_region: &str, repository: &str, tag: &str) -> String {
    format!("{aws_id}.dkr.ecr.{aws_region}.amazonaws.com/{repository}:{tag}")
}

/// IAM execution-role ARN for the endpoint.
pub fn build_execution_role_arn(aws_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{aws_id}:role/{role_name}")
}

/// Deployment collaborator contract.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, request: &DeployRequest) -> Result<bool, PipelineError>;
}

/// SageMaker-shaped deployer.
///
/// Resolves the registered version's artifact source from the tracking
/// backend and assembles the endpoint coordinates. The cloud call itself is
/// delegated to the surrounding execution environment.
pub struct SageMakerDeployer {
    config: DeployConfig,
    tracker: Arc<dyn ExperimentTracker>,
}

impl SageMakerDeployer {
    pub fn new(config: DeployConfig, tracker: Arc<dyn ExperimentTracker>) -> Self {
        Self { config, tracker }
    }
}

#[async_trait]
impl Deployer for SageMakerDeployer {
    async fn deploy(&self, request: &DeployRequest) -> Result<bool, PipelineError> {
        if self.config.aws_id.is_empty() || self.config.aws_region.is_empty() {
            return Err(PipelineError::deployment(
                "aws_id and aws_region must be configured",
            ));
        }

        let entry = self
            .tracker
            .get_model_version(&request.model_name, request.model_version)?;

        let image_url = build_image_url(
            &self.config.aws_id,
            &self.config.aws_region,
            &self.config.ecr_repository,
            &self.config.image_tag,
        );
        let execution_role_arn =
            build_execution_role_arn(&self.config.aws_id, &self.config.role_name);

        tracing::info!(
            endpoint = %request.endpoint_name,
            model = %request.model_name,
            version = request.model_version,
            source = %entry.source_uri,
            %image_url,
            %execution_role_arn,
            instance_type = %request.instance_type,
            "deploying model endpoint"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::FileTrackingStore;

    #[test]
    fn image_url_matches_ecr_format() {
        assert_eq!(
            build_image_url("123456789012", "eu-central-1", "serving", "v1"),
            "123456789012.dkr.ecr.eu-central-1.amazonaws.com/serving:v1"
        );
    }

    #[test]
    fn role_arn_matches_iam_format() {
        assert_eq!(
            build_execution_role_arn("123456789012", "sagemaker-exec"),
            "arn:aws:iam::123456789012:role/sagemaker-exec"
        );
    }

    #[tokio::test]
    async fn deploy_requires_a_registered_version() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(FileTrackingStore::open(dir.path().join("t.json")).unwrap());
        let deployer = SageMakerDeployer::new(
            DeployConfig {
                aws_id: "123456789012".into(),
                aws_region: "eu-central-1".into(),
                ..DeployConfig::default()
            },
            tracker.clone(),
        );
        let request = DeployRequest {
            model_name: "Basic".into(),
            model_uri: "runs:/abc/Basic".into(),
            experiment_name: "exp".into(),
            model_version: 1,
            endpoint_name: "skin-endpoint".into(),
            instance_type: "ml.t2.medium".into(),
        };

        assert!(deployer.deploy(&request).await.is_err());

        tracker.register_model("runs:/abc/Basic", "Basic").unwrap();
        assert!(deployer.deploy(&request).await.unwrap());
    }
}
