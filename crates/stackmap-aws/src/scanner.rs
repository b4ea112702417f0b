use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use stackmap_core::{RawResource, ScanOrigin, ScanSettings, SourceKind};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::parse;
use crate::runner::{CommandRunner, ProcessRunner};
use crate::AwsError;

const DEFAULT_REGION: &str = "us-east-1";

/// Everything one scan found, ordered by resource kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub region: String,
    /// ARN of the caller the scan ran as
    pub identity: String,
    pub resources: Vec<RawResource>,
    /// Kinds that could not be listed, with the reason
    pub failures: Vec<(SourceKind, String)>,
}

impl ScanReport {
    pub fn origin(&self) -> ScanOrigin {
        ScanOrigin::new("AWS", Some(self.region.clone()))
    }
}

#[derive(Clone)]
pub struct AwsScanner {
    runner: Arc<dyn CommandRunner>,
    settings: ScanSettings,
}

impl AwsScanner {
    pub fn new(settings: ScanSettings) -> Self {
        let timeout = Duration::from_secs(settings.command_timeout_secs);
        Self::with_runner(settings, Arc::new(ProcessRunner::new(timeout)))
    }

    pub fn with_runner(settings: ScanSettings, runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner, settings }
    }

    fn args(&self, parts: &[&str], region: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
        if let Some(region) = region {
            args.push("--region".to_string());
            args.push(region.to_string());
        }
        if let Some(profile) = &self.settings.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args
    }

    /// Run an `aws` subcommand and return its stdout.
    async fn aws(&self, parts: &[&str], region: Option<&str>) -> Result<String, AwsError> {
        let args = self.args(parts, region);
        let command = format!("aws {}", parts.join(" "));
        debug!(%command, "running");
        let out = self.runner.run(&self.settings.aws_binary, &args).await?;
        if out.success {
            Ok(out.stdout)
        } else {
            Err(AwsError::CommandFailed {
                command,
                stderr: out.stderr.trim().to_string(),
            })
        }
    }

    async fn aws_json<T>(
        &self,
        parts: &[&str],
        region: &str,
        parse: impl FnOnce(&str) -> Result<T, serde_json::Error>,
    ) -> Result<T, AwsError> {
        let mut full = parts.to_vec();
        full.extend(["--output", "json"]);
        let stdout = self.aws(&full, Some(region)).await?;
        parse(&stdout).map_err(|e| AwsError::InvalidJson {
            command: format!("aws {}", parts.join(" ")),
            message: e.to_string(),
        })
    }

    pub async fn check_installed(&self) -> bool {
        match self.runner.run(&self.settings.aws_binary, &["--version".to_string()]).await {
            Ok(out) => out.success,
            Err(_) => false,
        }
    }

    /// ARN of the authenticated caller.
    pub async fn caller_identity(&self) -> Result<String, AwsError> {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Identity {
            arn: Option<String>,
        }

        let stdout = self
            .aws(&["sts", "get-caller-identity", "--output", "json"], None)
            .await
            .map_err(|e| match e {
                AwsError::CommandFailed { stderr, .. } => AwsError::NotAuthenticated { message: stderr },
                other => other,
            })?;
        let identity: Identity =
            serde_json::from_str(&stdout).map_err(|e| AwsError::InvalidJson {
                command: "aws sts get-caller-identity".to_string(),
                message: e.to_string(),
            })?;
        Ok(identity.arn.unwrap_or_else(|| "unknown".to_string()))
    }

    /// Configured region, else the CLI's default, else us-east-1.
    pub async fn resolve_region(&self) -> String {
        if let Some(region) = self.settings.region.as_deref().filter(|r| !r.is_empty()) {
            return region.to_string();
        }
        match self.aws(&["configure", "get", "region"], None).await {
            Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
            _ => DEFAULT_REGION.to_string(),
        }
    }

    /// List one resource kind.
    pub async fn discover(&self, kind: SourceKind, region: &str) -> Result<Vec<RawResource>, AwsError> {
        match kind {
            SourceKind::ComputeInstance => {
                self.aws_json(&["ec2", "describe-instances"], region, parse::ec2_instances)
                    .await
            }
            SourceKind::ManagedDatabase => {
                self.aws_json(&["rds", "describe-db-instances"], region, parse::rds_instances)
                    .await
            }
            SourceKind::Function => {
                self.aws_json(&["lambda", "list-functions"], region, parse::lambda_functions)
                    .await
            }
            SourceKind::ObjectStore => {
                self.aws_json(&["s3api", "list-buckets"], region, parse::s3_buckets)
                    .await
            }
            SourceKind::LoadBalancer => {
                self.aws_json(
                    &["elbv2", "describe-load-balancers"],
                    region,
                    parse::load_balancers,
                )
                .await
            }
            SourceKind::MessageQueue => {
                self.aws_json(&["sqs", "list-queues"], region, parse::sqs_queues)
                    .await
            }
            SourceKind::CacheCluster => {
                self.aws_json(
                    &["elasticache", "describe-cache-clusters"],
                    region,
                    parse::cache_clusters,
                )
                .await
            }
            SourceKind::ApiFrontDoor => {
                self.aws_json(&["apigateway", "get-rest-apis"], region, parse::rest_apis)
                    .await
            }
            SourceKind::ContainerService => self.discover_ecs(region).await,
        }
    }

    async fn discover_ecs(&self, region: &str) -> Result<Vec<RawResource>, AwsError> {
        let clusters = self
            .aws_json(&["ecs", "list-clusters"], region, parse::ecs_cluster_names)
            .await?;
        let mut services = Vec::new();
        for cluster in clusters {
            let found = self
                .aws_json(
                    &["ecs", "list-services", "--cluster", &cluster],
                    region,
                    |json| parse::ecs_services(json, &cluster),
                )
                .await?;
            services.extend(found);
        }
        Ok(services)
    }

    /// Check the CLI and credentials, then list every resource kind
    /// concurrently. A kind that fails is recorded in `failures`; the rest of
    /// the scan continues. Returns only once every kind has finished.
    pub async fn scan(&self) -> Result<ScanReport, AwsError> {
        if !self.check_installed().await {
            return Err(AwsError::NotInstalled {
                program: self.settings.aws_binary.clone(),
            });
        }
        let identity = self.caller_identity().await?;
        let region = self.resolve_region().await;
        info!(%identity, %region, "scanning AWS inventory");

        let mut tasks = JoinSet::new();
        for kind in SourceKind::ALL {
            let scanner = self.clone();
            let region = region.clone();
            tasks.spawn(async move { (kind, scanner.discover(kind, &region).await) });
        }

        let mut by_kind: BTreeMap<SourceKind, Result<Vec<RawResource>, AwsError>> =
            BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, result)) => {
                    by_kind.insert(kind, result);
                }
                Err(e) => warn!("discovery task failed: {}", e),
            }
        }

        let mut report = ScanReport {
            region,
            identity,
            ..Default::default()
        };
        for kind in SourceKind::ALL {
            match by_kind.remove(&kind) {
                Some(Ok(found)) => {
                    debug!(%kind, count = found.len(), "discovered");
                    report.resources.extend(found);
                }
                Some(Err(e)) => {
                    warn!(%kind, "discovery failed: {}", e);
                    report.failures.push((kind, e.to_string()));
                }
                None => report
                    .failures
                    .push((kind, "discovery task did not complete".to_string())),
            }
        }

        info!(
            resources = report.resources.len(),
            failures = report.failures.len(),
            "AWS scan complete"
        );
        Ok(report)
    }
}
