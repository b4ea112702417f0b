//! Scanner tests against a scripted stand-in for the `aws` executable.

use async_trait::async_trait;
use stackmap_aws::{AwsError, AwsScanner, CommandOutput, CommandRunner};
use stackmap_core::{build_design, ConnectionType, ScanSettings, SourceKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Answers by command prefix (the args before `--output`/`--region`).
#[derive(Default)]
struct ScriptedAws {
    responses: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedAws {
    fn ok(mut self, command: &str, stdout: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            CommandOutput {
                success: true,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
        self
    }

    fn fail(mut self, command: &str, stderr: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    fn logged_in() -> Self {
        Self::default()
            .ok("--version", "aws-cli/2.15.0")
            .ok(
                "sts get-caller-identity",
                r#"{"Arn": "arn:aws:iam::123456789012:user/dev"}"#,
            )
    }
}

#[async_trait]
impl CommandRunner for ScriptedAws {
    async fn run(&self, _program: &str, args: &[String]) -> Result<CommandOutput, AwsError> {
        self.calls.lock().unwrap().push(args.to_vec());
        let key: Vec<&str> = args
            .iter()
            .map(String::as_str)
            .take_while(|a| *a != "--output" && *a != "--region" && *a != "--profile")
            .collect();
        Ok(self
            .responses
            .get(&key.join(" "))
            .cloned()
            .unwrap_or(CommandOutput {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            }))
    }
}

fn settings(region: Option<&str>) -> ScanSettings {
    ScanSettings {
        region: region.map(str::to_string),
        ..Default::default()
    }
}

#[tokio::test]
async fn scan_collects_every_kind_in_kind_order() {
    let aws = ScriptedAws::logged_in()
        .ok(
            "sqs list-queues",
            r#"{"QueueUrls": ["https://sqs.eu-west-1.amazonaws.com/123456789012/jobs"]}"#,
        )
        .ok(
            "ec2 describe-instances",
            r#"{"Reservations": [{"Instances": [{"InstanceId": "i-1", "State": {"Name": "running"}}]}]}"#,
        )
        .ok(
            "elbv2 describe-load-balancers",
            r#"{"LoadBalancers": [{"LoadBalancerName": "edge", "Type": "application", "State": {"Code": "active"}}]}"#,
        )
        .ok(
            "ecs list-clusters",
            r#"{"clusterArns": ["arn:aws:ecs:eu-west-1:123456789012:cluster/prod"]}"#,
        )
        .ok(
            "ecs list-services --cluster prod",
            r#"{"serviceArns": ["arn:aws:ecs:eu-west-1:123456789012:service/prod/checkout"]}"#,
        );
    let scanner = AwsScanner::with_runner(settings(Some("eu-west-1")), Arc::new(aws));

    let report = scanner.scan().await.unwrap();
    assert_eq!(report.region, "eu-west-1");
    assert_eq!(report.identity, "arn:aws:iam::123456789012:user/dev");
    assert!(report.failures.is_empty());

    let kinds: Vec<SourceKind> = report.resources.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SourceKind::ComputeInstance,
            SourceKind::LoadBalancer,
            SourceKind::MessageQueue,
            SourceKind::ContainerService,
        ]
    );

    let design = build_design(&report.resources, &report.origin()).design;
    assert_eq!(design.title, "AWS Infrastructure - eu-west-1");
    let lb_edges = design
        .connections
        .iter()
        .filter(|c| c.source_identifier == "load_balancer:edge")
        .count();
    assert_eq!(lb_edges, 2);
    assert!(design
        .connections
        .iter()
        .any(|c| c.target_identifier == "message_queue:jobs"
            && c.connection_type == ConnectionType::Async));
}

#[tokio::test]
async fn failing_kind_is_recorded_and_scan_continues() {
    let aws = ScriptedAws::logged_in()
        .fail(
            "rds describe-db-instances",
            "An error occurred (AccessDenied) when calling the DescribeDBInstances operation",
        )
        .ok("s3api list-buckets", r#"{"Buckets": [{"Name": "assets"}]}"#)
        .ok("lambda list-functions", "this is not json");
    let scanner = AwsScanner::with_runner(settings(Some("us-east-1")), Arc::new(aws));

    let report = scanner.scan().await.unwrap();
    assert_eq!(report.resources.len(), 1);
    assert_eq!(report.resources[0].kind, SourceKind::ObjectStore);

    let failed: Vec<SourceKind> = report.failures.iter().map(|(k, _)| *k).collect();
    assert_eq!(failed, vec![SourceKind::ManagedDatabase, SourceKind::Function]);
    assert!(report.failures[0].1.contains("AccessDenied"));
    assert!(report.failures[1].1.contains("Invalid JSON"));
}

#[tokio::test]
async fn unauthenticated_scan_is_an_error() {
    let aws = ScriptedAws::default()
        .ok("--version", "aws-cli/2.15.0")
        .fail("sts get-caller-identity", "Unable to locate credentials");
    let scanner = AwsScanner::with_runner(settings(None), Arc::new(aws));

    let err = scanner.scan().await.unwrap_err();
    assert!(matches!(err, AwsError::NotAuthenticated { ref message } if message.contains("credentials")));
}

#[tokio::test]
async fn missing_cli_is_not_installed() {
    let aws = ScriptedAws::default().fail("--version", "");
    let scanner = AwsScanner::with_runner(settings(None), Arc::new(aws));
    assert!(matches!(
        scanner.scan().await,
        Err(AwsError::NotInstalled { .. })
    ));
}

#[tokio::test]
async fn region_falls_back_to_cli_config_then_default() {
    let configured = ScriptedAws::default().ok("configure get region", "ap-southeast-2\n");
    let scanner = AwsScanner::with_runner(settings(None), Arc::new(configured));
    assert_eq!(scanner.resolve_region().await, "ap-southeast-2");

    let scanner = AwsScanner::with_runner(settings(None), Arc::new(ScriptedAws::default()));
    assert_eq!(scanner.resolve_region().await, "us-east-1");
}

#[tokio::test]
async fn region_and_profile_are_passed_to_every_listing() {
    let aws = Arc::new(ScriptedAws::logged_in());
    let mut s = settings(Some("eu-central-1"));
    s.profile = Some("audit".to_string());
    let scanner = AwsScanner::with_runner(s, aws.clone());
    scanner.scan().await.unwrap();

    let calls = aws.calls.lock().unwrap();
    let listings: Vec<&Vec<String>> = calls
        .iter()
        .filter(|args| args.iter().any(|a| a == "--output"))
        .filter(|args| args[0] != "sts")
        .collect();
    // Nine kinds; ECS lists clusters only since none exist.
    assert_eq!(listings.len(), 9);
    for args in listings {
        let joined = args.join(" ");
        assert!(joined.contains("--region eu-central-1"), "{joined}");
        assert!(joined.contains("--profile audit"), "{joined}");
    }
}
