//! Mapping of `aws ... --output json` documents into raw resource records.
//!
//! Every parser accepts empty output (some list commands print nothing when
//! there is nothing to list) and missing optional fields.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use stackmap_core::{RawResource, SourceKind};

fn document<T: DeserializeOwned + Default>(json: &str) -> Result<T, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(json)
}

/// Last path segment of a URL or ARN.
fn last_segment(s: &str) -> &str {
    s.rsplit('/').next().unwrap_or(s)
}

fn set(raw: &mut RawResource, key: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        raw.attributes.insert(key.to_string(), value);
    }
}

// --- EC2 ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstances {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    instance_id: Option<String>,
    instance_type: Option<String>,
    vpc_id: Option<String>,
    state: Option<InstanceState>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceState {
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    #[serde(default)]
    value: String,
}

pub fn ec2_instances(json: &str) -> Result<Vec<RawResource>, serde_json::Error> {
    let doc: DescribeInstances = document(json)?;
    Ok(doc
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .map(|i| {
            let mut raw = RawResource {
                kind: SourceKind::ComputeInstance,
                id: i.instance_id,
                name: i.tags.into_iter().find(|t| t.key == "Name").map(|t| t.value),
                state: i.state.and_then(|s| s.name),
                attributes: Default::default(),
            };
            set(&mut raw, "instance_type", i.instance_type);
            set(&mut raw, "vpc_id", i.vpc_id);
            raw
        })
        .collect())
}

// --- RDS ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct DescribeDbInstances {
    #[serde(default, rename = "DBInstances")]
    db_instances: Vec<DbInstance>,
}

#[derive(Deserialize)]
struct DbInstance {
    #[serde(rename = "DBInstanceIdentifier")]
    identifier: Option<String>,
    #[serde(rename = "Engine")]
    engine: Option<String>,
    #[serde(rename = "DBInstanceStatus")]
    status: Option<String>,
    #[serde(rename = "DBInstanceClass")]
    class: Option<String>,
}

pub fn rds_instances(json: &str) -> Result<Vec<RawResource>, serde_json::Error> {
    let doc: DescribeDbInstances = document(json)?;
    Ok(doc
        .db_instances
        .into_iter()
        .map(|db| {
            let mut raw = RawResource {
                kind: SourceKind::ManagedDatabase,
                id: db.identifier.clone(),
                name: db.identifier,
                state: db.status,
                attributes: Default::default(),
            };
            set(&mut raw, "engine", db.engine);
            set(&mut raw, "instance_class", db.class);
            raw
        })
        .collect())
}

// --- Lambda ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct ListFunctions {
    #[serde(default)]
    functions: Vec<Function>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Function {
    function_name: Option<String>,
    runtime: Option<String>,
    handler: Option<String>,
    state: Option<String>,
}

pub fn lambda_functions(json: &str) -> Result<Vec<RawResource>, serde_json::Error> {
    let doc: ListFunctions = document(json)?;
    Ok(doc
        .functions
        .into_iter()
        .map(|f| {
            let mut raw = RawResource {
                kind: SourceKind::Function,
                id: f.function_name.clone(),
                name: f.function_name,
                state: f.state,
                attributes: Default::default(),
            };
            set(&mut raw, "runtime", f.runtime);
            set(&mut raw, "handler", f.handler);
            raw
        })
        .collect())
}

// --- S3 ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct ListBuckets {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Bucket {
    name: Option<String>,
}

pub fn s3_buckets(json: &str) -> Result<Vec<RawResource>, serde_json::Error> {
    let doc: ListBuckets = document(json)?;
    Ok(doc
        .buckets
        .into_iter()
        .map(|b| RawResource {
            kind: SourceKind::ObjectStore,
            id: b.name.clone(),
            name: b.name,
            state: None,
            attributes: Default::default(),
        })
        .collect())
}

// --- ELBv2 ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct DescribeLoadBalancers {
    #[serde(default)]
    load_balancers: Vec<LoadBalancer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancer {
    load_balancer_name: Option<String>,
    #[serde(rename = "Type")]
    lb_type: Option<String>,
    scheme: Option<String>,
    state: Option<LoadBalancerState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancerState {
    code: Option<String>,
}

pub fn load_balancers(json: &str) -> Result<Vec<RawResource>, serde_json::Error> {
    let doc: DescribeLoadBalancers = document(json)?;
    Ok(doc
        .load_balancers
        .into_iter()
        .map(|lb| {
            let mut raw = RawResource {
                kind: SourceKind::LoadBalancer,
                id: lb.load_balancer_name.clone(),
                name: lb.load_balancer_name,
                state: lb.state.and_then(|s| s.code),
                attributes: Default::default(),
            };
            set(&mut raw, "type", lb.lb_type);
            set(&mut raw, "scheme", lb.scheme);
            raw
        })
        .collect())
}

// --- SQS ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct ListQueues {
    #[serde(default)]
    queue_urls: Vec<String>,
}

pub fn sqs_queues(json: &str) -> Result<Vec<RawResource>, serde_json::Error> {
    let doc: ListQueues = document(json)?;
    Ok(doc
        .queue_urls
        .into_iter()
        .map(|url| {
            let name = last_segment(&url).to_string();
            RawResource::new(SourceKind::MessageQueue, name.clone())
                .with_name(name)
                .with_attribute("url", url)
        })
        .collect())
}

// --- ElastiCache ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct DescribeCacheClusters {
    #[serde(default)]
    cache_clusters: Vec<CacheCluster>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CacheCluster {
    cache_cluster_id: Option<String>,
    engine: Option<String>,
    cache_cluster_status: Option<String>,
    cache_node_type: Option<String>,
}

pub fn cache_clusters(json: &str) -> Result<Vec<RawResource>, serde_json::Error> {
    let doc: DescribeCacheClusters = document(json)?;
    Ok(doc
        .cache_clusters
        .into_iter()
        .map(|c| {
            let mut raw = RawResource {
                kind: SourceKind::CacheCluster,
                id: c.cache_cluster_id.clone(),
                name: c.cache_cluster_id,
                state: c.cache_cluster_status,
                attributes: Default::default(),
            };
            set(&mut raw, "engine", c.engine);
            set(&mut raw, "node_type", c.cache_node_type);
            raw
        })
        .collect())
}

// --- API Gateway ---

#[derive(Deserialize, Default)]
struct GetRestApis {
    #[serde(default)]
    items: Vec<RestApi>,
}

#[derive(Deserialize)]
struct RestApi {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
}

pub fn rest_apis(json: &str) -> Result<Vec<RawResource>, serde_json::Error> {
    let doc: GetRestApis = document(json)?;
    Ok(doc
        .items
        .into_iter()
        .map(|api| {
            let mut raw = RawResource {
                kind: SourceKind::ApiFrontDoor,
                id: api.id,
                name: api.name,
                state: None,
                attributes: Default::default(),
            };
            set(&mut raw, "description", api.description);
            raw
        })
        .collect())
}

// --- ECS ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListClusters {
    #[serde(default)]
    cluster_arns: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListServices {
    #[serde(default)]
    service_arns: Vec<String>,
}

pub fn ecs_cluster_names(json: &str) -> Result<Vec<String>, serde_json::Error> {
    let doc: ListClusters = document(json)?;
    Ok(doc
        .cluster_arns
        .iter()
        .map(|arn| last_segment(arn).to_string())
        .collect())
}

/// Service names repeat across clusters, so the id carries the cluster.
pub fn ecs_services(json: &str, cluster: &str) -> Result<Vec<RawResource>, serde_json::Error> {
    let doc: ListServices = document(json)?;
    Ok(doc
        .service_arns
        .iter()
        .map(|arn| {
            let service = last_segment(arn);
            RawResource::new(SourceKind::ContainerService, format!("{}/{}", cluster, service))
                .with_name(service)
                .with_attribute("cluster", cluster)
        })
        .collect())
}
