use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use stackmap_aws::{AwsScanner, ScanReport};
use stackmap_core::{
    build_design, diff_designs, rules::rules_text, sanitize, validate_name, ArchitectureDesign,
    Assembly, CoreError, DesignStore, RawResource, ScanOrigin,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetDesignRequest {
    /// Name of the design to retrieve
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ScanAwsRequest {
    /// Name to store the resulting design under ([A-Za-z0-9_-])
    name: String,
    /// Region to scan. Defaults to the stored setting, then the CLI's configured region.
    region: Option<String>,
    /// Named AWS credentials profile
    profile: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct InferDesignRequest {
    /// Name to store the resulting design under
    name: String,
    /// Provider label used in the title (default "AWS")
    provider: Option<String>,
    /// Region label used in the title and notes
    region: Option<String>,
    /// Raw inventory records, e.g. {"kind": "compute_instance", "id": "i-1", "state": "running"}
    resources: Vec<RawResource>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetDesignRequest {
    /// Name of the design
    name: String,
    /// Full design JSON: {title, summary, components: [{identifier, display_name, category, description}], connections: [{source_identifier, target_identifier, connection_type, description}], notes}
    data: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DeleteDesignRequest {
    /// Name of the design to delete
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetChangesRequest {
    /// Name of the design
    name: String,
}

// --- Tool bodies ---

fn describe_assembly(name: &str, assembly: &Assembly) -> String {
    let design = &assembly.design;
    let mut lines = vec![format!(
        "Saved design '{}': {} components, {} connections.",
        name,
        design.components.len(),
        design.connections.len()
    )];
    lines.push(format!("Title: {}", design.title));
    if !design.summary.is_empty() {
        lines.push(format!("Summary: {}", design.summary));
    }
    if !design.notes.is_empty() {
        lines.push("Notes:".to_string());
        lines.extend(design.notes.iter().map(|n| format!("  - {}", n)));
    }
    if !assembly.warnings.is_empty() {
        lines.push(format!("Warnings ({}):", assembly.warnings.len()));
        lines.extend(assembly.warnings.iter().map(|w| format!("  - {}", w)));
    }
    lines.join("\n")
}

fn save_assembly(store: &DesignStore, name: &str, assembly: &Assembly) -> Result<String, CoreError> {
    store.write(name, &assembly.design)?;
    info!(
        name,
        components = assembly.design.components.len(),
        warnings = assembly.warnings.len(),
        "design saved"
    );
    Ok(describe_assembly(name, assembly))
}

fn infer_and_save(store: &DesignStore, req: InferDesignRequest) -> Result<String, CoreError> {
    validate_name(&req.name)?;
    let origin = ScanOrigin::new(req.provider.unwrap_or_else(|| "AWS".to_string()), req.region);
    let assembly = build_design(&req.resources, &origin);
    save_assembly(store, &req.name, &assembly)
}

fn scan_text(name: &str, report: &ScanReport, summary: String) -> String {
    let mut text = format!(
        "Scanned {} as {}; {} resource records.\n{}",
        report.region,
        report.identity,
        report.resources.len(),
        summary
    );
    if !report.failures.is_empty() {
        text.push_str(&format!(
            "\nSkipped resource kinds ({}), design '{}' may be incomplete:",
            report.failures.len(),
            name
        ));
        for (kind, reason) in &report.failures {
            text.push_str(&format!("\n  - {}: {}", kind.label(), reason));
        }
    }
    text
}

/// Drafted designs are external input: parse, repair, store.
fn import_design(store: &DesignStore, name: &str, data: &str) -> Result<String, String> {
    let design: ArchitectureDesign =
        serde_json::from_str(data).map_err(|e| format!("Invalid design JSON: {}", e))?;
    let assembly = sanitize(design);
    for warning in &assembly.warnings {
        warn!(name, "{}", warning);
    }
    save_assembly(store, name, &assembly).map_err(|e| e.to_string())
}

/// Diff against the last baseline, then move the baseline forward.
fn changes_since_baseline(store: &DesignStore, name: &str) -> Result<String, String> {
    let current = store
        .read(name)
        .map_err(|e| format!("Failed to read design '{}': {}", name, e))?;
    let Some(baseline) = store.read_baseline(name) else {
        return Err(
            "No baseline found. Call get_design first to establish a reference point.".to_string(),
        );
    };
    let diff = diff_designs(&baseline, &current);
    if let Err(e) = store.save_baseline(name, &current) {
        warn!(name, "failed to update baseline: {}", e);
    }
    Ok(diff.to_string())
}

fn text_result(result: Result<String, String>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => CallToolResult::error(vec![Content::text(e)]),
    }
}

// --- Server ---

#[derive(Clone)]
pub struct StackmapServer {
    store: DesignStore,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl StackmapServer {
    pub fn new(store: DesignStore) -> Self {
        Self {
            store,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List all saved architecture designs")]
    fn list_designs(&self) -> Result<CallToolResult, McpError> {
        let result = self.store.list().map(|names| {
            if names.is_empty() {
                "No designs found. Use scan_aws, infer_design or set_design to create one."
                    .to_string()
            } else {
                names.join("\n")
            }
        });
        Ok(text_result(result.map_err(|e| e.to_string())))
    }

    #[tool(
        description = "Get the full JSON of a design: {title, summary, components: [{identifier, display_name, category, description}], connections: [{source_identifier, target_identifier, connection_type, description}], notes}. Also records a baseline for get_changes."
    )]
    fn get_design(
        &self,
        Parameters(req): Parameters<GetDesignRequest>,
    ) -> Result<CallToolResult, McpError> {
        let design = match self.store.read(&req.name) {
            Ok(d) => d,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to read design '{}': {}",
                    req.name, e
                ))]));
            }
        };
        if let Err(e) = self.store.save_baseline(&req.name, &design) {
            warn!(name = %req.name, "failed to save baseline: {}", e);
        }
        let json = serde_json::to_string_pretty(&design)
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Scan the live AWS account with the local aws CLI (EC2, RDS, Lambda, S3, ELBv2, SQS, ElastiCache, API Gateway, ECS), infer connections between the discovered resources and save the result as a design. Kinds the caller cannot list are reported and skipped."
    )]
    async fn scan_aws(
        &self,
        Parameters(req): Parameters<ScanAwsRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(e) = validate_name(&req.name) {
            return Ok(CallToolResult::error(vec![Content::text(e.to_string())]));
        }
        let settings = self
            .store
            .read_settings()
            .with_overrides(req.region, req.profile);
        let report = match AwsScanner::new(settings).scan().await {
            Ok(r) => r,
            Err(e) => {
                error!("AWS scan failed: {}", e);
                return Ok(CallToolResult::error(vec![Content::text(e.to_string())]));
            }
        };
        let assembly = build_design(&report.resources, &report.origin());
        let result = save_assembly(&self.store, &req.name, &assembly)
            .map(|summary| scan_text(&req.name, &report, summary))
            .map_err(|e| e.to_string());
        Ok(text_result(result))
    }

    #[tool(
        description = "Build a design from raw inventory records without touching any cloud account. Each record is {kind, id, name?, state?, attributes?}; kind is one of compute_instance, managed_database, function, object_store, load_balancer, message_queue, cache_cluster, api_front_door, container_service. Inactive records are left out. Connections are inferred with the rules from get_rules."
    )]
    fn infer_design(
        &self,
        Parameters(req): Parameters<InferDesignRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(
            infer_and_save(&self.store, req).map_err(|e| e.to_string()),
        ))
    }

    #[tool(
        description = "Create or overwrite a design from complete JSON, e.g. one drafted from a free-text description. Duplicate components, self-loops, repeated connections and connections to unknown components are dropped and reported as warnings. Category labels such as 'rds', 'lambda' or 's3' are mapped to their categories; unknown labels become 'external'."
    )]
    fn set_design(
        &self,
        Parameters(req): Parameters<SetDesignRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(import_design(&self.store, &req.name, &req.data)))
    }

    #[tool(description = "Delete a design and its baseline")]
    fn delete_design(
        &self,
        Parameters(req): Parameters<DeleteDesignRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .store
            .delete(&req.name)
            .map(|_| format!("Deleted design '{}'", req.name))
            .map_err(|e| e.to_string());
        Ok(text_result(result))
    }

    #[tool(
        description = "Show what changed in a design since the last get_design or get_changes call: components added, removed or modified, connections added or removed, and note changes."
    )]
    fn get_changes(
        &self,
        Parameters(req): Parameters<GetChangesRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(changes_since_baseline(&self.store, &req.name)))
    }

    #[tool(description = "Get the connection inference rules, in the order they are applied")]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(rules_text())]))
    }
}

const INSTRUCTIONS: &str = r#"stackmap builds architecture designs (components plus typed connections) from cloud inventories. Designs are stored as JSON under ~/.stackmap (or $STACKMAP_HOME).

## Workflows
- **Live account**: call scan_aws with a design name. The aws CLI must be installed and authenticated.
- **Known inventory**: call infer_design with raw records you already have.
- **From a description**: draft the design JSON yourself and call set_design. Use identifiers of the form "<kind>:<id>" and only the categories service, database, function, storage, load_balancer, queue, cache, api, external.
- Call get_design before editing and get_changes afterwards to review what moved.

## Inference
Connections come only from the rule table (see get_rules). When more than one database exists, service-to-database connections are left out and a note asks for manual review. Read the notes of every design."#;

#[tool_handler]
impl ServerHandler for StackmapServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!("{}\n\n## Rules\n{}", INSTRUCTIONS, rules_text());
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let store = DesignStore::default_location();
    info!(root = %store.root().display(), "starting stackmap MCP server");

    let service = StackmapServer::new(store)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| error!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}
