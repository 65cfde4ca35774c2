// Splunk adapter using the management REST API
use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::api::middleware::AppError;
use crate::models::{FieldDataType, FilterCondition, LogicalOperator, QueryAst, QueryOperator};
use crate::services::datasource::adapter::{
    CollectionDiscovery, DatasourceAdapter, DiscoveredCollection, DiscoveredField, FieldDiscovery,
    QueryParams,
};

const MAX_POLL_ATTEMPTS: u32 = 30;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct SplunkAdapter;

/// Per-call HTTP client built from the integration's configuration blob.
/// Splunk Cloud hosts serve the management API behind a raw path on 443.
struct SplunkClient {
    base_url: String,
    client: Client,
}

impl SplunkClient {
    fn from_config(config: &Value) -> Result<Self, String> {
        let host = config
            .get("host")
            .and_then(Value::as_str)
            .ok_or("Missing `host` in configuration")?;
        let port = config
            .get("management-port")
            .and_then(Value::as_str)
            .unwrap_or("8089");
        let api_key = config
            .get("api-key")
            .and_then(Value::as_str)
            .ok_or("Missing `api-key` in configuration")?;

        let parsed = Url::parse(host).map_err(|e| format!("Invalid Splunk host URL: {}", e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err("Splunk host must use http:// or https://".to_string());
        }

        let base_url = if host.contains(".splunkcloud.com") {
            format!("{}/en-US/splunkd/__raw", host)
        } else {
            format!("{}:{}", host, port)
        };

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| format!("Invalid api-key: {}", e))?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            // Dev instances ship self-signed certs
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self { base_url, client })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, String> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {}", path, e))?;

        if !response.status().is_success() {
            return Err(format!(
                "Splunk returned HTTP {} for {}",
                response.status(),
                path
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("Failed to parse response from {}: {}", path, e))
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<Value, String> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .form(form)
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {}", path, e))?;

        if !response.status().is_success() {
            return Err(format!(
                "Splunk returned HTTP {} for {}",
                response.status(),
                path
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("Failed to parse response from {}: {}", path, e))
    }

    /// Submit an async search job and return its sid
    async fn submit_search(
        &self,
        search: &str,
        earliest_time: &str,
        latest_time: &str,
    ) -> Result<String, String> {
        let response = self
            .post_form(
                "/services/search/jobs",
                &[
                    ("search", search),
                    ("output_mode", "json"),
                    ("earliest_time", earliest_time),
                    ("latest_time", latest_time),
                ],
            )
            .await?;

        response["sid"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "Search job response missing sid".to_string())
    }

    /// Poll a search job until it reaches DONE. Returns Ok(false) when the
    /// attempt budget runs out without the job completing.
    async fn wait_for_job(&self, sid: &str) -> Result<bool, String> {
        for attempt in 1..=MAX_POLL_ATTEMPTS {
            tokio::time::sleep(POLL_INTERVAL).await;

            let status = self
                .get_json(
                    &format!("/services/search/jobs/{}", sid),
                    &[("output_mode", "json")],
                )
                .await?;

            let dispatch_state = status["entry"][0]["content"]["dispatchState"]
                .as_str()
                .unwrap_or("");
            tracing::debug!("Search job {} attempt {}: {}", sid, attempt, dispatch_state);

            if dispatch_state == "DONE" {
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn fetch_results(&self, sid: &str, count: usize) -> Result<Vec<Value>, String> {
        let body = self
            .get_json(
                &format!("/services/search/jobs/{}/results", sid),
                &[("output_mode", "json"), ("count", &count.to_string())],
            )
            .await?;

        Ok(body["results"].as_array().cloned().unwrap_or_default())
    }
}

/// Parse a collection name back into its (index, sourcetype) coordinates.
/// Inverse of the `index:{index}, sourcetype:{sourcetype}` names emitted by
/// collection discovery.
pub(crate) fn parse_collection_name(name: &str) -> Result<(String, String), String> {
    let index = name
        .split("index:")
        .nth(1)
        .and_then(|rest| rest.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let sourcetype = name
        .split("sourcetype:")
        .nth(1)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match (index, sourcetype) {
        (Some(index), Some(sourcetype)) => Ok((index.to_string(), sourcetype.to_string())),
        _ => Err(format!("Invalid collection name format: {}", name)),
    }
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_filter(filter: &FilterCondition, field_mappings: &HashMap<String, String>) -> String {
    match filter {
        FilterCondition::Comparison {
            field,
            operator,
            value,
        } => {
            let physical = field_mappings
                .get(field)
                .cloned()
                .unwrap_or_else(|| field.clone());
            let literal = render_literal(value);

            match operator {
                QueryOperator::Eq | QueryOperator::Unknown => {
                    format!("{}=\"{}\"", physical, literal)
                }
                QueryOperator::Contains => format!("{}=*{}*", physical, literal),
                QueryOperator::Gt => format!("{}>{}", physical, literal),
                QueryOperator::Lt => format!("{}<{}", physical, literal),
            }
        }
        FilterCondition::Logical {
            operator,
            conditions,
        } => {
            let rendered: Vec<String> = conditions
                .iter()
                .map(|condition| render_filter(condition, field_mappings))
                .collect();

            // OR groups are parenthesised; AND chains are not
            match operator {
                LogicalOperator::And => rendered.join(" AND "),
                LogicalOperator::Or => format!("({})", rendered.join(" OR ")),
            }
        }
    }
}

/// Render a query AST to SPL. Clause order is fixed: filter, then field
/// projection, then limit.
pub(crate) fn render_spl(ast: &QueryAst, field_mappings: &HashMap<String, String>) -> String {
    let map_field = |logical: &str| -> String {
        field_mappings
            .get(logical)
            .cloned()
            .unwrap_or_else(|| logical.to_string())
    };

    let mut spl = String::from("search");

    if let Some(filter) = &ast.where_clause {
        spl.push(' ');
        spl.push_str(&render_filter(filter, field_mappings));
    }

    if let Some(select) = &ast.select {
        if !select.is_empty() {
            let fields: Vec<String> = select.iter().map(|field| map_field(field)).collect();
            spl.push_str(&format!(" | table {}", fields.join(", ")));
        }
    }

    if let Some(limit) = ast.limit {
        spl.push_str(&format!(" | head {}", limit));
    }

    spl
}

#[async_trait::async_trait]
impl DatasourceAdapter for SplunkAdapter {
    async fn validate_connection(&self, config: &Value) -> bool {
        let client = match SplunkClient::from_config(config) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("Connection validation failed: {}", e);
                return false;
            }
        };

        match client
            .get_json("/services/server/info", &[("output_mode", "json")])
            .await
        {
            Ok(info) => {
                let version = info["entry"][0]["content"]["version"]
                    .as_str()
                    .unwrap_or("unknown");
                tracing::info!("Splunk connection validated, server version {}", version);
                true
            }
            Err(e) => {
                tracing::error!("Connection validation failed: {}", e);
                false
            }
        }
    }

    async fn discover_collections(&self, config: &Value) -> CollectionDiscovery {
        let client = match SplunkClient::from_config(config) {
            Ok(client) => client,
            Err(e) => return CollectionDiscovery::failed(e),
        };

        let indexes_body = match client
            .get_json(
                "/services/data/indexes",
                &[("output_mode", "json"), ("count", "0")],
            )
            .await
        {
            Ok(body) => body,
            Err(e) => return CollectionDiscovery::failed(e),
        };

        let indexes: Vec<(String, Value, Value)> = indexes_body["entry"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        entry["name"].as_str().map(|name| {
                            (
                                name.to_string(),
                                entry["content"]["totalEventCount"].clone(),
                                entry["content"]["currentDBSizeMB"].clone(),
                            )
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        tracing::info!("Found {} indexes", indexes.len());

        let sourcetypes_body = match client
            .get_json(
                "/services/saved/sourcetypes",
                &[("output_mode", "json"), ("count", "0")],
            )
            .await
        {
            Ok(body) => body,
            Err(e) => return CollectionDiscovery::failed(e),
        };

        let sourcetypes: Vec<String> = sourcetypes_body["entry"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        tracing::info!("Found {} sourcetypes", sourcetypes.len());

        // A collection is one index + sourcetype combination
        let mut collections = Vec::new();
        for (index, total_event_count, current_db_size_mb) in &indexes {
            for sourcetype in &sourcetypes {
                collections.push(DiscoveredCollection {
                    name: format!("index:{}, sourcetype:{}", index, sourcetype),
                    metadata: json!({
                        "index": index,
                        "sourcetype": sourcetype,
                        "totalEventCount": total_event_count,
                        "currentDBSizeMB": current_db_size_mb,
                    }),
                });
            }
        }

        tracing::info!("Created {} collections from combinations", collections.len());

        CollectionDiscovery::ok(collections)
    }

    async fn discover_fields(&self, config: &Value, collection_name: &str) -> FieldDiscovery {
        let (index, sourcetype) = match parse_collection_name(collection_name) {
            Ok(coordinates) => coordinates,
            Err(e) => return FieldDiscovery::failed(e),
        };

        let client = match SplunkClient::from_config(config) {
            Ok(client) => client,
            Err(e) => return FieldDiscovery::failed(e),
        };

        let search = format!(
            "search index=\"{}\" sourcetype=\"{}\" | fieldsummary maxvals=0 | table field",
            index, sourcetype
        );

        let sid = match client.submit_search(&search, "-24h", "now").await {
            Ok(sid) => sid,
            Err(e) => return FieldDiscovery::failed(e),
        };
        tracing::info!("Field discovery search job created: {}", sid);

        match client.wait_for_job(&sid).await {
            Ok(true) => {}
            Ok(false) => return FieldDiscovery::failed("Search job timed out"),
            Err(e) => return FieldDiscovery::failed(e),
        }

        let results = match client.fetch_results(&sid, 0).await {
            Ok(results) => results,
            Err(e) => return FieldDiscovery::failed(e),
        };

        let fields: Vec<DiscoveredField> = results
            .iter()
            .filter_map(|row| row["field"].as_str())
            .map(|name| DiscoveredField {
                name: name.to_string(),
                // Splunk's fieldsummary carries no usable type information
                data_type: FieldDataType::String,
                metadata: json!({
                    "discoveredAt": chrono::Utc::now().to_rfc3339(),
                }),
            })
            .collect();

        tracing::info!("Discovered {} fields", fields.len());

        FieldDiscovery::ok(fields)
    }

    fn convert_query_ast(
        &self,
        ast: &QueryAst,
        field_mappings: &HashMap<String, String>,
    ) -> String {
        render_spl(ast, field_mappings)
    }

    async fn query(
        &self,
        config: &Value,
        collection_name: &str,
        params: &QueryParams,
    ) -> Result<Vec<Value>, AppError> {
        let (index, sourcetype) =
            parse_collection_name(collection_name).map_err(AppError::Validation)?;
        let client = SplunkClient::from_config(config).map_err(AppError::Connection)?;

        let search = params
            .search
            .clone()
            .unwrap_or_else(|| format!("search index=\"{}\" sourcetype=\"{}\"", index, sourcetype));
        let earliest_time = params.earliest_time.as_deref().unwrap_or("-1h");
        let latest_time = params.latest_time.as_deref().unwrap_or("now");
        let limit = params.limit.unwrap_or(100);

        tracing::info!("Running search: {}", search);

        let sid = client
            .submit_search(&search, earliest_time, latest_time)
            .await
            .map_err(AppError::Connection)?;

        let completed = client
            .wait_for_job(&sid)
            .await
            .map_err(AppError::Connection)?;
        if !completed {
            return Err(AppError::Timeout(format!(
                "Search job {} did not complete within {} attempts",
                sid, MAX_POLL_ATTEMPTS
            )));
        }

        let results = client
            .fetch_results(&sid, limit)
            .await
            .map_err(AppError::Connection)?;

        tracing::info!("Query returned {} results", results.len());

        Ok(results)
    }

    fn integration_type(&self) -> &str {
        "splunk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterCondition;

    fn mappings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(logical, physical)| (logical.to_string(), physical.to_string()))
            .collect()
    }

    fn ast_with_where(filter: FilterCondition) -> QueryAst {
        QueryAst {
            logical_schema_id: "schema-1".to_string(),
            select: None,
            where_clause: Some(filter),
            limit: None,
        }
    }

    #[test]
    fn test_parse_collection_name_round_trip() {
        let name = "index:windows, sourcetype:XmlWinEventLog:Microsoft-Windows-Sysmon/Operational";
        let (index, sourcetype) = parse_collection_name(name).unwrap();
        assert_eq!(index, "windows");
        assert_eq!(
            sourcetype,
            "XmlWinEventLog:Microsoft-Windows-Sysmon/Operational"
        );

        // Re-rendered name parses to the same coordinates
        let rendered = format!("index:{}, sourcetype:{}", index, sourcetype);
        assert_eq!(parse_collection_name(&rendered).unwrap(), (index, sourcetype));
    }

    #[test]
    fn test_parse_collection_name_rejects_malformed() {
        assert!(parse_collection_name("not a collection").is_err());
        assert!(parse_collection_name("index:main").is_err());
        assert!(parse_collection_name("sourcetype:syslog").is_err());
        assert!(parse_collection_name("").is_err());
    }

    #[test]
    fn test_render_equality_with_mapping_and_limit() {
        let mut ast = ast_with_where(FilterCondition::eq("process_name", "cmd.exe"));
        ast.limit = Some(50);

        let spl = render_spl(&ast, &mappings(&[("process_name", "Image"), ("user", "User")]));
        assert_eq!(spl, "search Image=\"cmd.exe\" | head 50");
    }

    #[test]
    fn test_render_comparison_operators() {
        let table = mappings(&[]);

        let contains = ast_with_where(FilterCondition::contains("cmdline", "whoami"));
        assert_eq!(render_spl(&contains, &table), "search cmdline=*whoami*");

        let gt = ast_with_where(FilterCondition::gt("pid", 1000));
        assert_eq!(render_spl(&gt, &table), "search pid>1000");

        let lt = ast_with_where(FilterCondition::lt("pid", 1000));
        assert_eq!(render_spl(&lt, &table), "search pid<1000");
    }

    #[test]
    fn test_unknown_operator_renders_as_equality() {
        let ast = ast_with_where(FilterCondition::Comparison {
            field: "user".to_string(),
            operator: QueryOperator::Unknown,
            value: serde_json::json!("alice"),
        });

        assert_eq!(render_spl(&ast, &HashMap::new()), "search user=\"alice\"");
    }

    #[test]
    fn test_and_renders_without_parentheses() {
        let ast = ast_with_where(FilterCondition::and(vec![
            FilterCondition::eq("a", "1"),
            FilterCondition::eq("b", "2"),
            FilterCondition::eq("c", "3"),
        ]));

        assert_eq!(
            render_spl(&ast, &HashMap::new()),
            "search a=\"1\" AND b=\"2\" AND c=\"3\""
        );
    }

    #[test]
    fn test_or_renders_with_one_pair_of_parentheses() {
        let ast = ast_with_where(FilterCondition::or(vec![
            FilterCondition::eq("a", "1"),
            FilterCondition::eq("b", "2"),
        ]));

        assert_eq!(render_spl(&ast, &HashMap::new()), "search (a=\"1\" OR b=\"2\")");
    }

    #[test]
    fn test_nested_logical_grouping() {
        let ast = ast_with_where(FilterCondition::and(vec![
            FilterCondition::eq("process_name", "cmd.exe"),
            FilterCondition::or(vec![
                FilterCondition::eq("user", "alice"),
                FilterCondition::eq("user", "bob"),
            ]),
        ]));

        assert_eq!(
            render_spl(&ast, &HashMap::new()),
            "search process_name=\"cmd.exe\" AND (user=\"alice\" OR user=\"bob\")"
        );
    }

    #[test]
    fn test_unmapped_field_falls_back_to_logical_name() {
        let ast = ast_with_where(FilterCondition::eq("user", "alice"));

        // Table only maps process_name; user falls through verbatim
        let spl = render_spl(&ast, &mappings(&[("process_name", "Image")]));
        assert_eq!(spl, "search user=\"alice\"");
    }

    #[test]
    fn test_select_projection_maps_fields() {
        let ast = QueryAst {
            logical_schema_id: "schema-1".to_string(),
            select: Some(vec!["process_name".to_string(), "user".to_string()]),
            where_clause: None,
            limit: None,
        };

        let spl = render_spl(&ast, &mappings(&[("process_name", "Image")]));
        assert_eq!(spl, "search | table Image, user");
    }

    #[test]
    fn test_clause_order_filter_projection_limit() {
        let ast = QueryAst {
            logical_schema_id: "schema-1".to_string(),
            select: Some(vec!["user".to_string()]),
            where_clause: Some(FilterCondition::eq("user", "alice")),
            limit: Some(10),
        };

        assert_eq!(
            render_spl(&ast, &HashMap::new()),
            "search user=\"alice\" | table user | head 10"
        );
    }

    #[test]
    fn test_empty_ast_renders_bare_search() {
        let ast = QueryAst {
            logical_schema_id: "schema-1".to_string(),
            select: Some(Vec::new()),
            where_clause: None,
            limit: None,
        };

        assert_eq!(render_spl(&ast, &HashMap::new()), "search");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let ast = QueryAst {
            logical_schema_id: "schema-1".to_string(),
            select: Some(vec!["process_name".to_string(), "user".to_string()]),
            where_clause: Some(FilterCondition::and(vec![
                FilterCondition::eq("process_name", "cmd.exe"),
                FilterCondition::gt("pid", 1000),
            ])),
            limit: Some(25),
        };
        let table = mappings(&[("process_name", "Image"), ("user", "User")]);

        let first = render_spl(&ast, &table);
        let second = render_spl(&ast, &table);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rendering_never_fails_on_adversarial_input() {
        let ast = ast_with_where(FilterCondition::and(vec![
            FilterCondition::Comparison {
                field: "".to_string(),
                operator: QueryOperator::Unknown,
                value: serde_json::Value::Null,
            },
            FilterCondition::Logical {
                operator: LogicalOperator::Or,
                conditions: Vec::new(),
            },
            FilterCondition::eq("weird field name!", serde_json::json!({"nested": true})),
        ]));

        // Output is a string no matter what the tree contains
        let spl = render_spl(&ast, &HashMap::new());
        assert!(spl.starts_with("search "));
    }
}
