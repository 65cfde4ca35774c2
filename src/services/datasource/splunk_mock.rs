// Mock Splunk adapter backed by generated data. Lets the rest of the stack
// run without a reachable Splunk deployment or IP allowlisting.
use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

use crate::api::middleware::AppError;
use crate::models::{FieldDataType, QueryAst};
use crate::services::datasource::adapter::{
    CollectionDiscovery, DatasourceAdapter, DiscoveredCollection, DiscoveredField, FieldDiscovery,
    QueryParams,
};
use crate::services::datasource::splunk::{parse_collection_name, render_spl};

pub struct SplunkMockAdapter;

const MOCK_INDEXES: &[(&str, &str, &str)] = &[
    ("main", "1250000", "450.5"),
    ("windows-events", "2500000", "890.3"),
    ("security", "750000", "320.8"),
    ("network", "3200000", "1200.5"),
    ("web-logs", "5000000", "2100.7"),
    ("_internal", "500000", "180.2"),
    ("_audit", "100000", "45.1"),
];

const MOCK_SOURCETYPES: &[&str] = &[
    "WinEventLog:Sysmon/Operational",
    "WinEventLog:Security",
    "WinEventLog:System",
    "WinEventLog:Application",
    "XmlWinEventLog:Microsoft-Windows-Sysmon/Operational",
    "XmlWinEventLog:Security",
    "syslog",
    "cisco:asa",
    "aws:cloudtrail",
    "linux_secure",
    "access_combined",
    "json",
];

const SYSMON_FIELDS: &[&str] = &[
    "EventCode",
    "UtcTime",
    "ProcessGuid",
    "ProcessId",
    "Image",
    "CommandLine",
    "CurrentDirectory",
    "User",
    "LogonGuid",
    "LogonId",
    "TerminalSessionId",
    "IntegrityLevel",
    "Hashes",
    "ParentProcessGuid",
    "ParentProcessId",
    "ParentImage",
    "ParentCommandLine",
    "Computer",
    "EventType",
    "RuleName",
];

const SECURITY_FIELDS: &[&str] = &[
    "EventCode",
    "TimeCreated",
    "Computer",
    "SubjectUserSid",
    "SubjectUserName",
    "SubjectDomainName",
    "SubjectLogonId",
    "NewProcessId",
    "NewProcessName",
    "TokenElevationType",
    "ProcessId",
    "CommandLine",
    "TargetUserSid",
    "TargetUserName",
    "TargetDomainName",
    "TargetLogonId",
    "ParentProcessName",
    "MandatoryLabel",
    "Keywords",
    "Message",
    "Level",
    "Task",
];

const DEFAULT_FIELDS: &[&str] = &[
    "_time",
    "host",
    "source",
    "sourcetype",
    "index",
    "_raw",
    "timestamp",
    "event_type",
    "user",
    "action",
    "result",
    "duration",
    "bytes_in",
    "bytes_out",
    "src_ip",
    "dest_ip",
    "src_port",
    "dest_port",
    "protocol",
];

const MOCK_PROCESSES: &[(&str, &str, &str)] = &[
    (
        "chrome.exe",
        "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
        "--new-window https://example.com",
    ),
    (
        "notepad.exe",
        "C:\\Windows\\System32\\notepad.exe",
        "document.txt",
    ),
    (
        "powershell.exe",
        "C:\\Windows\\System32\\WindowsPowerShell\\v1.0\\powershell.exe",
        "-ExecutionPolicy Bypass -File script.ps1",
    ),
    ("cmd.exe", "C:\\Windows\\System32\\cmd.exe", "/c dir"),
    (
        "svchost.exe",
        "C:\\Windows\\System32\\svchost.exe",
        "-k netsvcs -p -s BITS",
    ),
    ("explorer.exe", "C:\\Windows\\explorer.exe", ""),
];

const MOCK_USERS: &[(&str, &str)] = &[
    ("alice", "CORP"),
    ("bob", "CORP"),
    ("SYSTEM", "NT AUTHORITY"),
    ("admin", "WORKGROUP"),
    ("service_account", "CORP"),
];

const MOCK_HOSTS: &[&str] = &[
    "WIN-SERVER01",
    "WIN-SERVER02",
    "DESKTOP-ABC123",
    "LAPTOP-XYZ789",
    "DC01",
];

fn mock_fields_for(sourcetype: &str) -> &'static [&'static str] {
    if sourcetype.contains("Sysmon") {
        SYSMON_FIELDS
    } else if sourcetype.contains("Security") {
        SECURITY_FIELDS
    } else {
        DEFAULT_FIELDS
    }
}

fn mock_event(index: &str, sourcetype: &str, sequence: usize) -> Value {
    let mut rng = rand::thread_rng();
    let timestamp = chrono::Utc::now() - chrono::Duration::minutes(sequence as i64);
    let host = MOCK_HOSTS.choose(&mut rng).unwrap();

    if sourcetype.contains("Sysmon") {
        let (name, path, args) = MOCK_PROCESSES.choose(&mut rng).unwrap();
        let (user, domain) = MOCK_USERS.choose(&mut rng).unwrap();
        json!({
            "_time": timestamp.to_rfc3339(),
            "host": host,
            "source": "WinEventLog:Sysmon",
            "sourcetype": sourcetype,
            "index": index,
            "EventCode": 1,
            "Image": path,
            "CommandLine": format!("{} {}", name, args).trim_end(),
            "User": format!("{}\\{}", domain, user),
            "ProcessId": rng.gen_range(1000..65000),
            "ParentProcessId": rng.gen_range(100..1000),
            "UtcTime": timestamp.to_rfc3339(),
        })
    } else if sourcetype.contains("Security") {
        let (name, path, _) = MOCK_PROCESSES.choose(&mut rng).unwrap();
        let (user, domain) = MOCK_USERS.choose(&mut rng).unwrap();
        json!({
            "_time": timestamp.to_rfc3339(),
            "host": host,
            "source": "WinEventLog:Security",
            "sourcetype": sourcetype,
            "index": index,
            "EventCode": 4688,
            "NewProcessName": path,
            "SubjectUserName": user,
            "SubjectDomainName": domain,
            "ParentProcessName": name,
            "TokenElevationType": "%%1936",
            "TimeCreated": timestamp.to_rfc3339(),
        })
    } else {
        json!({
            "_time": timestamp.to_rfc3339(),
            "host": host,
            "source": format!("/var/log/{}.log", index),
            "sourcetype": sourcetype,
            "index": index,
            "user": MOCK_USERS.choose(&mut rng).unwrap().0,
            "action": (["login", "logout", "read", "write"].choose(&mut rng).unwrap()),
            "result": (["success", "failure"].choose(&mut rng).unwrap()),
            "src_ip": format!("10.0.{}.{}", rng.gen_range(0..255), rng.gen_range(1..255)),
            "dest_port": rng.gen_range(1..65535),
        })
    }
}

#[async_trait::async_trait]
impl DatasourceAdapter for SplunkMockAdapter {
    async fn validate_connection(&self, _config: &Value) -> bool {
        tracing::debug!("Mock connection validation always succeeds");
        true
    }

    async fn discover_collections(&self, _config: &Value) -> CollectionDiscovery {
        let mut collections = Vec::new();
        for (index, total_event_count, current_db_size_mb) in MOCK_INDEXES {
            for sourcetype in MOCK_SOURCETYPES {
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

        tracing::info!(
            "Mock discovery created {} collections from {} indexes and {} sourcetypes",
            collections.len(),
            MOCK_INDEXES.len(),
            MOCK_SOURCETYPES.len()
        );

        CollectionDiscovery::ok(collections)
    }

    async fn discover_fields(&self, _config: &Value, collection_name: &str) -> FieldDiscovery {
        let (_, sourcetype) = match parse_collection_name(collection_name) {
            Ok(coordinates) => coordinates,
            Err(e) => return FieldDiscovery::failed(e),
        };

        let fields: Vec<DiscoveredField> = mock_fields_for(&sourcetype)
            .iter()
            .map(|name| DiscoveredField {
                name: name.to_string(),
                data_type: FieldDataType::String,
                metadata: json!({
                    "discoveredAt": chrono::Utc::now().to_rfc3339(),
                    "sourcetype": sourcetype,
                }),
            })
            .collect();

        tracing::info!("Mock discovery produced {} fields", fields.len());

        FieldDiscovery::ok(fields)
    }

    fn convert_query_ast(
        &self,
        ast: &QueryAst,
        field_mappings: &HashMap<String, String>,
    ) -> String {
        // Same SPL rendering as the real Splunk adapter
        render_spl(ast, field_mappings)
    }

    async fn query(
        &self,
        _config: &Value,
        collection_name: &str,
        params: &QueryParams,
    ) -> Result<Vec<Value>, AppError> {
        let (index, sourcetype) =
            parse_collection_name(collection_name).map_err(AppError::Validation)?;

        let limit = params.limit.unwrap_or(100).min(100);
        let results: Vec<Value> = (0..limit)
            .map(|sequence| mock_event(&index, &sourcetype, sequence))
            .collect();

        tracing::info!("Mock query returned {} results", results.len());

        Ok(results)
    }

    fn integration_type(&self) -> &str {
        "splunk-mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discovered_names_parse_back() {
        let adapter = SplunkMockAdapter;
        let discovery = adapter.discover_collections(&Value::Null).await;

        assert!(discovery.success);
        assert_eq!(
            discovery.collections.len(),
            MOCK_INDEXES.len() * MOCK_SOURCETYPES.len()
        );

        // Round trip: every emitted name must be accepted by field discovery
        for collection in &discovery.collections {
            let fields = adapter.discover_fields(&Value::Null, &collection.name).await;
            assert!(fields.success, "name not parseable: {}", collection.name);
            assert!(!fields.fields.is_empty());
        }
    }

    #[tokio::test]
    async fn test_sysmon_collection_yields_sysmon_fields() {
        let adapter = SplunkMockAdapter;
        let discovery = adapter
            .discover_fields(
                &Value::Null,
                "index:windows-events, sourcetype:XmlWinEventLog:Microsoft-Windows-Sysmon/Operational",
            )
            .await;

        assert!(discovery.success);
        let names: Vec<&str> = discovery.fields.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"Image"));
        assert!(names.contains(&"CommandLine"));
        assert!(names.contains(&"User"));
        assert!(discovery
            .fields
            .iter()
            .all(|f| f.data_type == FieldDataType::String));
    }

    #[tokio::test]
    async fn test_field_discovery_rejects_malformed_name() {
        let adapter = SplunkMockAdapter;
        let discovery = adapter.discover_fields(&Value::Null, "not-a-collection").await;
        assert!(!discovery.success);
        assert!(discovery.error.is_some());
        assert!(discovery.fields.is_empty());
    }

    #[tokio::test]
    async fn test_mock_query_honors_limit() {
        let adapter = SplunkMockAdapter;
        let params = QueryParams {
            limit: Some(7),
            ..Default::default()
        };

        let results = adapter
            .query(
                &Value::Null,
                "index:security, sourcetype:WinEventLog:Security",
                &params,
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        assert_eq!(results[0]["EventCode"], 4688);
        assert_eq!(results[0]["index"], "security");
    }
}
