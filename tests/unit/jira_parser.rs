//! Unit tests for JiraParser

use jira_ingest::client::JiraParser;
use jira_ingest::ingest::ErrorKind;
use serde_json::json;

/// Full issue payload projected onto every record field
#[test]
fn test_project_full_issue() {
    // Trimmed /issue/HADOOP-17 response with expand=comments
    let payload = json!({
        "id": "12345",
        "key": "HADOOP-17",
        "fields": {
            "summary": "NameNode fails to start",
            "description": "Stack trace attached.",
            "status": {"name": "Resolved"},
            "priority": {"name": "Major"},
            "assignee": {"displayName": "Ada Lovelace"},
            "reporter": {"displayName": "Grace Hopper"},
            "created": "2021-03-01T10:00:00.000+0000",
            "updated": "2021-03-04T12:30:00.000+0000",
            "resolutiondate": "2021-03-04T12:30:00.000+0000",
            "labels": ["hdfs", "startup"],
            "components": [{"name": "namenode"}, {"name": "hdfs"}],
            "fixVersions": [{"name": "3.3.1"}],
            "issuetype": {"name": "Bug"},
            "project": {"key": "HADOOP", "name": "Hadoop Common"},
            "comment": {
                "total": 2,
                "comments": [
                    {
                        "author": {"displayName": "Grace Hopper"},
                        "body": "Reproduced on trunk.",
                        "created": "2021-03-02T09:00:00.000+0000"
                    },
                    {
                        "author": {"displayName": "Ada Lovelace"},
                        "body": "Fixed by reordering init.",
                        "created": "2021-03-04T12:00:00.000+0000"
                    }
                ]
            }
        }
    });

    let record = JiraParser::parse_issue(payload.clone()).unwrap();

    assert_eq!(record.key, "HADOOP-17");
    assert_eq!(record.summary, "NameNode fails to start");
    assert_eq!(record.description, "Stack trace attached.");
    assert_eq!(record.status, "Resolved");
    assert_eq!(record.priority, "Major");
    assert_eq!(record.assignee, "Ada Lovelace");
    assert_eq!(record.reporter, "Grace Hopper");
    assert_eq!(record.created, "2021-03-01T10:00:00.000+0000");
    assert_eq!(record.updated, "2021-03-04T12:30:00.000+0000");
    assert_eq!(record.resolution_date, "2021-03-04T12:30:00.000+0000");
    assert_eq!(record.labels, vec!["hdfs", "startup"]);
    assert_eq!(record.components, vec!["namenode", "hdfs"]);
    assert_eq!(record.fix_versions, vec!["3.3.1"]);
    assert_eq!(record.issue_type, "Bug");
    assert_eq!(record.project.key, "HADOOP");
    assert_eq!(record.project.name, "Hadoop Common");

    assert_eq!(record.comments.len(), 2);
    assert_eq!(record.comments[0].author, "Grace Hopper");
    assert_eq!(record.comments[1].body, "Fixed by reordering init.");

    assert_eq!(record.raw, payload);
}

#[test]
fn test_unresolved_issue_without_optional_fields() {
    let record = JiraParser::parse_issue(json!({
        "key": "SPARK-1",
        "fields": {
            "summary": "Add feature",
            "resolutiondate": null,
            "assignee": null
        }
    }))
    .unwrap();

    assert_eq!(record.summary, "Add feature");
    assert_eq!(record.resolution_date, "");
    assert_eq!(record.assignee, "");
    assert!(record.fix_versions.is_empty());
    assert_eq!(record.project.key, "");
}

#[test]
fn test_parse_search_page_keeps_api_order() {
    let page = JiraParser::parse_search_page(json!({
        "startAt": 100,
        "maxResults": 3,
        "total": 250,
        "issues": [
            {"key": "KAFKA-3", "fields": {"summary": "c"}},
            {"key": "KAFKA-1", "fields": {"summary": "a"}},
            {"key": "KAFKA-2", "fields": {"summary": "b"}}
        ]
    }))
    .unwrap();

    assert_eq!(page.start_at, 100);
    assert_eq!(page.total_reported, 250);
    let keys: Vec<&str> = page.items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(keys, vec!["KAFKA-3", "KAFKA-1", "KAFKA-2"]);
}

#[test]
fn test_search_item_without_key_is_kept_for_caller() {
    let page = JiraParser::parse_search_page(json!({
        "issues": [{"fields": {"summary": "orphan"}}, {"key": "KAFKA-1"}]
    }))
    .unwrap();

    assert_eq!(page.len(), 2);
    assert!(!page.items[0].has_key());
    assert!(page.items[1].has_key());
}

#[test]
fn test_null_issues_is_empty_page() {
    let page = JiraParser::parse_search_page(json!({"issues": null, "total": 0})).unwrap();
    assert!(page.is_empty());
}

#[test]
fn test_non_object_issue_is_malformed() {
    let err = JiraParser::parse_issue(json!("KAFKA-1")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::MalformedResponse);
    assert!(err.message.contains("string"));
}
