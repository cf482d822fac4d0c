//! Jira response parser
//!
//! Stateless functions turning loosely typed Jira JSON into [`IssueRecord`]s
//! and [`Page`]s. Every field lookup has a default, so a missing or `null`
//! field never fails a record; only a payload of the wrong overall shape is
//! reported as malformed.

use super::Page;
use crate::ingest::failure::FetchFailure;
use crate::{IssueComment, IssueRecord, ProjectRef};
use serde_json::Value;

/// Stateless parser for Jira API responses
pub struct JiraParser;

impl JiraParser {
    /// Parse a `/search` response.
    ///
    /// # Errors
    /// Returns a malformed-response failure if the payload is not an object
    /// or `issues` is present but not an array.
    pub fn parse_search_page(payload: Value) -> Result<Page, FetchFailure> {
        let mut payload = match payload {
            Value::Object(map) => map,
            other => {
                return Err(FetchFailure::malformed(format!(
                    "search response is not an object (got {})",
                    type_name(&other)
                )))
            }
        };

        let total_reported = payload.get("total").and_then(Value::as_u64).unwrap_or(0);
        let start_at = payload.get("startAt").and_then(Value::as_u64).unwrap_or(0);

        let issues = match payload.remove("issues") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(issues)) => issues,
            Some(other) => {
                return Err(FetchFailure::malformed(format!(
                    "search response 'issues' is not an array (got {})",
                    type_name(&other)
                )))
            }
        };

        Ok(Page {
            items: issues.into_iter().map(Self::project_issue).collect(),
            total_reported,
            start_at,
        })
    }

    /// Parse an `/issue/{key}` response.
    ///
    /// # Errors
    /// Returns a malformed-response failure if the payload is not an object
    /// or carries no key.
    pub fn parse_issue(payload: Value) -> Result<IssueRecord, FetchFailure> {
        if !payload.is_object() {
            return Err(FetchFailure::malformed(format!(
                "issue response is not an object (got {})",
                type_name(&payload)
            )));
        }
        let record = Self::project_issue(payload);
        if !record.has_key() {
            return Err(FetchFailure::malformed("issue response has no key"));
        }
        Ok(record)
    }

    /// Project an issue payload onto [`IssueRecord`], defaulting every field.
    pub fn project_issue(raw: Value) -> IssueRecord {
        let fields = raw.get("fields").unwrap_or(&Value::Null);

        IssueRecord {
            key: string_at(&raw, "/key"),
            summary: string_at(fields, "/summary"),
            description: string_at(fields, "/description"),
            status: string_at(fields, "/status/name"),
            priority: string_at(fields, "/priority/name"),
            assignee: string_at(fields, "/assignee/displayName"),
            reporter: string_at(fields, "/reporter/displayName"),
            created: string_at(fields, "/created"),
            updated: string_at(fields, "/updated"),
            resolution_date: string_at(fields, "/resolutiondate"),
            labels: string_list(fields.get("labels")),
            components: names(fields.get("components")),
            fix_versions: names(fields.get("fixVersions")),
            issue_type: string_at(fields, "/issuetype/name"),
            project: ProjectRef {
                key: string_at(fields, "/project/key"),
                name: string_at(fields, "/project/name"),
            },
            comments: comments(fields.pointer("/comment/comments")),
            raw,
        }
    }
}

fn string_at(value: &Value, pointer: &str) -> String {
    match value.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn names(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| string_at(item, "/name"))
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn comments(value: Option<&Value>) -> Vec<IssueComment> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|comment| IssueComment {
                    author: string_at(comment, "/author/displayName"),
                    body: string_at(comment, "/body"),
                    created: string_at(comment, "/created"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
