//! Rule results and their flattened findings.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::level::ErrorLevel;

pub const MODULE_SOURCE_TITLE: &str = "Module source";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub link: String,
}

impl Link {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinkItem {
    Url(String),
    Full {
        #[serde(default)]
        title: String,
        #[serde(default)]
        link: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinksRepr {
    One(String),
    Many(Vec<LinkItem>),
    ByTitle(BTreeMap<String, String>),
}

/// Accepts a single URL, a list of URLs or `{title, link}` objects, or a
/// title to URL map.
fn deserialize_links<'de, D>(deserializer: D) -> Result<Vec<Link>, D::Error>
where
    D: Deserializer<'de>,
{
    let links = match Option::<LinksRepr>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(LinksRepr::One(url)) => vec![Link::new("", url)],
        Some(LinksRepr::Many(items)) => items
            .into_iter()
            .map(|item| match item {
                LinkItem::Url(url) => Link::new("", url),
                LinkItem::Full { title, link } => Link { title, link },
            })
            .collect(),
        Some(LinksRepr::ByTitle(map)) => map
            .into_iter()
            .map(|(title, link)| Link { title, link })
            .collect(),
    };
    Ok(links)
}

/// One entry of a rule's output array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRuleResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "deserialize_links",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub excluded: bool,
}

/// Evaluation of one rule against one data file, or against all data files
/// of a target for combined rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LintResult {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_id: String,
    pub lint_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_files: Vec<String>,
    /// Provenance of module rules.
    #[serde(skip)]
    pub link: Option<String>,
    /// Output decoded as rule entries, when it has that shape.
    #[serde(skip)]
    pub raw_results: Option<Vec<RawRuleResult>>,
    #[serde(skip)]
    pub raw_output: String,
    /// Output decoded as a generic value.
    #[serde(rename = "result", skip_serializing_if = "Value::is_null")]
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
    /// Hard failure of the evaluation itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LintResult {
    /// Decodes raw rule output. Output that is not an array of entries keeps
    /// its generic value and records why the typed decode failed.
    pub fn with_output(mut self, raw_output: String) -> Self {
        match serde_json::from_str::<Value>(&raw_output) {
            Ok(value) => {
                match Vec::<RawRuleResult>::deserialize(&value) {
                    Ok(entries) => self.raw_results = Some(entries),
                    Err(e) => self.decode_error = Some(format!("unmarshal the rule output: {e}")),
                }
                self.value = value;
            }
            Err(e) => self.error = Some(format!("rule output is not valid JSON: {e}")),
        }
        self.raw_output = raw_output;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Flattens into user-facing findings.
    pub fn flatten(&self) -> Vec<Finding> {
        let base = Finding {
            lint_file: self.lint_file.clone(),
            data_file: self.data_file.clone(),
            target_id: self.target_id.clone(),
            ..Finding::default()
        };

        if let Some(error) = &self.error {
            return vec![Finding {
                message: error.clone(),
                ..base
            }];
        }

        let Some(entries) = &self.raw_results else {
            let message = self.decode_error.clone().unwrap_or_default();
            return vec![Finding {
                message,
                custom: Some(serde_json::json!({ "result": self.value })),
                ..base
            }];
        };

        entries
            .iter()
            .filter(|entry| !entry.excluded)
            .map(|entry| {
                let mut links = entry.links.clone();
                if let Some(link) = &self.link
                    && !links.iter().any(|l| &l.link == link)
                {
                    links.push(Link::new(MODULE_SOURCE_TITLE, link.clone()));
                }
                Finding {
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    links,
                    severity: resolve_severity(entry.level.as_deref(), &self.lint_file),
                    level: entry.level.clone().filter(|l| !l.is_empty()),
                    message: entry.message.clone(),
                    location: entry.location.clone(),
                    custom: entry.custom.clone(),
                    ..base.clone()
                }
            })
            .collect()
    }
}

/// Missing levels are the maximum severity. Unknown levels are too, with a
/// warning, so a typo never hides a finding.
pub fn resolve_severity(level: Option<&str>, lint_file: &str) -> ErrorLevel {
    match level {
        None | Some("") => ErrorLevel::MAX,
        Some(level) => level.parse().unwrap_or_else(|_| {
            warn!(level, lint_file, "invalid error level in rule output, treating it as error");
            ErrorLevel::MAX
        }),
    }
}

/// A single user-facing finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Finding {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    /// Level as reported by the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Level used for filtering.
    #[serde(skip)]
    pub severity: ErrorLevel,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub lint_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}
