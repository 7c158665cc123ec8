use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

pub const NOT_AVAILABLE: &str = "N/A";

const ID_KEYS: &[&str] = &["id", "$Candidate_Id", "candidate_id"];

/// One candidate record. Attribute lookups accept both the recruiting
/// system's keys (`Full_Name`) and the exported keys (`full_name`) so a
/// screening result file can be fed straight into the call flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    id: String,
    attributes: Map<String, Value>,
}

impl WorkItem {
    /// Builds an item from one element of the source array. `index` is the
    /// fallback identity when the record carries no id of its own.
    pub fn from_value(index: usize, value: Value) -> Result<Self> {
        let Value::Object(attributes) = value else {
            anyhow::bail!("work item at position {} is not a JSON object", index);
        };

        let id = ID_KEYS
            .iter()
            .find_map(|key| attributes.get(*key).and_then(scalar_text))
            .unwrap_or_else(|| format!("item-{}", index));

        Ok(Self { id, attributes })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// First non-null scalar found under any of `keys`.
    pub fn attr(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|key| self.attributes.get(*key).and_then(scalar_text))
    }

    fn text(&self, keys: &[&str]) -> String {
        self.attr(keys).unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn full_name(&self) -> String {
        self.text(&["full_name", "Full_Name"])
    }

    pub fn first_name(&self) -> String {
        self.text(&["first_name", "First_Name"])
    }

    pub fn last_name(&self) -> String {
        self.text(&["last_name", "Last_Name"])
    }

    pub fn email(&self) -> String {
        self.text(&["email", "Email"])
    }

    pub fn phone(&self) -> String {
        self.text(&["phone", "Phone", "Mobile"])
    }

    pub fn position_applied(&self) -> String {
        self.text(&["position_applied", "Posting_Title"])
    }

    /// Name for log lines; falls back to the id.
    pub fn label(&self) -> String {
        self.attr(&["full_name", "Full_Name"])
            .unwrap_or_else(|| self.id.clone())
    }

    /// Profile text handed to the scorer alongside the evaluation context.
    pub fn render_profile(&self) -> String {
        let experience = self
            .attr(&["Experience_in_Years", "experience_in_years"])
            .unwrap_or_else(|| "0".to_string());

        format!(
            "Name: {}\n\
             Current Role: {}\n\
             Experience: {} years\n\
             Skills: {}\n\
             Work Experience:\n{}\n\
             Education: {}\n",
            self.full_name(),
            self.text(&["Current_Job_Title", "current_job_title"]),
            experience,
            self.text(&["Skill_Set", "skill_set"]),
            self.pretty_list("Experience_Details"),
            self.pretty_list("Educational_Details"),
        )
    }

    fn pretty_list(&self, key: &str) -> String {
        let value = self
            .attributes
            .get(key)
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "[]".to_string())
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads the ordered work sequence from a JSON array file.
pub async fn load_work_items(path: &Path) -> Result<Vec<WorkItem>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read work items from {}", path.display()))?;
    let values: Vec<Value> = serde_json::from_slice(&raw)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;

    let items = values
        .into_iter()
        .enumerate()
        .map(|(index, value)| WorkItem::from_value(index, value))
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded {} work items from {}", items.len(), path.display());
    Ok(items)
}
