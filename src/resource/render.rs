//! Renderer contract
//!
//! A renderer turns resources of one kind into table columns and cells.
//! Most kinds use [`ColumnRenderer`], which reads cells from the raw JSON
//! payload with dot-notation paths.

use super::model::Resource;
use serde_json::Value;

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub header: String,
    pub json_path: String,
    /// Percentage of the table width
    pub width: u16,
    pub color_map: Option<&'static str>,
}

impl ColumnDef {
    pub fn new(header: &str, json_path: &str, width: u16) -> Self {
        Self {
            header: header.to_string(),
            json_path: json_path.to_string(),
            width,
            color_map: None,
        }
    }

    pub fn colored(mut self, color_map: &'static str) -> Self {
        self.color_map = Some(color_map);
        self
    }
}

/// Renders one resource kind
pub trait Renderer: Send + Sync {
    fn title(&self) -> &str;

    fn columns(&self) -> &[ColumnDef];

    fn cells(&self, resource: &Resource) -> Vec<String> {
        self.columns()
            .iter()
            .map(|col| extract_json_value(&resource.raw, &col.json_path))
            .collect()
    }

    /// Pretty JSON for the describe view
    fn detail(&self, resource: &Resource) -> String {
        serde_json::to_string_pretty(&resource.raw).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Column-driven renderer
#[derive(Debug, Clone)]
pub struct ColumnRenderer {
    title: String,
    columns: Vec<ColumnDef>,
}

impl ColumnRenderer {
    pub fn new(title: &str, columns: Vec<ColumnDef>) -> Self {
        Self {
            title: title.to_string(),
            columns,
        }
    }
}

impl Renderer for ColumnRenderer {
    fn title(&self) -> &str {
        &self.title
    }

    fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }
}

const STATUS_COLORS: &[(&str, [u8; 3])] = &[
    ("RUNNING", [80, 200, 120]),
    ("READY", [80, 200, 120]),
    ("UP", [80, 200, 120]),
    ("ACTIVE", [80, 200, 120]),
    ("STOPPED", [220, 80, 80]),
    ("TERMINATED", [220, 80, 80]),
    ("DOWN", [220, 80, 80]),
    ("PROVISIONING", [230, 190, 70]),
    ("STAGING", [230, 190, 70]),
    ("STOPPING", [230, 190, 70]),
    ("SUSPENDED", [150, 150, 150]),
];

/// Get color for a value based on color map name
pub fn get_color_for_value(color_map: &str, value: &str) -> Option<[u8; 3]> {
    let map = match color_map {
        "status" => STATUS_COLORS,
        _ => return None,
    };
    map.iter().find(|(v, _)| *v == value).map(|(_, c)| *c)
}

/// Extract a value from JSON using a dot-notation path
pub fn extract_json_value(item: &Value, path: &str) -> String {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = item;

    for part in parts {
        // Handle array index
        let next = match part.parse::<usize>() {
            Ok(idx) => current.get(idx),
            Err(_) => current.get(part),
        };
        current = match next {
            Some(v) => v,
            None => return "-".to_string(),
        };
    }

    match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(_) => "[object]".to_string(),
    }
}

/// Last path segment of a GCP resource URL
/// e.g. ".../projects/p/zones/us-central1-a" -> "us-central1-a"
pub fn extract_short_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}
