//! Resource table widget
//!
//! Columns come from the kind's renderer. When any row carries a scope, a
//! REGION column is prepended, plus IDENTITY and ACCOUNT columns when rows
//! came from several selections.

use crate::resource::render::get_color_for_value;
use crate::resource::{ColumnDef, Renderer, ResourceItem};
use ratatui::{
    layout::{Alignment, Constraint},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table},
};

const MAX_CELL_WIDTH: usize = 38;

/// Which scope columns a set of rows needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeColumns {
    pub region: bool,
    pub identity: bool,
}

impl ScopeColumns {
    pub fn for_items(items: &[ResourceItem]) -> Self {
        let mut cols = Self::default();
        for scope in items.iter().filter_map(ResourceItem::scope) {
            cols.region = true;
            cols.identity |= scope.selection.is_some();
        }
        cols
    }

    fn headers(&self) -> Vec<&'static str> {
        let mut headers = Vec::new();
        if self.identity {
            headers.extend(["IDENTITY", "ACCOUNT"]);
        }
        if self.region {
            headers.push("REGION");
        }
        headers
    }

    fn cells(&self, item: &ResourceItem) -> Vec<String> {
        let scope = item.scope();
        let mut cells = Vec::new();
        if self.identity {
            let selection = scope.and_then(|s| s.selection.as_ref());
            cells.push(selection.map(|s| s.to_string()).unwrap_or_else(|| "-".into()));
            cells.push(
                scope
                    .and_then(|s| s.account_id.clone())
                    .unwrap_or_else(|| "-".into()),
            );
        }
        if self.region {
            cells.push(scope.map(|s| s.region.to_string()).unwrap_or_else(|| "-".into()));
        }
        cells
    }
}

/// Build the table for `items`
pub fn build_table(renderer: &dyn Renderer, items: &[ResourceItem], title: &str) -> Table<'static> {
    let scope_columns = ScopeColumns::for_items(items);
    let columns = renderer.columns();

    let header_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let header_cells: Vec<Cell> = scope_columns
        .headers()
        .into_iter()
        .map(str::to_string)
        .chain(columns.iter().map(|col| col.header.clone()))
        .map(|header| Cell::from(format!(" {}", header)).style(header_style))
        .collect();
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = items
        .iter()
        .map(|item| {
            let mut cells: Vec<Cell> = scope_columns
                .cells(item)
                .into_iter()
                .map(|value| {
                    Cell::from(format!(" {}", truncate_string(&value, MAX_CELL_WIDTH)))
                        .style(Style::default().fg(Color::DarkGray))
                })
                .collect();

            let values = renderer.cells(item.resource());
            cells.extend(columns.iter().zip(values).map(|(col, value)| {
                let style = get_cell_style(&value, col);
                let display_value = format_cell_value(&value, col);
                Cell::from(format!(" {}", truncate_string(&display_value, MAX_CELL_WIDTH))).style(style)
            }));

            Row::new(cells)
        })
        .collect();

    let mut widths: Vec<Constraint> = scope_columns
        .headers()
        .iter()
        .map(|_| Constraint::Length(16))
        .collect();
    widths.extend(columns.iter().map(|col| Constraint::Percentage(col.width)));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center);

    Table::new(rows, widths).header(header).block(block)
}

/// Get cell style based on value and column definition
fn get_cell_style(value: &str, col: &ColumnDef) -> Style {
    if let Some(color_map_name) = col.color_map {
        if let Some([r, g, b]) = get_color_for_value(color_map_name, value) {
            return Style::default().fg(Color::Rgb(r, g, b));
        }
    }
    Style::default()
}

/// Format cell value, adding indicators for transitional states
fn format_cell_value(value: &str, col: &ColumnDef) -> String {
    if col.color_map.is_some() {
        let lower = value.to_lowercase();
        if ["pending", "starting", "stopping", "staging", "provisioning", "suspending", "repairing"]
            .iter()
            .any(|state| lower.contains(state))
        {
            return format!("{} ↻", value);
        }
    }
    value.to_string()
}

/// Truncate string for display (Unicode-safe)
fn truncate_string(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_len {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        s.to_string()
    }
}
