//! Block-list parsing and hierarchy reconstruction.
//!
//! The layout service returns a flat block list ordered by reading position:
//! `header`, `para`, `list_item`, and `table` blocks, each with a heading
//! `level` and document-wide `block_idx`. Hierarchy is implicit: a block's
//! parent is the nearest preceding header with a strictly lower level. This
//! module makes that explicit so the graph loader never has to reason about
//! ordering.

use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;

// ── Wire model ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LayoutResponse {
    return_dict: ReturnDict,
}

#[derive(Debug, Deserialize)]
struct ReturnDict {
    result: ResultBody,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    #[serde(default)]
    blocks: Vec<RawBlock>,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    #[serde(default)]
    tag: String,
    #[serde(default = "default_level")]
    level: i64,
    #[serde(default)]
    page_idx: i64,
    #[serde(default)]
    block_idx: i64,
    #[serde(default)]
    sentences: Vec<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    table_rows: Vec<RawTableRow>,
}

fn default_level() -> i64 {
    -1
}

#[derive(Debug, Deserialize)]
struct RawTableRow {
    #[serde(default)]
    cells: Vec<RawTableCell>,
    #[serde(default)]
    cell_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTableCell {
    #[serde(default)]
    cell_value: Value,
}

// ── Parsed model ─────────────────────────────────────────────────────────────

/// Reference to the enclosing header block.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentRef {
    pub title: String,
    pub block_idx: i64,
    pub page_idx: i64,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    pub tag: String,
    pub level: i64,
    pub page_idx: i64,
    pub block_idx: i64,
    /// `None` marks a root section, attached directly to the document.
    pub parent: Option<ParentRef>,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub tag: String,
    pub level: i64,
    pub page_idx: i64,
    pub block_idx: i64,
    /// `None` marks an orphan chunk with no preceding header.
    pub parent: Option<ParentRef>,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub html: String,
    pub row_count: i64,
    pub page_idx: i64,
    pub block_idx: i64,
    /// `None` tables attach to the document itself.
    pub parent: Option<ParentRef>,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub name: String,
    pub sections: Vec<Section>,
    pub chunks: Vec<Chunk>,
    pub tables: Vec<Table>,
}

/// Parse the raw service response for the document named `doc_name`.
pub fn parse_layout_json(doc_name: &str, raw: &str) -> Result<ParsedDocument, AppError> {
    let response: LayoutResponse = serde_json::from_str(raw)
        .map_err(|e| AppError::Layout(format!("malformed layout response: {e}")))?;

    let mut sections = Vec::new();
    let mut chunks = Vec::new();
    let mut tables = Vec::new();

    // Stack of open headers, innermost last. Headers at the same or a
    // shallower level close everything at or below them.
    let mut open: Vec<(i64, ParentRef)> = Vec::new();

    for block in &response.return_dict.result.blocks {
        match block.tag.as_str() {
            "header" => {
                while open.last().is_some_and(|(level, _)| *level >= block.level) {
                    open.pop();
                }
                let title = block.sentences.join(" ");
                sections.push(Section {
                    title: title.clone(),
                    tag: block.tag.clone(),
                    level: block.level,
                    page_idx: block.page_idx,
                    block_idx: block.block_idx,
                    parent: open.last().map(|(_, parent)| parent.clone()),
                });
                open.push((
                    block.level,
                    ParentRef {
                        title,
                        block_idx: block.block_idx,
                        page_idx: block.page_idx,
                    },
                ));
            }
            "table" => {
                let name = format!(
                    "block#{}_{}",
                    block.block_idx,
                    block.name.as_deref().unwrap_or("table")
                );
                tables.push(Table {
                    name,
                    html: render_table_html(&block.table_rows),
                    row_count: block.table_rows.len() as i64,
                    page_idx: block.page_idx,
                    block_idx: block.block_idx,
                    parent: open.last().map(|(_, parent)| parent.clone()),
                });
            }
            _ => {
                // para, list_item and anything else textual.
                if block.sentences.is_empty() {
                    continue;
                }
                chunks.push(Chunk {
                    text: block.sentences.join("\n"),
                    tag: block.tag.clone(),
                    level: block.level,
                    page_idx: block.page_idx,
                    block_idx: block.block_idx,
                    parent: open.last().map(|(_, parent)| parent.clone()),
                });
            }
        }
    }

    Ok(ParsedDocument {
        name: doc_name.to_string(),
        sections,
        chunks,
        tables,
    })
}

// ── Table rendering ──────────────────────────────────────────────────────────

fn render_table_html(rows: &[RawTableRow]) -> String {
    let mut html = String::from("<table>");
    for row in rows {
        html.push_str("<tr>");
        if let Some(full) = &row.cell_value {
            // full_row spans the table width.
            html.push_str("<td colspan=\"0\">");
            html.push_str(&escape_html(&cell_text(full)));
            html.push_str("</td>");
        } else {
            for cell in &row.cells {
                html.push_str("<td>");
                html.push_str(&escape_html(&cell_text(&cell.cell_value)));
                html.push_str("</td>");
            }
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

/// Cell values are either plain strings or nested blocks carrying `sentences`.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("sentences") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        },
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
