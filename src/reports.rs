//! CSV session reports for the analytics dashboard.
//!
//! Two append-only files under the reports directory:
//!
//! - `rag-reports.csv`: every answered question, with both the plain and the
//!   grounded answer when both ran.
//! - `ticket-reports.csv`: every ticket draft handed off to a lawyer.
//!
//! Rows carry a 1-based running index and a local timestamp, matching what
//! the dashboard already expects.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::error::AppError;

const RAG_FILE: &str = "rag-reports.csv";
const RAG_HEADER: &str =
    "Index,Date,Document,User_Input,Assistant_llm_chain,Assistant_rag_chain,User";

const TICKET_FILE: &str = "ticket-reports.csv";
const TICKET_HEADER: &str =
    "Index,Date,User,Document,Original_title_question,New_title_question,New_user_question";

pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub async fn append_rag(
        &self,
        document: &str,
        user_input: &str,
        plain_answer: &str,
        rag_answer: &str,
        user: &str,
    ) -> Result<(), AppError> {
        self.append(
            RAG_FILE,
            RAG_HEADER,
            &[document, user_input, plain_answer, rag_answer, user],
        )
        .await
    }

    pub async fn append_ticket(
        &self,
        user: &str,
        document: &str,
        original: &str,
        title: &str,
        question: &str,
    ) -> Result<(), AppError> {
        self.append(
            TICKET_FILE,
            TICKET_HEADER,
            &[user, document, original, title, question],
        )
        .await
    }

    /// Append one row, creating the directory and header on first use. The
    /// index column is derived from the current line count so it stays
    /// monotonic across process restarts.
    async fn append(&self, file: &str, header: &str, fields: &[&str]) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Report(format!("cannot create {}: {e}", self.dir.display())))?;
        let path = self.dir.join(file);

        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(AppError::Report(format!("cannot read {}: {e}", path.display()))),
        };

        let mut out = String::new();
        let index = if existing.is_empty() {
            out.push_str(header);
            out.push('\n');
            1
        } else {
            count_records(&existing) // header plus n rows gives index n + 1
        };

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let mut row = vec![index.to_string(), timestamp];
        row.extend(fields.iter().map(|f| f.to_string()));
        out.push_str(
            &row.iter()
                .map(|f| csv_field(f))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');

        let mut content = existing;
        content.push_str(&out);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AppError::Report(format!("cannot write {}: {e}", path.display())))?;
        debug!(file, index, "report row appended");
        Ok(())
    }
}

/// Count CSV records, not physical lines: a newline inside a quoted field
/// belongs to its record. Doubled escape quotes toggle the state twice, so
/// they cancel out.
fn count_records(content: &str) -> usize {
    let mut records = 0;
    let mut in_quotes = false;
    for ch in content.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => records += 1,
            _ => {}
        }
    }
    if !content.is_empty() && !content.ends_with('\n') {
        records += 1;
    }
    records
}

/// RFC 4180 quoting: fields containing commas, quotes or newlines get
/// wrapped in double quotes, with inner quotes doubled.
fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_pass_through() {
        assert_eq!(csv_field("contrato.pdf"), "contrato.pdf");
    }

    #[test]
    fn special_fields_are_quoted_and_escaped() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("dijo \"no\""), "\"dijo \"\"no\"\"\"");
        assert_eq!(csv_field("dos\nlineas"), "\"dos\nlineas\"");
    }

    #[tokio::test]
    async fn first_append_writes_header_and_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = ReportWriter::new(dir.path());
        writer
            .append_rag("contrato.pdf", "¿plazo?", "un año", "un año, cláusula 1", "maria")
            .await
            .expect("append");

        let content = std::fs::read_to_string(dir.path().join(RAG_FILE)).expect("read");
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], RAG_HEADER);
        assert!(lines[1].starts_with("1,"));
        assert!(lines[1].ends_with(",maria"));
    }

    #[test]
    fn record_count_ignores_quoted_newlines() {
        assert_eq!(count_records("h\n"), 1);
        assert_eq!(count_records("h\n1,\"linea1\nlinea2\",x\n"), 2);
        assert_eq!(count_records("h\n1,\"dijo \"\"no\"\"\nmas\",x\n"), 2);
        assert_eq!(count_records("h\n1,sin salto"), 2);
        assert_eq!(count_records(""), 0);
    }

    #[tokio::test]
    async fn multiline_answers_do_not_inflate_the_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = ReportWriter::new(dir.path());
        writer
            .append_rag("contrato.pdf", "¿fianza?", "linea1\nlinea2", "resp", "maria")
            .await
            .expect("append");
        writer
            .append_rag("contrato.pdf", "¿fianza?", "x", "y", "maria")
            .await
            .expect("append");

        let content = std::fs::read_to_string(dir.path().join(RAG_FILE)).expect("read");
        let last = content.lines().last().expect("rows");
        assert!(last.starts_with("2,"), "second record got index: {last}");
    }

    #[tokio::test]
    async fn index_grows_across_appends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = ReportWriter::new(dir.path());
        for _ in 0..3 {
            writer
                .append_ticket("maria", "contrato.pdf", "¿fianza?", "Fianza", "¿cuándo?")
                .await
                .expect("append");
        }

        let content = std::fs::read_to_string(dir.path().join(TICKET_FILE)).expect("read");
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("3,"));
    }
}
