use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::error::{RagError, Result};
use crate::types::{Document, DocumentFormat};

/// Loads every supported file under a directory into [`Document`]s.
pub struct SimpleDirectoryReader {
    input_dir: PathBuf,
    recursive: bool,
    exclude_hidden: bool,
    required_exts: Option<Vec<String>>,
    raise_on_error: bool,
}

impl SimpleDirectoryReader {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            recursive: false,
            exclude_hidden: true,
            required_exts: None,
            raise_on_error: false,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn exclude_hidden(mut self, exclude_hidden: bool) -> Self {
        self.exclude_hidden = exclude_hidden;
        self
    }

    /// Only load files with these extensions (with or without the leading dot).
    pub fn required_exts(mut self, exts: &[&str]) -> Self {
        self.required_exts = Some(
            exts.iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        );
        self
    }

    /// Fail the whole load when a single file cannot be parsed, instead of skipping it.
    pub fn raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }

    pub fn load_data(&self) -> Result<Vec<Document>> {
        let files = self.list_files().map_err(|e| self.load_error(e))?;
        if files.is_empty() {
            return Err(self.load_error(anyhow!("no files found")));
        }

        let mut documents = Vec::with_capacity(files.len());
        for path in &files {
            match load_file(path) {
                Ok(doc) => documents.push(doc),
                Err(e) if self.raise_on_error => {
                    return Err(RagError::DocumentLoad {
                        path: path.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to load file, skipping");
                }
            }
        }

        tracing::info!(
            input_dir = %self.input_dir.display(),
            files = files.len(),
            documents = documents.len(),
            "Loaded documents"
        );

        Ok(documents)
    }

    fn load_error(&self, source: anyhow::Error) -> RagError {
        RagError::DocumentLoad {
            path: self.input_dir.clone(),
            source,
        }
    }

    fn list_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        if !self.input_dir.is_dir() {
            return Err(anyhow!("directory does not exist"));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.input_dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(self.exclude_hidden && is_hidden(e.path())));

        for entry in walker {
            let entry = entry.context("failed to walk input directory")?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(exts) = &self.required_exts {
                let ext = extension_of(entry.path());
                if !exts.contains(&ext) {
                    continue;
                }
            }
            files.push(entry.into_path());
        }

        files.sort();
        Ok(files)
    }
}

/// Read one file, extracting its text according to its format.
pub fn load_file(path: &Path) -> anyhow::Result<Document> {
    let extension = extension_of(path);
    let format = DocumentFormat::from_extension(&extension);

    let text = match format {
        DocumentFormat::PDF => parse_pdf(path)?,
        DocumentFormat::DOCX => parse_docx(path)?,
        DocumentFormat::Other => read_utf8(path)?,
        DocumentFormat::HTML => strip_html(&read_text(path)?),
        DocumentFormat::JSON => {
            let raw = read_text(path)?;
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(raw),
                Err(_) => raw,
            }
        }
        _ => read_text(path)?,
    };

    let mut metadata = HashMap::new();
    metadata.insert("file_path".to_string(), path.display().to_string());
    metadata.insert(
        "file_name".to_string(),
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("untitled")
            .to_string(),
    );
    metadata.insert("file_type".to_string(), format.mime_type().to_string());

    if let Ok(meta) = std::fs::metadata(path) {
        metadata.insert("file_size".to_string(), meta.len().to_string());
        if let Ok(created) = meta.created() {
            metadata.insert("creation_date".to_string(), format_date(created));
        }
        if let Ok(modified) = meta.modified() {
            metadata.insert("last_modified_date".to_string(), format_date(modified));
        }
    }

    Ok(Document {
        id: uuid::Uuid::new_v4().to_string(),
        text,
        format,
        metadata,
    })
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

/// Strict read for files of unknown type: binary content is an error, not text.
fn read_utf8(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    if bytes.contains(&0) {
        return Err(anyhow!("{} looks like a binary file", path.display()));
    }
    String::from_utf8(bytes)
        .map_err(|_| anyhow!("{} is not UTF-8 text", path.display()))
}

fn parse_docx(path: &Path) -> anyhow::Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open DOCX: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read DOCX as ZIP: {}", path.display()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .with_context(|| format!("DOCX missing word/document.xml: {}", path.display()))?
        .read_to_string(&mut xml)
        .context("Failed to read document.xml from DOCX")?;

    let text = extract_docx_text(&xml);
    if text.is_empty() {
        return Err(anyhow!("DOCX contains no extractable text: {}", path.display()));
    }
    Ok(text)
}

static DOCX_PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:p(?:\s[^>]*[^/>])?>(.*?)</w:p>").expect("docx paragraph regex is valid")
});
static DOCX_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").expect("docx text regex is valid")
});

/// Paragraph text from `word/document.xml`, one line per non-empty `<w:p>`.
fn extract_docx_text(xml: &str) -> String {
    DOCX_PARAGRAPH_RE
        .captures_iter(xml)
        .map(|para| {
            DOCX_TEXT_RE
                .captures_iter(&para[1])
                .map(|run| unescape_xml(&run[1]))
                .collect::<String>()
        })
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn parse_pdf(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read PDF: {}", path.display()))?;
    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| anyhow!("PDF text extraction failed for {}: {}", path.display(), e))?;

    Ok(text
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

static HTML_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)>")
        .expect("html block regex is valid")
});
static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("html tag regex is valid"));
static SPACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("spaces regex is valid"));

fn strip_html(html: &str) -> String {
    let text = HTML_BLOCK_RE.replace_all(html, " ");
    let text = HTML_TAG_RE.replace_all(&text, "\n");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");

    text.lines()
        .map(|line| SPACES_RE.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_date(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%Y-%m-%d").to_string()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
