//! JSONL discovery, reading and writing

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use crate::config::INPUT_EXTENSIONS;
use crate::core::{Document, DocumentId, DuplicateIdSet, Embedding};
use crate::error::{DedupError, Result};

/// All input files under `root`, sorted by path, truncated to `limit`
pub fn discover(root: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>> {
	let mut files = Vec::new();
	for entry in WalkDir::new(root).follow_links(true) {
		let entry = entry.map_err(|e| DedupError::Io(e.into()))?;
		if !entry.file_type().is_file() {
			continue;
		}
		let path = entry.path();
		let is_input = path
			.extension()
			.and_then(|s| s.to_str())
			.is_some_and(|ext| INPUT_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)));
		if is_input {
			files.push(path.to_path_buf());
		}
	}
	files.sort();
	if let Some(limit) = limit {
		files.truncate(limit);
	}
	Ok(files)
}

/// Read documents from a JSONL file, keeping each line verbatim as payload
pub fn read_documents(path: &Path, id_field: &str) -> Result<Vec<Document>> {
	let mut documents = Vec::new();
	for_each_record(path, |line_no, line, value| {
		let id = record_id(&value, id_field).ok_or_else(|| missing(path, line_no, id_field))?;
		documents.push(Document::new(id, line));
		Ok(())
	})?;
	Ok(documents)
}

/// Read embeddings from a JSONL file of `{id_field: .., embedding_field: [..]}`
pub fn read_embeddings(path: &Path, id_field: &str, embedding_field: &str) -> Result<Vec<Embedding>> {
	let mut embeddings = Vec::new();
	for_each_record(path, |line_no, _line, value| {
		let id = record_id(&value, id_field).ok_or_else(|| missing(path, line_no, id_field))?;
		let raw = value
			.get(embedding_field)
			.and_then(Value::as_array)
			.ok_or_else(|| missing(path, line_no, embedding_field))?;
		let vector = raw
			.iter()
			.map(|x| x.as_f64().map(|x| x as f32))
			.collect::<Option<Vec<f32>>>()
			.ok_or_else(|| DedupError::InvalidInput {
				path: path.to_path_buf(),
				line: line_no,
				reason: format!("'{}' must be an array of numbers", embedding_field),
			})?;
		embeddings.push(Embedding { document_id: id, vector });
		Ok(())
	})?;
	Ok(embeddings)
}

/// Write raw document payloads, one per line
pub fn write_documents<'a>(path: &Path, documents: impl IntoIterator<Item = &'a Document>) -> Result<usize> {
	let mut writer = create(path)?;
	let mut count = 0;
	for document in documents {
		writeln!(writer, "{}", document.payload)?;
		count += 1;
	}
	writer.flush()?;
	Ok(count)
}

/// Persist a duplicate id list as `{"<id_field>": "<id>"}` lines, in id order
pub fn write_duplicates(path: &Path, duplicates: &DuplicateIdSet, id_field: &str) -> Result<()> {
	let mut writer = create(path)?;
	for id in duplicates {
		let mut record = serde_json::Map::new();
		record.insert(id_field.to_string(), Value::String(id.to_string()));
		serde_json::to_writer(&mut writer, &record).map_err(|e| DedupError::Io(e.into()))?;
		writer.write_all(b"\n")?;
	}
	writer.flush()?;
	Ok(())
}

pub fn read_duplicates(path: &Path, id_field: &str) -> Result<DuplicateIdSet> {
	let mut ids = Vec::new();
	for_each_record(path, |line_no, _line, value| {
		ids.push(record_id(&value, id_field).ok_or_else(|| missing(path, line_no, id_field))?);
		Ok(())
	})?;
	Ok(ids.into_iter().collect())
}

/// Ids are strings; numeric ids are accepted and kept in their JSON spelling
fn record_id(value: &Value, id_field: &str) -> Option<DocumentId> {
	match value.get(id_field)? {
		Value::String(s) => Some(DocumentId::new(s.clone())),
		Value::Number(n) => Some(DocumentId::new(n.to_string())),
		_ => None,
	}
}

fn for_each_record<F>(path: &Path, mut handle: F) -> Result<()>
where
	F: FnMut(usize, String, Value) -> Result<()>,
{
	let reader = BufReader::new(File::open(path)?);
	for (index, line) in reader.lines().enumerate() {
		let line = line?;
		let line_no = index + 1;
		if line.trim().is_empty() {
			continue;
		}
		let value: Value = serde_json::from_str(&line).map_err(|e| DedupError::InvalidInput {
			path: path.to_path_buf(),
			line: line_no,
			reason: e.to_string(),
		})?;
		handle(line_no, line, value)?;
	}
	Ok(())
}

fn missing(path: &Path, line: usize, field: &str) -> DedupError {
	DedupError::InvalidInput {
		path: path.to_path_buf(),
		line,
		reason: format!("missing or invalid field '{}'", field),
	}
}

fn create(path: &Path) -> Result<BufWriter<File>> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).map_err(|e| DedupError::storage(parent, e))?;
	}
	let file = File::create(path).map_err(|e| DedupError::storage(path, e))?;
	Ok(BufWriter::new(file))
}
