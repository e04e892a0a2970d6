//! Data file decoding.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LinterError;
use crate::fs::FileSystem;
use crate::resolver::ResolvedDataFile;

/// Decoding strategy, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Csv,
    Tsv,
    Json,
    Toml,
    Yaml,
    PlainText,
}

impl FileType {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Self::Csv,
            Some("tsv") => Self::Tsv,
            Some("json") => Self::Json,
            Some("toml") => Self::Toml,
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::PlainText,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::PlainText => "plain_text",
        }
    }

    /// Decodes `text` into a generic value.
    pub fn decode(self, text: &str) -> Result<Value, String> {
        match self {
            Self::Csv => parse_delimited(text, ',').map(records_to_value),
            Self::Tsv => parse_delimited(text, '\t').map(records_to_value),
            Self::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            Self::Yaml => decode_yaml_documents(text),
            Self::PlainText => Ok(Value::Null),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded data file, as handed to rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Data {
    pub text: String,
    pub value: Value,
    pub file_path: String,
    pub file_type: FileType,
}

/// Turns a data file into [`Data`].
pub trait Decoder: Send + Sync {
    fn decode(&self, fs: &dyn FileSystem, file: &ResolvedDataFile) -> Result<Data, LinterError>;
}

/// Extension-dispatching decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl Decoder for FileDecoder {
    fn decode(&self, fs: &dyn FileSystem, file: &ResolvedDataFile) -> Result<Data, LinterError> {
        let bytes = fs
            .read(&file.abs)
            .map_err(|e| LinterError::decode(&file.abs, e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| LinterError::decode(&file.abs, format!("invalid UTF-8: {e}")))?;

        let file_type = FileType::from_path(&file.abs);
        let value = file_type
            .decode(&text)
            .map_err(|message| LinterError::decode(&file.abs, format!("{file_type}: {message}")))?;

        Ok(Data {
            text,
            value,
            file_path: file.raw.clone(),
            file_type,
        })
    }
}

/// Every document of a YAML stream becomes one element of the returned array.
fn decode_yaml_documents(text: &str) -> Result<Value, String> {
    serde_yaml::Deserializer::from_str(text)
        .map(|document| Value::deserialize(document).map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn records_to_value(records: Vec<Vec<String>>) -> Value {
    Value::Array(
        records
            .into_iter()
            .map(|record| Value::Array(record.into_iter().map(Value::String).collect()))
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    /// Nothing read yet for the current field.
    Start,
    Unquoted,
    Quoted,
    /// Right after the closing quote of a quoted field.
    QuoteClosed,
}

/// Parses comma- or tab-separated records. Quoted fields may contain the
/// separator, newlines and doubled quotes. Blank lines are skipped and every
/// record must have as many fields as the first one.
fn parse_delimited(text: &str, sep: char) -> Result<Vec<Vec<String>>, String> {
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut state = FieldState::Start;
    let mut line = 1usize;
    let mut record_line = 1usize;

    let mut finish_record = |record: &mut Vec<String>, line: usize| -> Result<(), String> {
        if let Some(first) = records.first()
            && first.len() != record.len()
        {
            return Err(format!("record on line {line}: wrong number of fields"));
        }
        records.push(std::mem::take(record));
        Ok(())
    };

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            FieldState::Quoted => match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => state = FieldState::QuoteClosed,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            },
            _ if c == sep => {
                record.push(std::mem::take(&mut field));
                state = FieldState::Start;
            }
            _ if c == '\r' && chars.peek() == Some(&'\n') => {}
            _ if c == '\n' => {
                let blank = state == FieldState::Start && record.is_empty();
                if !blank {
                    record.push(std::mem::take(&mut field));
                    finish_record(&mut record, record_line)?;
                }
                state = FieldState::Start;
                line += 1;
                record_line = line;
            }
            FieldState::Start if c == '"' => state = FieldState::Quoted,
            FieldState::Start | FieldState::Unquoted if c == '"' => {
                return Err(format!("line {line}: bare \" in non-quoted field"));
            }
            FieldState::Start | FieldState::Unquoted => {
                field.push(c);
                state = FieldState::Unquoted;
            }
            FieldState::QuoteClosed => {
                return Err(format!("line {line}: extraneous \" in quoted field"));
            }
        }
    }

    match state {
        FieldState::Quoted => return Err(format!("line {record_line}: unterminated quoted field")),
        FieldState::Start if record.is_empty() => {}
        _ => {
            record.push(field);
            finish_record(&mut record, record_line)?;
        }
    }

    Ok(records)
}
