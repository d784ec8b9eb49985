//! Dataset loading with encoding and delimiter auto-detection.
//!
//! A dataset is always read against a declared [`DataStructure`]: CSV
//! columns are matched by header name (extra columns are ignored), cells are
//! parsed as their component type and empty cells become null. Inline JSON
//! rows are either positional arrays or objects keyed by column name.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LoadError, LoadResult};
use crate::model::{DataStructure, Dataset, Row, Value, ValueType};

/// Where a program's input dataset comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub structure: DataStructure,
    /// CSV file, relative to the program file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<serde_json::Value>>,
}

impl DatasetSource {
    pub fn load(&self, name: &str, base_dir: &Path) -> LoadResult<Dataset> {
        match (&self.csv, &self.rows) {
            (Some(path), _) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                Ok(parse_csv_file_auto(path, &self.structure)?.dataset)
            }
            (None, Some(rows)) => rows_from_json(rows, &self.structure),
            (None, None) => Err(LoadError::NoSource(name.to_string())),
        }
    }
}

/// A loaded CSV and what was detected while reading it.
#[derive(Debug, Clone)]
pub struct CsvDataset {
    pub dataset: Dataset,
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
}

// =============================================================================
// Detection
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string. Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> LoadResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("content is not valid UTF-8 ({}), decoding lossily", e);
                String::from_utf8_lossy(bytes).into_owned()
            }
        },
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(encoding) => {
                let (text, _, had_errors) = encoding.decode(bytes);
                if had_errors {
                    return Err(LoadError::Encoding(format!("invalid {} content", other)));
                }
                text.into_owned()
            }
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };
    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");
    let mut best = (';', 0);
    for sep in [';', ',', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best.1 {
            best = (sep, count);
        }
    }
    best.0
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse one CSV cell as `value_type`; empty cells are null.
pub fn parse_cell(raw: &str, value_type: &ValueType) -> Result<Value, String> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    match value_type {
        ValueType::String => Ok(Value::String(raw.to_string())),
        ValueType::Int64 => raw
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| format!("not a Long: {}", e)),
        ValueType::Float64 => raw
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| format!("not a Double: {}", e)),
        ValueType::Boolean => match raw.to_lowercase().as_str() {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err("not a Boolean".to_string()),
        },
        other => Err(format!("{} columns cannot be loaded", other)),
    }
}

/// Parse CSV text into a dataset of `structure`.
pub fn parse_csv(content: &str, delimiter: char, structure: &DataStructure) -> LoadResult<Dataset> {
    Ok(parse_with_headers(content, delimiter, structure)?.0)
}

fn parse_with_headers(
    content: &str,
    delimiter: char,
    structure: &DataStructure,
) -> LoadResult<(Dataset, Vec<String>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(LoadError::EmptyFile);
    }
    let positions = structure
        .components()
        .map(|c| {
            headers
                .iter()
                .position(|h| h == &c.name)
                .ok_or_else(|| LoadError::MissingColumn(c.name.clone()))
        })
        .collect::<LoadResult<Vec<_>>>()?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row = structure
            .components()
            .zip(&positions)
            .map(|(component, &position)| {
                let raw = record.get(position).unwrap_or("");
                parse_cell(raw, &component.value_type).map_err(|message| LoadError::InvalidValue {
                    line,
                    column: component.name.clone(),
                    value: raw.to_string(),
                    message,
                })
            })
            .collect::<LoadResult<Row>>()?;
        rows.push(row);
    }

    Ok((Dataset::new(structure.clone(), rows)?, headers))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], structure: &DataStructure) -> LoadResult<CsvDataset> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let (dataset, headers) = parse_with_headers(&content, delimiter, structure)?;
    log::debug!(
        "loaded {} row(s) ({}, delimiter {:?})",
        dataset.len(),
        encoding,
        delimiter
    );
    Ok(CsvDataset {
        dataset,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P, structure: &DataStructure) -> LoadResult<CsvDataset> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes, structure)
}

/// Build a dataset from inline JSON rows.
pub fn rows_from_json(rows: &[serde_json::Value], structure: &DataStructure) -> LoadResult<Dataset> {
    let mut parsed = Vec::with_capacity(rows.len());
    for (index, json) in rows.iter().enumerate() {
        let cells: Vec<&serde_json::Value> = match json {
            serde_json::Value::Array(values) => {
                if values.len() != structure.len() {
                    return Err(LoadError::RowWidth {
                        row: index,
                        found: values.len(),
                        expected: structure.len(),
                    });
                }
                values.iter().collect()
            }
            serde_json::Value::Object(map) => structure
                .components()
                .map(|c| map.get(&c.name).unwrap_or(&serde_json::Value::Null))
                .collect(),
            other => {
                return Err(LoadError::InvalidValue {
                    line: index,
                    column: String::new(),
                    value: other.to_string(),
                    message: "a row must be an array or an object".to_string(),
                })
            }
        };
        let row = cells
            .into_iter()
            .zip(structure.components())
            .map(|(cell, component)| {
                Value::from_json(cell, &component.value_type).map_err(|message| {
                    LoadError::InvalidValue {
                        line: index,
                        column: component.name.clone(),
                        value: cell.to_string(),
                        message,
                    }
                })
            })
            .collect::<LoadResult<Row>>()?;
        parsed.push(row);
    }
    Ok(Dataset::new(structure.clone(), parsed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Component;
    use serde_json::json;
    use std::io::Write;

    fn structure() -> DataStructure {
        DataStructure::new(vec![
            Component::identifier("id", ValueType::String),
            Component::measure("long1", ValueType::Int64),
            Component::measure("double1", ValueType::Float64),
        ])
        .unwrap()
    }

    #[test]
    fn test_parse_typed_csv() {
        let csv = "id;long1;double1\nToto;30;1.5\nHadrien;;2";
        let ds = parse_csv(csv, ';', &structure()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(0, "long1"), Some(&Value::Int64(30)));
        assert_eq!(ds.get(1, "long1"), Some(&Value::Null));
        assert_eq!(ds.get(1, "double1"), Some(&Value::Float64(2.0)));
    }

    #[test]
    fn test_columns_matched_by_header() {
        let csv = "double1,extra,id,long1\n1.0,x,A,1";
        let ds = parse_csv(csv, ',', &structure()).unwrap();
        assert_eq!(
            ds.rows()[0],
            vec![Value::from("A"), Value::Int64(1), Value::Float64(1.0)]
        );
    }

    #[test]
    fn test_quoted_values() {
        let csv = "id;long1;double1\n\"Hello; World\";1;1";
        let ds = parse_csv(csv, ';', &structure()).unwrap();
        assert_eq!(ds.get(0, "id"), Some(&Value::from("Hello; World")));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = "id;long1;double1\nA;1;1\n\nB;2;2\n";
        assert_eq!(parse_csv(csv, ';', &structure()).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_column() {
        let err = parse_csv("id;long1\nA;1", ';', &structure()).unwrap_err();
        assert_eq!(err.to_string(), "Missing column 'double1' in CSV header");
    }

    #[test]
    fn test_invalid_value_message() {
        let err = parse_csv("id;long1;double1\nA;abc;1", ';', &structure()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Line 2"));
        assert!(msg.contains("column 'long1'"));
        assert!(msg.contains("value 'abc'"));
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_csv("", ';', &structure()), Err(LoadError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_json_rows() {
        let rows = vec![json!(["A", 1, 2]), json!({"id": "B", "double1": 0.5})];
        let ds = rows_from_json(&rows, &structure()).unwrap();
        assert_eq!(ds.get(0, "double1"), Some(&Value::Float64(2.0)));
        assert_eq!(ds.get(1, "long1"), Some(&Value::Null));

        let err = rows_from_json(&[json!(["A", 1])], &structure()).unwrap_err();
        assert!(matches!(err, LoadError::RowWidth { found: 2, expected: 3, .. }));
    }

    #[test]
    fn test_source_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("ds.csv")).unwrap();
        writeln!(file, "id,long1,double1").unwrap();
        writeln!(file, "Toto,30,1.0").unwrap();
        let source = DatasetSource {
            structure: structure(),
            csv: Some(PathBuf::from("ds.csv")),
            rows: None,
        };
        let ds = source.load("ds", dir.path()).unwrap();
        assert_eq!(ds.get(0, "id"), Some(&Value::from("Toto")));

        let empty = DatasetSource {
            structure: structure(),
            csv: None,
            rows: None,
        };
        assert!(matches!(empty.load("ds", dir.path()), Err(LoadError::NoSource(_))));
    }
}
