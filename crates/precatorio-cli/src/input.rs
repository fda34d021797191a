//! Spreadsheet input: CSV or Excel files with a `numero` column.
//!
//! CSV files are decoded from whatever encoding they were saved in; Excel
//! exports from Windows are usually Windows-1252 rather than UTF-8.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, bail};
use calamine::{Data, Reader, open_workbook_auto};
use chardetng::EncodingDetector;
use csv::StringRecord;
use encoding_rs::Encoding;
use precatorio_core::format_cnj;
use precatorio_store::DetailsRow;
use tracing::debug;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls"];

/// Decode file bytes to text, honouring a BOM and guessing otherwise.
pub fn decode(bytes: &[u8]) -> String {
    let encoding = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => encoding,
        None => {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        }
    };
    let (text, used, had_errors) = encoding.decode(bytes);
    debug!(encoding = used.name(), had_errors, "decoded spreadsheet");
    text.into_owned()
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)))
}

/// Text of one worksheet cell.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        // Amounts are read back with the comma as decimal mark.
        Data::Float(f) => f.to_string().replace('.', ","),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Pick the delimiter that occurs most often in the header line.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    // Ties go to the earlier candidate.
    [(b',', 2), (b';', 1), (b'\t', 0)]
        .into_iter()
        .max_by_key(|(d, priority)| (header.bytes().filter(|b| b == d).count(), *priority))
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// A whole CSV file in memory.
pub struct Table {
    pub delimiter: u8,
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl Table {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        if is_workbook(path) {
            return Self::read_workbook(path)
                .with_context(|| format!("reading workbook {}", path.display()));
        }
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&decode(&bytes)).with_context(|| format!("parsing {}", path.display()))
    }

    /// First worksheet; its first row is the header.
    fn read_workbook(path: &Path) -> anyhow::Result<Self> {
        let mut workbook = open_workbook_auto(path)?;
        let Some(range) = workbook.worksheet_range_at(0) else {
            bail!("workbook has no sheets");
        };
        let range = range?;
        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<StringRecord>());
        let headers = rows.next().unwrap_or_default();
        Ok(Self {
            delimiter: b';',
            headers,
            rows: rows.collect(),
        })
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let delimiter = sniff_delimiter(text);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            delimiter,
            headers,
            rows,
        })
    }

    /// Index of a column, matched case-insensitively after trimming.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    pub fn require(&self, name: &str) -> anyhow::Result<usize> {
        match self.column(name) {
            Some(idx) => Ok(idx),
            None => bail!("missing '{name}' column"),
        }
    }
}

/// Trimmed, non-empty cell value.
fn cell(row: &StringRecord, idx: Option<usize>) -> Option<String> {
    let value = row.get(idx?)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Raw case numbers from the `numero` column, in file order.
pub fn read_numbers(path: &Path) -> anyhow::Result<Vec<String>> {
    let table = Table::read(path)?;
    let idx = table.require("numero")?;
    Ok(table
        .rows
        .iter()
        .filter_map(|row| cell(row, Some(idx)))
        .collect())
}

/// Details rows keyed by formatted case number, first occurrence wins.
pub fn read_details(path: &Path) -> anyhow::Result<Vec<DetailsRow>> {
    details_from_table(&Table::read(path)?)
}

fn details_from_table(table: &Table) -> anyhow::Result<Vec<DetailsRow>> {
    let numero = table.require("numero")?;
    let tipo_regime = table.column("tipo_regime");
    let ano = table.column("ano_orcamentario");
    let natureza = table.column("natureza_precatorio");
    let valor = table.column("valor_deferido");
    let base = table.column("data_base_calculo");
    let expedicao = table.column("data_expedicao");

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for row in &table.rows {
        let Some(raw) = cell(row, Some(numero)) else {
            continue;
        };
        let numero = format_cnj(&raw);
        if !seen.insert(numero.clone()) {
            continue;
        }
        rows.push(DetailsRow {
            numero,
            tipo_regime: cell(row, tipo_regime),
            ano_orcamentario: cell(row, ano),
            natureza_precatorio: cell(row, natureza),
            valor_deferido: cell(row, valor),
            data_base_calculo: cell(row, base),
            data_expedicao: cell(row, expedicao),
        });
    }
    Ok(rows)
}

/// Rewrite `input` into `output` keeping the first row per raw `numero` value.
///
/// Returns `(rows read, rows written)`.
pub fn dedupe(input: &Path, output: &Path) -> anyhow::Result<(usize, usize)> {
    let table = Table::read(input)?;
    let idx = table.require("numero")?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(table.delimiter)
        .flexible(true)
        .from_path(output)
        .with_context(|| format!("creating {}", output.display()))?;
    writer.write_record(&table.headers)?;

    let mut seen = HashSet::new();
    let mut written = 0;
    for row in &table.rows {
        let key = row.get(idx).unwrap_or_default();
        if seen.insert(key.to_string()) {
            writer.write_record(row)?;
            written += 1;
        }
    }
    writer.flush()?;
    Ok((table.rows.len(), written))
}
