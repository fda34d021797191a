//! Terminal rendering for stored cases.
//!
//! The case row is shown as a vertical card grouped by section; sources and
//! parties are shown as Arrow pretty tables.

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use arrow::util::pretty::pretty_format_batches;
use precatorio_store::CaseOverview;

// ── Card sections ──

const IDENTITY: &[&str] = &[
    "numero_cnj",
    "titulo_polo_ativo",
    "titulo_polo_passivo",
    "ano_inicio",
    "data_inicio",
];

const ORIGIN: &[&str] = &[
    "estado_origem",
    "unidade_origem_nome",
    "unidade_origem_cidade",
    "unidade_origem_estado",
    "unidade_origem_tribunal_sigla",
];

const ACTIVITY: &[&str] = &[
    "data_ultima_movimentacao",
    "quantidade_movimentacoes",
    "fontes_tribunais_estao_arquivadas",
    "data_ultima_verificacao",
    "tempo_desde_ultima_verificacao",
];

/// Print a stored case: card, then sources and parties tables.
pub fn print_case(overview: &CaseOverview) -> anyhow::Result<()> {
    let Some(batch) = overview.case.iter().find(|b| b.num_rows() > 0) else {
        println!("(no case row)");
        return Ok(());
    };

    let numero = cell(batch, "numero_cnj")?.unwrap_or_default();
    println!("=== {numero} ===");
    println!();

    print_section(batch, "Identity", IDENTITY)?;
    print_section(batch, "Origin", ORIGIN)?;
    print_section(batch, "Activity", ACTIVITY)?;

    print_table("Sources", &overview.sources)?;
    print_table("Parties", &overview.parties)?;
    Ok(())
}

/// Print `(table, rows)` pairs as an aligned list.
pub fn print_counts(counts: &[(&str, usize)]) {
    let width = counts.iter().map(|(t, _)| t.len()).max().unwrap_or(0);
    for (table, rows) in counts {
        println!("  {table:<width$}  {rows:>8}");
    }
}

// ── Rendering ──

fn print_section(batch: &RecordBatch, header: &str, cols: &[&str]) -> anyhow::Result<()> {
    let mut lines = Vec::new();
    for &col_name in cols {
        if let Some(value) = cell(batch, col_name)? {
            lines.push(format!("  {col_name:<34} {value}"));
        }
    }
    if lines.is_empty() {
        return Ok(());
    }
    println!("{header}");
    for line in lines {
        println!("{line}");
    }
    println!();
    Ok(())
}

fn print_table(header: &str, batches: &[RecordBatch]) -> anyhow::Result<()> {
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    println!("{header} ({rows})");
    if rows > 0 {
        println!("{}", pretty_format_batches(batches)?);
    }
    println!();
    Ok(())
}

/// First-row value of a column rendered as text; `None` when absent or null.
fn cell(batch: &RecordBatch, col_name: &str) -> anyhow::Result<Option<String>> {
    let Ok(idx) = batch.schema().index_of(col_name) else {
        return Ok(None);
    };
    let col = batch.column(idx);
    if batch.num_rows() == 0 || col.is_null(0) {
        return Ok(None);
    }
    let formatter = ArrayFormatter::try_new(col.as_ref(), &FormatOptions::default())?;
    Ok(Some(formatter.value(0).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{BooleanArray, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("numero_cnj", DataType::Utf8, false),
            Field::new("ano_inicio", DataType::Int64, true),
            Field::new("fontes_tribunais_estao_arquivadas", DataType::Boolean, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["0001234-56.2020.8.26.0053"])),
                Arc::new(Int64Array::from(vec![None::<i64>])),
                Arc::new(BooleanArray::from(vec![Some(true)])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn cell_formats_values_and_skips_nulls() {
        let batch = batch();
        assert_eq!(
            cell(&batch, "numero_cnj").unwrap().as_deref(),
            Some("0001234-56.2020.8.26.0053")
        );
        assert_eq!(cell(&batch, "ano_inicio").unwrap(), None);
        assert_eq!(
            cell(&batch, "fontes_tribunais_estao_arquivadas").unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(cell(&batch, "missing").unwrap(), None);
    }

    #[test]
    fn empty_overview_prints_without_error() {
        let overview = CaseOverview {
            case: vec![],
            sources: vec![],
            parties: vec![],
        };
        print_case(&overview).unwrap();
    }
}
