//! Tribunal exports: stored case trees flattened into Arrow batches, written as CSV.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use arrow::array::{ArrayRef, StringBuilder};
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use precatorio_core::parse::{digits, format_brl, pad_digits, pad_document, parse_date};
use precatorio_core::schema::export as cols;
use precatorio_store::{DuckStore, StoredAttorney, StoredCase, StoredOab, StoredParty, StoredPerson, StoredSource};
use tracing::info;

/// One output line, one optional cell per schema column.
pub type Row = Vec<Option<String>>;

/// CSV field separator for every export file.
const DELIMITER: u8 = b';';

// ── Arrow / CSV ──

/// Build a `Utf8` batch from rows laid out in schema order.
pub fn to_batch(schema: Schema, rows: &[Row]) -> Result<RecordBatch, ArrowError> {
    let width = schema.fields().len();
    let mut builders: Vec<StringBuilder> = (0..width).map(|_| StringBuilder::new()).collect();
    for row in rows {
        if row.len() != width {
            return Err(ArrowError::InvalidArgumentError(format!(
                "row has {} cells, schema has {width} columns",
                row.len()
            )));
        }
        for (builder, cell) in builders.iter_mut().zip(row) {
            builder.append_option(cell.as_deref());
        }
    }
    let columns: Vec<ArrayRef> = builders
        .into_iter()
        .map(|mut b| Arc::new(b.finish()) as ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::new(schema), columns)
}

fn write_csv(path: &Path, batch: &RecordBatch) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .with_delimiter(DELIMITER)
        .build(file);
    writer.write(batch)?;
    info!(path = %path.display(), rows = batch.num_rows(), "wrote export");
    Ok(())
}

fn load(store: &DuckStore, sigla: &str) -> anyhow::Result<Vec<StoredCase>> {
    let cases = store.load_cases_by_tribunal(sigla)?;
    if cases.is_empty() {
        bail!("no cases found for tribunal {sigla}");
    }
    Ok(cases)
}

// ── Creditor list ──

/// Write the creditor and attorney files for one tribunal; returns the paths written.
pub fn export_creditors(
    store: &DuckStore,
    sigla: &str,
    out_dir: &Path,
    stamp: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    let cases = load(store, sigla)?;
    let (creditors, attorneys) = creditor_rows(&cases);

    let creditors_path = out_dir.join(format!("lista-callix-precatorios_credores_{sigla}_{stamp}.csv"));
    let attorneys_path = out_dir.join(format!("lista-callix-precatorios_advogados_{sigla}_{stamp}.csv"));
    write_csv(&creditors_path, &to_batch(cols::creditors_schema(), &creditors)?)?;
    write_csv(
        &attorneys_path,
        &to_batch(cols::creditor_attorneys_schema(), &attorneys)?,
    )?;
    Ok(vec![creditors_path, attorneys_path])
}

fn parties(case: &StoredCase) -> impl Iterator<Item = &StoredParty> {
    case.sources.iter().flat_map(|s| s.parties.iter())
}

fn is_pole(person: &StoredPerson, polo: &str) -> bool {
    person.polo.as_deref() == Some(polo)
}

/// Precatório type from the tribunal and the defendant's name.
fn precatorio_kind(tribunal: Option<&str>, defendant: Option<&StoredPerson>) -> Option<&'static str> {
    if tribunal.is_some_and(|t| t.starts_with("TRF")) {
        return Some("Federal");
    }
    let name = defendant?.nome.as_deref()?.to_lowercase();
    if name.contains("estado") {
        Some("Estadual")
    } else if name.contains("município") || name.contains("municipio de") {
        Some("Municipal")
    } else {
        None
    }
}

fn claim_value(case: &StoredCase) -> String {
    case.sources
        .iter()
        .filter_map(|s| s.capa.as_ref()?.valor_causa.as_ref())
        .next()
        .and_then(|claim| claim.valor)
        .map(format_brl)
        .unwrap_or_default()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Creditor, defendant and precatório type resolved from one case's parties.
struct Sides<'a> {
    creditor: Option<&'a StoredPerson>,
    defendant: Option<&'a StoredPerson>,
    kind: Option<&'static str>,
}

impl<'a> Sides<'a> {
    fn of(case: &'a StoredCase) -> Self {
        let defendant = parties(case).map(|p| &p.person).find(|p| is_pole(p, "PASSIVO"));
        let creditor = parties(case).map(|p| &p.person).find(|p| {
            is_pole(p, "ATIVO") && p.tipo_normalizado.as_deref() != Some("Advogado")
        });
        let kind = precatorio_kind(case.unidade_origem_tribunal_sigla.as_deref(), defendant);
        Self {
            creditor,
            defendant,
            kind,
        }
    }

    /// Padded document (CNPJ first), name and person type of the creditor.
    fn creditor_cells(&self) -> Row {
        let (document, creditor_kind) = match self.creditor {
            Some(c) => match (non_empty(&c.cnpj), non_empty(&c.cpf)) {
                (Some(cnpj), _) => (Some(cnpj), Some("Pessoa Jurídica")),
                (None, Some(cpf)) => (Some(cpf), Some("Pessoa Física")),
                (None, None) => (None, None),
            },
            None => (None, None),
        };
        vec![
            Some(pad_document(document)),
            self.creditor.and_then(|c| c.nome.clone()),
            creditor_kind.map(str::to_string),
        ]
    }

    fn defendant_cells(&self) -> Row {
        vec![
            self.defendant.and_then(|d| d.nome.clone()),
            Some(pad_document(self.defendant.and_then(|d| d.cnpj.as_deref()))),
        ]
    }
}

/// Attorney cells for every OAB of every ATIVO party's attorney.
fn claimant_attorney_cells(case: &StoredCase) -> impl Iterator<Item = Row> + '_ {
    parties(case)
        .filter(|p| is_pole(&p.person, "ATIVO"))
        .flat_map(|p| p.attorneys.iter())
        .flat_map(|attorney| {
            attorney.oabs.iter().map(move |oab| {
                vec![
                    attorney.person.nome.clone(),
                    Some(pad_digits(attorney.person.cpf.as_deref().unwrap_or_default(), 11)),
                    oab.numero.map(|n| n.to_string()),
                    oab.uf.clone(),
                ]
            })
        })
}

/// Creditor rows (one per case) and attorney rows (one per ATIVO attorney OAB).
pub fn creditor_rows(cases: &[StoredCase]) -> (Vec<Row>, Vec<Row>) {
    let mut creditors = Vec::with_capacity(cases.len());
    let mut attorneys = Vec::new();

    for case in cases {
        let sides = Sides::of(case);
        let mut row = sides.creditor_cells();
        row.extend(sides.defendant_cells());
        row.extend([
            case.estado_origem.clone(),
            case.unidade_origem_cidade
                .clone()
                .filter(|_| sides.kind == Some("Municipal")),
            Some(case.numero_cnj.clone()),
            sides.kind.map(str::to_string),
            case.tipo_regime.clone(),
            Some(claim_value(case)),
        ]);

        for mut line in claimant_attorney_cells(case) {
            line.extend(row.iter().cloned());
            attorneys.push(line);
        }
        creditors.push(row);
    }
    (creditors, attorneys)
}

// ── Precatório report ──

/// Write the precatório report's creditor and attorney files; returns the paths written.
pub fn export_precatorios(
    store: &DuckStore,
    sigla: &str,
    out_dir: &Path,
    stamp: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    let cases = load(store, sigla)?;
    let (creditors, attorneys) = precatorio_rows(&cases);

    let creditors_path = out_dir.join(format!("relatorio_precatorios_credores_{sigla}_{stamp}.csv"));
    let attorneys_path = out_dir.join(format!("relatorio_precatorios_advogados_{sigla}_{stamp}.csv"));
    write_csv(&creditors_path, &to_batch(cols::precatorios_schema(), &creditors)?)?;
    write_csv(
        &attorneys_path,
        &to_batch(cols::precatorio_attorneys_schema(), &attorneys)?,
    )?;
    Ok(vec![creditors_path, attorneys_path])
}

/// ISO date text rendered with a Brazilian pattern.
fn br_date(iso: Option<&str>, pattern: &str) -> Option<String> {
    parse_date(iso?).map(|d| d.format(pattern).to_string())
}

/// Precatório cells shared by both sheets, details columns included.
fn precatorio_cells(case: &StoredCase, sides: &Sides<'_>) -> Row {
    let mut row = sides.defendant_cells();
    row.extend([
        case.estado_origem.clone(),
        case.unidade_origem_cidade.clone(),
        Some(case.numero_cnj.clone()),
        sides.kind.map(str::to_string),
        case.tipo_regime.clone(),
        text(case.ano_orcamentario),
        case.natureza_precatorio.clone(),
        case.valor_deferido.map(format_brl),
        br_date(case.data_base_calculo.as_deref(), "%m/%Y"),
        br_date(case.data_expedicao.as_deref(), "%d/%m/%Y"),
    ]);
    row
}

/// Creditor rows (one per case) and attorney rows (one per ATIVO attorney OAB),
/// both carrying the imported details.
pub fn precatorio_rows(cases: &[StoredCase]) -> (Vec<Row>, Vec<Row>) {
    let mut creditors = Vec::with_capacity(cases.len());
    let mut attorneys = Vec::new();

    for case in cases {
        let sides = Sides::of(case);
        let details = precatorio_cells(case, &sides);

        for mut line in claimant_attorney_cells(case) {
            line.extend(details.iter().cloned());
            attorneys.push(line);
        }
        let mut row = sides.creditor_cells();
        row.extend(details);
        creditors.push(row);
    }
    (creditors, attorneys)
}

// ── Claimants and attorneys ──

/// Write the claimant and attorney files for one tribunal; returns the paths written.
pub fn export_parties(
    store: &DuckStore,
    sigla: &str,
    out_dir: &Path,
    stamp: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    let cases = load(store, sigla)?;
    let (claimants, attorneys) = party_rows(&cases);

    let claimants_path = out_dir.join(format!("requerentes-advogados_requerentes_{sigla}_{stamp}.csv"));
    let attorneys_path = out_dir.join(format!("requerentes-advogados_advogados_{sigla}_{stamp}.csv"));
    write_csv(&claimants_path, &to_batch(cols::claimants_schema(), &claimants)?)?;
    write_csv(&attorneys_path, &to_batch(cols::attorneys_schema(), &attorneys)?)?;
    Ok(vec![claimants_path, attorneys_path])
}

/// One flattened case × source × party × attorney × OAB line.
struct FlatRow {
    case: Row,
    party: Row,
    attorney: Row,
}

fn blank(n: usize) -> Row {
    vec![None; n]
}

fn text<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn case_cells(case: &StoredCase, source: Option<&StoredSource>) -> Row {
    let related = case.related_numbers.join(", ");
    let capa = source.and_then(|s| s.capa.as_ref());
    vec![
        Some(case.numero_cnj.clone()),
        text(case.ano_inicio),
        case.data_inicio.clone(),
        case.estado_origem.clone(),
        case.unidade_origem_nome.clone(),
        case.unidade_origem_cidade.clone(),
        case.unidade_origem_estado.clone(),
        case.unidade_origem_tribunal_sigla.clone(),
        case.data_ultima_movimentacao.clone(),
        text(case.quantidade_movimentacoes),
        text(case.fontes_tribunais_estao_arquivadas),
        case.data_ultima_verificacao.clone(),
        case.tempo_desde_ultima_verificacao.clone(),
        (!related.is_empty()).then_some(related),
        source.and_then(|s| s.sigla.clone()),
        source.and_then(|s| s.data_inicio.clone()),
        source.and_then(|s| s.sistema.clone()),
        text(source.and_then(|s| s.quantidade_envolvidos)),
        capa.and_then(|c| c.classe.clone()),
        capa.and_then(|c| c.assunto.clone()),
        capa.and_then(|c| c.valor_causa.as_ref()?.valor_formatado.clone()),
    ]
}

fn party_cells(person: &StoredPerson) -> Row {
    vec![
        person.nome.clone(),
        person.tipo_normalizado.clone(),
        person.cpf.clone(),
        person.cnpj.clone(),
        person.tipo_pessoa.clone(),
    ]
}

fn oab_text(oab: Option<&StoredOab>) -> Option<String> {
    let oab = oab?;
    match (oab.numero, non_empty(&oab.uf)) {
        (Some(numero), Some(uf)) => Some(format!("{numero}/{uf}")),
        _ => None,
    }
}

fn attorney_cells(attorney: &StoredAttorney, oab: Option<&StoredOab>) -> Row {
    vec![
        attorney.person.nome.clone(),
        attorney.person.tipo_normalizado.clone(),
        oab_text(oab),
        attorney.person.cpf.clone(),
        attorney.person.cnpj.clone(),
        attorney.person.tipo_pessoa.clone(),
    ]
}

fn is_claimant(person: &StoredPerson) -> bool {
    matches!(person.tipo_normalizado.as_deref(), Some("Requerente" | "Autor"))
}

fn flatten(case: &StoredCase, out: &mut Vec<FlatRow>) {
    let no_party = || blank(cols::PARTY_COLUMNS.len());
    let no_attorney = || blank(cols::ATTORNEY_COLUMNS.len());

    if case.sources.is_empty() {
        out.push(FlatRow {
            case: case_cells(case, None),
            party: no_party(),
            attorney: no_attorney(),
        });
        return;
    }

    for source in &case.sources {
        let common = case_cells(case, Some(source));
        if source.parties.is_empty() {
            out.push(FlatRow {
                case: common,
                party: no_party(),
                attorney: no_attorney(),
            });
            continue;
        }
        for party in &source.parties {
            if !is_claimant(&party.person) {
                out.push(FlatRow {
                    case: common.clone(),
                    party: no_party(),
                    attorney: no_attorney(),
                });
                continue;
            }
            if party.attorneys.is_empty() {
                out.push(FlatRow {
                    case: common.clone(),
                    party: party_cells(&party.person),
                    attorney: no_attorney(),
                });
                continue;
            }
            for attorney in &party.attorneys {
                let oabs: Vec<Option<&StoredOab>> = if attorney.oabs.is_empty() {
                    vec![None]
                } else {
                    attorney.oabs.iter().map(Some).collect()
                };
                for oab in oabs {
                    out.push(FlatRow {
                        case: common.clone(),
                        party: party_cells(&party.person),
                        attorney: attorney_cells(attorney, oab),
                    });
                }
            }
        }
    }
}

/// Keep the first row per (case number, CPF digits); rows without a CPF follow, untouched.
fn dedupe_by_cpf(rows: Vec<Row>, cnj_idx: usize, cpf_idx: usize) -> Vec<Row> {
    let mut seen = HashSet::new();
    let (mut with_cpf, without_cpf): (Vec<Row>, Vec<Row>) = rows
        .into_iter()
        .partition(|row| row[cpf_idx].as_deref().is_some_and(|c| !digits(c).is_empty()));
    with_cpf.retain(|row| {
        let cnj = row[cnj_idx].clone().unwrap_or_default();
        let cpf = row[cpf_idx].as_deref().map(digits).unwrap_or_default();
        seen.insert((cnj, cpf))
    });
    with_cpf.extend(without_cpf);
    with_cpf
}

/// Claimant and attorney rows, each deduplicated on its own CPF column.
pub fn party_rows(cases: &[StoredCase]) -> (Vec<Row>, Vec<Row>) {
    let mut flat = Vec::new();
    for case in cases {
        flatten(case, &mut flat);
    }

    let mut claimants = Vec::with_capacity(flat.len());
    let mut attorneys = Vec::with_capacity(flat.len());
    for FlatRow { case, party, attorney } in flat {
        let mut claimant: Row = Vec::with_capacity(case.len() + party.len());
        claimant.push(case[0].clone());
        claimant.extend(party);
        claimant.extend(case[1..].iter().cloned());
        claimants.push(claimant);

        let mut line = attorney;
        line.extend(case);
        attorneys.push(line);
    }

    // envolvido_cpf sits after the case number and two party columns.
    let claimants = dedupe_by_cpf(claimants, 0, 3);
    let attorneys = dedupe_by_cpf(attorneys, cols::ATTORNEY_COLUMNS.len(), 3);
    (claimants, attorneys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use precatorio_store::{StoredClaim, StoredCover};
    use rust_decimal::Decimal;

    fn person(nome: &str, polo: &str, tipo: &str) -> StoredPerson {
        StoredPerson {
            nome: Some(nome.into()),
            polo: Some(polo.into()),
            tipo_normalizado: Some(tipo.into()),
            ..Default::default()
        }
    }

    fn attorney(nome: &str, cpf: Option<&str>, oabs: Vec<StoredOab>) -> StoredAttorney {
        StoredAttorney {
            person: StoredPerson {
                nome: Some(nome.into()),
                tipo_normalizado: Some("Advogado".into()),
                cpf: cpf.map(Into::into),
                ..Default::default()
            },
            oabs,
        }
    }

    fn oab(numero: i64, uf: &str) -> StoredOab {
        StoredOab {
            uf: Some(uf.into()),
            tipo: Some("ADVOGADO".into()),
            numero: Some(numero),
        }
    }

    fn sample_case() -> StoredCase {
        let mut creditor = person("Maria", "ATIVO", "Requerente");
        creditor.cpf = Some("1234567890".into());
        let mut defendant = person("Município de Campinas", "PASSIVO", "Requerido");
        defendant.cnpj = Some("51.885.242/0001-40".into());

        StoredCase {
            id: 1,
            numero_cnj: "0001234-56.2020.8.26.0053".into(),
            ano_inicio: Some(2020),
            estado_origem: Some("SP".into()),
            unidade_origem_cidade: Some("Campinas".into()),
            unidade_origem_tribunal_sigla: Some("TJSP".into()),
            fontes_tribunais_estao_arquivadas: Some(false),
            tipo_regime: Some("Especial".into()),
            related_numbers: vec!["1".into(), "2".into()],
            sources: vec![StoredSource {
                id: 1,
                sigla: Some("TJSP".into()),
                capa: Some(StoredCover {
                    classe: Some("Precatório".into()),
                    assunto: None,
                    valor_causa: Some(StoredClaim {
                        valor: Some(Decimal::new(123456, 2)),
                        valor_formatado: Some("R$ 1.234,56".into()),
                    }),
                }),
                parties: vec![
                    StoredParty {
                        person: creditor,
                        attorneys: vec![attorney(
                            "Dr. Silva",
                            Some("987.654.321-00"),
                            vec![oab(12345, "SP"), oab(999, "RJ")],
                        )],
                    },
                    StoredParty {
                        person: defendant,
                        attorneys: vec![],
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn cell(row: &Row, schema: &Schema, name: &str) -> Option<String> {
        row[schema.index_of(name).unwrap()].clone()
    }

    #[test]
    fn creditor_row_resolves_parties_and_kind() {
        let (creditors, attorneys) = creditor_rows(&[sample_case()]);
        let schema = cols::creditors_schema();
        let row = &creditors[0];

        assert_eq!(cell(row, &schema, "CNPJ / CPF do Credor").as_deref(), Some("01234567890"));
        assert_eq!(cell(row, &schema, "Nome do Credor").as_deref(), Some("Maria"));
        assert_eq!(cell(row, &schema, "Tipo do Credor").as_deref(), Some("Pessoa Física"));
        assert_eq!(cell(row, &schema, "CNPJ do Réu").as_deref(), Some("51885242000140"));
        assert_eq!(cell(row, &schema, "Tipo do Precatório").as_deref(), Some("Municipal"));
        assert_eq!(cell(row, &schema, "Município do Precatório").as_deref(), Some("Campinas"));
        assert_eq!(cell(row, &schema, "Tipo do Regime").as_deref(), Some("Especial"));
        assert_eq!(cell(row, &schema, "Valor da Causa").as_deref(), Some("R$ 1.234,56"));

        assert_eq!(attorneys.len(), 2);
        let schema = cols::creditor_attorneys_schema();
        assert_eq!(cell(&attorneys[0], &schema, "CPF do Advogado").as_deref(), Some("98765432100"));
        assert_eq!(cell(&attorneys[0], &schema, "OAB").as_deref(), Some("12345"));
        assert_eq!(cell(&attorneys[1], &schema, "Estado da OAB").as_deref(), Some("RJ"));
        assert_eq!(
            cell(&attorneys[1], &schema, "Nome do Credor").as_deref(),
            Some("Maria")
        );
    }

    #[test]
    fn precatorio_rows_carry_details() {
        let mut case = sample_case();
        case.ano_orcamentario = Some(2025);
        case.natureza_precatorio = Some("Alimentar".into());
        case.valor_deferido = Some(Decimal::new(15000025, 2));
        case.data_base_calculo = Some("2021-07-01".into());
        case.data_expedicao = Some("2022-03-15".into());

        let (creditors, attorneys) = precatorio_rows(&[case]);
        let schema = cols::precatorios_schema();
        let row = &creditors[0];
        assert_eq!(row.len(), schema.fields().len());
        assert_eq!(cell(row, &schema, "CNPJ / CPF do Credor").as_deref(), Some("01234567890"));
        assert_eq!(cell(row, &schema, "Nome do Réu").as_deref(), Some("Município de Campinas"));
        assert_eq!(cell(row, &schema, "Tipo do Precatório").as_deref(), Some("Municipal"));
        assert_eq!(cell(row, &schema, "Ano orçamentário").as_deref(), Some("2025"));
        assert_eq!(cell(row, &schema, "Natureza do Precatório").as_deref(), Some("Alimentar"));
        assert_eq!(cell(row, &schema, "Valor Deferido").as_deref(), Some("R$ 150.000,25"));
        assert_eq!(
            cell(row, &schema, "Data base do cálculo homologado").as_deref(),
            Some("07/2021")
        );
        assert_eq!(
            cell(row, &schema, "Data de expedição do Precatório").as_deref(),
            Some("15/03/2022")
        );

        let schema = cols::precatorio_attorneys_schema();
        assert_eq!(attorneys.len(), 2);
        assert_eq!(attorneys[0].len(), schema.fields().len());
        assert_eq!(cell(&attorneys[0], &schema, "CPF do Advogado").as_deref(), Some("98765432100"));
        assert_eq!(cell(&attorneys[1], &schema, "OAB").as_deref(), Some("999"));
        assert_eq!(cell(&attorneys[1], &schema, "Valor Deferido").as_deref(), Some("R$ 150.000,25"));
    }

    #[test]
    fn precatorio_city_is_kept_for_every_kind() {
        let mut case = sample_case();
        case.sources[0].parties[1].person.nome = Some("Estado de São Paulo".into());
        let (creditors, _) = precatorio_rows(&[case.clone()]);
        let schema = cols::precatorios_schema();
        assert_eq!(cell(&creditors[0], &schema, "Tipo do Precatório").as_deref(), Some("Estadual"));
        assert_eq!(cell(&creditors[0], &schema, "Município do Precatório").as_deref(), Some("Campinas"));
        assert_eq!(cell(&creditors[0], &schema, "Valor Deferido"), None);

        let (callix, _) = creditor_rows(&[case]);
        let schema = cols::creditors_schema();
        assert_eq!(cell(&callix[0], &schema, "Município do Precatório"), None);
    }

    #[test]
    fn federal_tribunal_wins_over_defendant_name() {
        let defendant = person("Estado de São Paulo", "PASSIVO", "Requerido");
        assert_eq!(precatorio_kind(Some("TRF3"), Some(&defendant)), Some("Federal"));
        assert_eq!(precatorio_kind(Some("TJSP"), Some(&defendant)), Some("Estadual"));
        assert_eq!(
            precatorio_kind(Some("TJSP"), Some(&person("INSS", "PASSIVO", "Requerido"))),
            None
        );
        assert_eq!(precatorio_kind(Some("TJSP"), None), None);
    }

    #[test]
    fn case_without_parties_still_gets_a_creditor_row() {
        let case = StoredCase {
            numero_cnj: "X".into(),
            ..Default::default()
        };
        let (creditors, attorneys) = creditor_rows(&[case]);
        assert_eq!(creditors.len(), 1);
        assert!(attorneys.is_empty());
        let schema = cols::creditors_schema();
        assert_eq!(cell(&creditors[0], &schema, "CNPJ / CPF do Credor").as_deref(), Some(""));
        assert_eq!(cell(&creditors[0], &schema, "Valor da Causa").as_deref(), Some(""));
        assert_eq!(cell(&creditors[0], &schema, "Tipo do Credor"), None);
    }

    #[test]
    fn party_rows_flatten_attorneys_and_oabs() {
        let (claimants, attorneys) = party_rows(&[sample_case()]);
        let schema = cols::claimants_schema();

        // Two OAB lines share one claimant CPF and collapse; the defendant line has no CPF.
        assert_eq!(claimants.len(), 2);
        assert_eq!(cell(&claimants[0], &schema, "envolvido_nome").as_deref(), Some("Maria"));
        assert_eq!(
            cell(&claimants[0], &schema, "processo_relacionado_numero").as_deref(),
            Some("1, 2")
        );
        assert_eq!(
            cell(&claimants[0], &schema, "processo_fontes_tribunais_estao_arquivadas").as_deref(),
            Some("false")
        );
        assert_eq!(cell(&claimants[0], &schema, "capa_valor_causa").as_deref(), Some("R$ 1.234,56"));
        assert_eq!(cell(&claimants[1], &schema, "envolvido_nome"), None);

        let schema = cols::attorneys_schema();
        assert_eq!(attorneys.len(), 2);
        assert_eq!(cell(&attorneys[0], &schema, "advogado_oab").as_deref(), Some("12345/SP"));
        assert_eq!(cell(&attorneys[1], &schema, "advogado_nome"), None);
    }

    #[test]
    fn rows_without_cpf_are_kept_after_deduplicated_rows() {
        let rows: Vec<Row> = vec![
            vec![Some("A".into()), Some("x".into()), None, None],
            vec![Some("A".into()), Some("y".into()), None, Some("111".into())],
            vec![Some("A".into()), Some("z".into()), None, Some("1.1.1".into())],
            vec![Some("B".into()), Some("w".into()), None, Some("111".into())],
            vec![Some("A".into()), Some("v".into()), None, Some("--".into())],
        ];
        let names: Vec<_> = dedupe_by_cpf(rows, 0, 3)
            .into_iter()
            .map(|r| r[1].clone().unwrap())
            .collect();
        assert_eq!(names, vec!["y", "w", "x", "v"]);
    }

    #[test]
    fn case_without_sources_yields_one_base_row() {
        let case = StoredCase {
            numero_cnj: "X".into(),
            ..Default::default()
        };
        let (claimants, attorneys) = party_rows(&[case]);
        assert_eq!(claimants.len(), 1);
        assert_eq!(attorneys.len(), 1);
        assert_eq!(claimants[0].len(), cols::claimants_schema().fields().len());
        assert_eq!(attorneys[0].len(), cols::attorneys_schema().fields().len());
    }

    #[test]
    fn oab_needs_number_and_state() {
        assert_eq!(oab_text(Some(&oab(1, "SP"))).as_deref(), Some("1/SP"));
        let partial = StoredOab {
            numero: Some(1),
            ..Default::default()
        };
        assert_eq!(oab_text(Some(&partial)), None);
        assert_eq!(oab_text(None), None);
    }

    #[test]
    fn batch_rejects_ragged_rows() {
        let schema = cols::utf8_schema(["a", "b"]);
        assert!(to_batch(schema.clone(), &[vec![None]]).is_err());
        let batch = to_batch(schema, &[vec![Some("1".into()), None]]).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.column(1).null_count(), 1);
    }

    #[test]
    fn empty_tribunal_is_an_error() {
        let store = DuckStore::open().unwrap();
        let tmp = tempfile::TempDir::new().unwrap();
        let err = export_creditors(&store, "TJXX", tmp.path(), "20240101000000").unwrap_err();
        assert!(err.to_string().contains("no cases found for tribunal"));
    }

    #[test]
    fn creditor_files_are_semicolon_separated() {
        let store = DuckStore::open().unwrap();
        let record: precatorio_core::CaseRecord = serde_json::from_value(serde_json::json!({
            "numero_cnj": "0001234-56.2020.8.26.0053",
            "estado_origem": {"sigla": "SP"},
            "unidade_origem": {"tribunal_sigla": "TJSP", "cidade": "São Paulo"},
            "fontes": []
        }))
        .unwrap();
        let mut session = store.duck_session().unwrap();
        precatorio_store::persist_case(&mut session, &record).unwrap();

        let tmp = tempfile::TempDir::new().unwrap();
        let paths = export_creditors(&store, "TJSP", tmp.path(), "20240101000000").unwrap();
        assert!(paths[0].ends_with("lista-callix-precatorios_credores_TJSP_20240101000000.csv"));

        let text = std::fs::read_to_string(&paths[0]).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("CNPJ / CPF do Credor;Nome do Credor;"));
        assert!(lines.next().unwrap().contains(";SP;;0001234-56.2020.8.26.0053;"));
    }

    #[test]
    fn precatorio_report_reads_imported_details() {
        let store = DuckStore::open().unwrap();
        let record: precatorio_core::CaseRecord = serde_json::from_value(serde_json::json!({
            "numero_cnj": "0001234-56.2020.8.26.0053",
            "estado_origem": {"sigla": "SP"},
            "unidade_origem": {"tribunal_sigla": "TJSP", "cidade": "São Paulo"},
            "fontes": [{"envolvidos": [{"nome": "Estado de São Paulo", "polo": "PASSIVO"}]}]
        }))
        .unwrap();
        let mut session = store.duck_session().unwrap();
        precatorio_store::persist_case(&mut session, &record).unwrap();
        store
            .import_details(&[precatorio_store::DetailsRow {
                numero: "0001234-56.2020.8.26.0053".into(),
                tipo_regime: Some("Especial".into()),
                valor_deferido: Some("R$ 1.500".into()),
                data_expedicao: Some("15/03/2022".into()),
                ..Default::default()
            }])
            .unwrap();

        let tmp = tempfile::TempDir::new().unwrap();
        let paths = export_precatorios(&store, "TJSP", tmp.path(), "20240101000000").unwrap();
        assert!(paths[0].ends_with("relatorio_precatorios_credores_TJSP_20240101000000.csv"));
        assert!(paths[1].ends_with("relatorio_precatorios_advogados_TJSP_20240101000000.csv"));

        let text = std::fs::read_to_string(&paths[0]).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("CNPJ / CPF do Credor;Nome do Credor;Tipo do Credor;Nome do Réu;"));
        let row = lines.next().unwrap();
        assert!(row.contains(";SP;São Paulo;0001234-56.2020.8.26.0053;Estadual;Especial;"));
        assert!(row.contains("R$ 1.500,00"));
        assert!(row.ends_with(";15/03/2022"));
    }
}
