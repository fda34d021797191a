//! Precatório details (regime, budget year, deferred amount) keyed by case number.

use precatorio_core::parse::{fits_money_column, parse_brl, parse_loose_date, parse_month_year};
use tracing::warn;

use crate::NewPrecatorioDetails;

/// One spreadsheet row, still as text. `numero` is already normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailsRow {
    pub numero: String,
    pub tipo_regime: Option<String>,
    pub ano_orcamentario: Option<String>,
    pub natureza_precatorio: Option<String>,
    pub valor_deferido: Option<String>,
    pub data_base_calculo: Option<String>,
    pub data_expedicao: Option<String>,
}

impl DetailsRow {
    /// Coerce the text fields; anything unparseable becomes NULL with a warning.
    pub fn to_entity(&self, processo_id: i64) -> NewPrecatorioDetails {
        let numero = self.numero.as_str();
        NewPrecatorioDetails {
            processo_id,
            tipo_regime: non_empty(&self.tipo_regime).map(str::to_string),
            ano_orcamentario: coerce(numero, "ano_orcamentario", &self.ano_orcamentario, |s| {
                s.parse().ok()
            }),
            natureza_precatorio: non_empty(&self.natureza_precatorio).map(str::to_string),
            valor_deferido: coerce(numero, "valor_deferido", &self.valor_deferido, |s| {
                parse_brl(s).filter(fits_money_column)
            }),
            data_base_calculo: coerce(
                numero,
                "data_base_calculo",
                &self.data_base_calculo,
                parse_month_year,
            ),
            data_expedicao: coerce(numero, "data_expedicao", &self.data_expedicao, parse_loose_date),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn coerce<T>(
    numero: &str,
    field: &'static str,
    raw: &Option<String>,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = non_empty(raw)?;
    let parsed = parse(raw);
    if parsed.is_none() {
        warn!(numero, field, value = raw, "unparseable details field stored as null");
    }
    parsed
}

/// Outcome of a details import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailsImport {
    pub inserted: usize,
    /// Numbers with no stored case.
    pub missing: Vec<String>,
    /// Numbers whose case already has details.
    pub duplicate: Vec<String>,
}

#[cfg(feature = "duckdb")]
mod import {
    use std::collections::HashSet;

    use tracing::{info, warn};

    use super::{DetailsImport, DetailsRow};
    use crate::{CaseSession, DuckStore, NewEntity, StoreError};

    impl DuckStore {
        /// Insert details for every row whose case exists and has none yet.
        ///
        /// All accepted rows go in under one transaction.
        pub fn import_details(&self, rows: &[DetailsRow]) -> Result<DetailsImport, StoreError> {
            let mut session = self.duck_session()?;
            let mut report = DetailsImport::default();
            let mut accepted = Vec::new();
            let mut seen = HashSet::new();

            for row in rows {
                let Some(case_id) = session.find_by_case_number(&row.numero)? else {
                    warn!(numero = %row.numero, "no stored case for details row, skipping");
                    report.missing.push(row.numero.clone());
                    continue;
                };
                if !seen.insert(case_id) || session.has_details(case_id)? {
                    warn!(numero = %row.numero, "case already has details, skipping");
                    report.duplicate.push(row.numero.clone());
                    continue;
                }
                accepted.push(row.to_entity(case_id));
            }

            let inserted = accepted.len();
            session.begin()?;
            let result = accepted.into_iter().try_for_each(|details| {
                session
                    .insert_entity(NewEntity::PrecatorioDetails(details))
                    .map(|_| ())
            });
            let result = result.and_then(|()| session.commit());
            if let Err(e) = result {
                if let Err(rollback_err) = session.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return Err(e);
            }
            report.inserted = inserted;
            info!(
                inserted = report.inserted,
                missing = report.missing.len(),
                duplicate = report.duplicate.len(),
                "imported precatório details"
            );
            Ok(report)
        }
    }

}
