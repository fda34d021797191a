//! Read-back of stored case trees for reporting.
//!
//! Dates come back as ISO text and money as [`Decimal`]; the exports format
//! them, nothing here does.

use rust_decimal::Decimal;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredCase {
    pub id: i64,
    pub numero_cnj: String,
    pub ano_inicio: Option<i64>,
    pub data_inicio: Option<String>,
    pub estado_origem: Option<String>,
    pub unidade_origem_nome: Option<String>,
    pub unidade_origem_cidade: Option<String>,
    pub unidade_origem_estado: Option<String>,
    pub unidade_origem_tribunal_sigla: Option<String>,
    pub data_ultima_movimentacao: Option<String>,
    pub quantidade_movimentacoes: Option<i64>,
    pub fontes_tribunais_estao_arquivadas: Option<bool>,
    pub data_ultima_verificacao: Option<String>,
    pub tempo_desde_ultima_verificacao: Option<String>,
    /// Details columns, set when a details row was imported.
    pub tipo_regime: Option<String>,
    pub ano_orcamentario: Option<i64>,
    pub natureza_precatorio: Option<String>,
    pub valor_deferido: Option<Decimal>,
    pub data_base_calculo: Option<String>,
    pub data_expedicao: Option<String>,
    pub related_numbers: Vec<String>,
    pub sources: Vec<StoredSource>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredSource {
    pub id: i64,
    pub sigla: Option<String>,
    pub data_inicio: Option<String>,
    pub sistema: Option<String>,
    pub quantidade_envolvidos: Option<i64>,
    pub capa: Option<StoredCover>,
    pub parties: Vec<StoredParty>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredCover {
    pub classe: Option<String>,
    pub assunto: Option<String>,
    pub valor_causa: Option<StoredClaim>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredClaim {
    pub valor: Option<Decimal>,
    pub valor_formatado: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredPerson {
    pub nome: Option<String>,
    pub tipo_pessoa: Option<String>,
    pub tipo_normalizado: Option<String>,
    pub polo: Option<String>,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredParty {
    pub person: StoredPerson,
    pub attorneys: Vec<StoredAttorney>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredAttorney {
    pub person: StoredPerson,
    pub oabs: Vec<StoredOab>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredOab {
    pub uf: Option<String>,
    pub tipo: Option<String>,
    pub numero: Option<i64>,
}

#[cfg(feature = "duckdb")]
mod load {
    use std::collections::HashMap;
    use std::str::FromStr;

    use duckdb::Row;
    use rust_decimal::Decimal;
    use tracing::debug;

    use super::*;
    use crate::{DuckStore, StoreError};

    const CASES_SQL: &str = "
        SELECT p.id, p.numero_cnj, p.ano_inicio, CAST(p.data_inicio AS VARCHAR), p.estado_origem,
               p.unidade_origem_nome, p.unidade_origem_cidade, p.unidade_origem_estado,
               p.unidade_origem_tribunal_sigla, CAST(p.data_ultima_movimentacao AS VARCHAR),
               p.quantidade_movimentacoes, p.fontes_tribunais_estao_arquivadas,
               strftime(p.data_ultima_verificacao, '%Y-%m-%dT%H:%M:%S'),
               p.tempo_desde_ultima_verificacao, d.tipo_regime, d.ano_orcamentario,
               d.natureza_precatorio, CAST(d.valor_deferido AS VARCHAR),
               CAST(d.data_base_calculo AS VARCHAR), CAST(d.data_expedicao AS VARCHAR)
        FROM processos p
        LEFT JOIN dados_precatorios d ON d.processo_id = p.id
        WHERE p.unidade_origem_tribunal_sigla = ?
        ORDER BY p.id";

    const RELATED_SQL: &str = "
        SELECT r.processo_id, r.numero
        FROM processos_relacionados r
        JOIN processos p ON p.id = r.processo_id
        WHERE p.unidade_origem_tribunal_sigla = ?
        ORDER BY r.id";

    const SOURCES_SQL: &str = "
        SELECT f.id, f.processo_id, f.sigla, CAST(f.data_inicio AS VARCHAR), f.sistema,
               f.quantidade_envolvidos, c.id, c.classe, c.assunto, v.id,
               CAST(v.valor AS VARCHAR), v.valor_formatado
        FROM fontes f
        JOIN processos p ON p.id = f.processo_id
        LEFT JOIN fontes_capas c ON c.fonte_id = f.id
        LEFT JOIN capa_valores_causa v ON v.capa_id = c.id
        WHERE p.unidade_origem_tribunal_sigla = ?
        ORDER BY f.id";

    const PARTIES_SQL: &str = "
        SELECT e.id, e.fonte_id, e.nome, e.tipo_pessoa, e.tipo_normalizado, e.polo, e.cpf, e.cnpj
        FROM fontes_envolvidos e
        JOIN fontes f ON f.id = e.fonte_id
        JOIN processos p ON p.id = f.processo_id
        WHERE p.unidade_origem_tribunal_sigla = ?
        ORDER BY e.id";

    const ATTORNEYS_SQL: &str = "
        SELECT a.id, a.envolvido_id, a.nome, a.tipo_pessoa, a.tipo_normalizado, a.polo, a.cpf, a.cnpj
        FROM envolvidos_advogados a
        JOIN fontes_envolvidos e ON e.id = a.envolvido_id
        JOIN fontes f ON f.id = e.fonte_id
        JOIN processos p ON p.id = f.processo_id
        WHERE p.unidade_origem_tribunal_sigla = ?
        ORDER BY a.id";

    const OABS_SQL: &str = "
        SELECT o.advogado_id, o.uf, o.tipo, o.numero
        FROM advogados_oabs o
        JOIN envolvidos_advogados a ON a.id = o.advogado_id
        JOIN fontes_envolvidos e ON e.id = a.envolvido_id
        JOIN fontes f ON f.id = e.fonte_id
        JOIN processos p ON p.id = f.processo_id
        WHERE p.unidade_origem_tribunal_sigla = ?
        ORDER BY o.id";

    fn person(row: &Row<'_>, offset: usize) -> duckdb::Result<StoredPerson> {
        Ok(StoredPerson {
            nome: row.get(offset)?,
            tipo_pessoa: row.get(offset + 1)?,
            tipo_normalizado: row.get(offset + 2)?,
            polo: row.get(offset + 3)?,
            cpf: row.get(offset + 4)?,
            cnpj: row.get(offset + 5)?,
        })
    }

    /// Group `(parent, child)` pairs by parent, keeping row order.
    fn grouped<T>(pairs: Vec<(i64, T)>) -> HashMap<i64, Vec<T>> {
        let mut map: HashMap<i64, Vec<T>> = HashMap::new();
        for (parent, child) in pairs {
            map.entry(parent).or_default().push(child);
        }
        map
    }

    impl DuckStore {
        fn query_pairs<T>(
            &self,
            sql: &str,
            sigla: &str,
            f: impl FnMut(&Row<'_>) -> duckdb::Result<(i64, T)>,
        ) -> Result<Vec<(i64, T)>, StoreError> {
            let mut stmt = self.conn.prepare(sql)?;
            let rows = stmt.query_map([sigla], f)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        }

        /// Every case whose origin unit belongs to `tribunal_sigla`, with its
        /// sources, cover sheets, parties, attorneys and OAB registrations.
        pub fn load_cases_by_tribunal(&self, tribunal_sigla: &str) -> Result<Vec<StoredCase>, StoreError> {
            let cases = self.query_pairs(CASES_SQL, tribunal_sigla, |row| {
                let valor_deferido: Option<String> = row.get(17)?;
                let case = StoredCase {
                    id: row.get(0)?,
                    numero_cnj: row.get(1)?,
                    ano_inicio: row.get(2)?,
                    data_inicio: row.get(3)?,
                    estado_origem: row.get(4)?,
                    unidade_origem_nome: row.get(5)?,
                    unidade_origem_cidade: row.get(6)?,
                    unidade_origem_estado: row.get(7)?,
                    unidade_origem_tribunal_sigla: row.get(8)?,
                    data_ultima_movimentacao: row.get(9)?,
                    quantidade_movimentacoes: row.get(10)?,
                    fontes_tribunais_estao_arquivadas: row.get(11)?,
                    data_ultima_verificacao: row.get(12)?,
                    tempo_desde_ultima_verificacao: row.get(13)?,
                    tipo_regime: row.get(14)?,
                    ano_orcamentario: row.get(15)?,
                    natureza_precatorio: row.get(16)?,
                    valor_deferido: valor_deferido.as_deref().and_then(|v| Decimal::from_str(v).ok()),
                    data_base_calculo: row.get(18)?,
                    data_expedicao: row.get(19)?,
                    ..Default::default()
                };
                Ok((case.id, case))
            })?;
            if cases.is_empty() {
                return Ok(Vec::new());
            }

            let related = self.query_pairs(RELATED_SQL, tribunal_sigla, |row| {
                Ok((row.get(0)?, row.get::<_, Option<String>>(1)?))
            })?;

            let mut oabs = grouped(self.query_pairs(OABS_SQL, tribunal_sigla, |row| {
                Ok((
                    row.get(0)?,
                    StoredOab {
                        uf: row.get(1)?,
                        tipo: row.get(2)?,
                        numero: row.get(3)?,
                    },
                ))
            })?);

            let attorney_rows = self.query_pairs(ATTORNEYS_SQL, tribunal_sigla, |row| {
                let id: i64 = row.get(0)?;
                Ok((id, (row.get::<_, i64>(1)?, person(row, 2)?)))
            })?;
            let mut attorneys = grouped(
                attorney_rows
                    .into_iter()
                    .map(|(id, (party_id, person))| {
                        let oabs = oabs.remove(&id).unwrap_or_default();
                        (party_id, StoredAttorney { person, oabs })
                    })
                    .collect(),
            );

            let party_rows = self.query_pairs(PARTIES_SQL, tribunal_sigla, |row| {
                let id: i64 = row.get(0)?;
                Ok((id, (row.get::<_, i64>(1)?, person(row, 2)?)))
            })?;
            let mut parties = grouped(
                party_rows
                    .into_iter()
                    .map(|(id, (source_id, person))| {
                        let attorneys = attorneys.remove(&id).unwrap_or_default();
                        (source_id, StoredParty { person, attorneys })
                    })
                    .collect(),
            );

            let source_rows = self.query_pairs(SOURCES_SQL, tribunal_sigla, |row| {
                let capa_id: Option<i64> = row.get(6)?;
                let claim_id: Option<i64> = row.get(9)?;
                let valor: Option<String> = row.get(10)?;
                let capa = capa_id.map(|_| -> duckdb::Result<StoredCover> {
                    Ok(StoredCover {
                        classe: row.get(7)?,
                        assunto: row.get(8)?,
                        valor_causa: claim_id.map(|_| -> duckdb::Result<StoredClaim> {
                            Ok(StoredClaim {
                                valor: valor.as_deref().and_then(|v| Decimal::from_str(v).ok()),
                                valor_formatado: row.get(11)?,
                            })
                        })
                        .transpose()?,
                    })
                });
                let source = StoredSource {
                    id: row.get(0)?,
                    sigla: row.get(2)?,
                    data_inicio: row.get(3)?,
                    sistema: row.get(4)?,
                    quantidade_envolvidos: row.get(5)?,
                    capa: capa.transpose()?,
                    parties: Vec::new(),
                };
                Ok((row.get(1)?, source))
            })?;
            let mut sources = grouped(
                source_rows
                    .into_iter()
                    .map(|(case_id, mut source)| {
                        source.parties = parties.remove(&source.id).unwrap_or_default();
                        (case_id, source)
                    })
                    .collect(),
            );

            let mut related = grouped(related);
            let cases: Vec<StoredCase> = cases
                .into_iter()
                .map(|(id, mut case)| {
                    case.related_numbers = related
                        .remove(&id)
                        .unwrap_or_default()
                        .into_iter()
                        .flatten()
                        .collect();
                    case.sources = sources.remove(&id).unwrap_or_default();
                    case
                })
                .collect();
            debug!(tribunal_sigla, cases = cases.len(), "loaded case trees");
            Ok(cases)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::CaseStore;
        use crate::mapper::persist_case;
        use precatorio_core::CaseRecord;

        fn record(numero: &str, tribunal: &str) -> CaseRecord {
            serde_json::from_value(serde_json::json!({
                "numero_cnj": numero,
                "data_inicio": "2020-03-02",
                "unidade_origem": {"tribunal_sigla": tribunal, "cidade": "Campinas"},
                "processos_relacionados": [{"numero": "R-1"}, {"numero": null}],
                "fontes": [
                    {"sigla": "A", "envolvidos": [{"nome": "Réu", "polo": "PASSIVO"}]},
                    {"sigla": "B",
                     "capa": {"classe": "Precatório", "valor_causa": {"valor": "10,50", "valor_formatado": "R$ 10,50"}},
                     "envolvidos": [{"nome": "Maria", "polo": "ATIVO", "cpf": "123",
                                     "advogados": [{"nome": "João", "oabs": [{"uf": "SP", "numero": 7}, {"uf": "RJ", "numero": 8}]}]}]}
                ]
            }))
            .unwrap()
        }

        #[test]
        fn loads_full_tree_for_tribunal() {
            let store = DuckStore::open().unwrap();
            let mut session = store.session().unwrap();
            persist_case(&mut session, &record("1", "TJSP")).unwrap();
            persist_case(&mut session, &record("2", "TJRJ")).unwrap();

            let cases = store.load_cases_by_tribunal("TJSP").unwrap();
            assert_eq!(cases.len(), 1);
            let case = &cases[0];
            assert_eq!(case.numero_cnj, "1");
            assert_eq!(case.data_inicio.as_deref(), Some("2020-03-02"));
            assert_eq!(case.related_numbers, vec!["R-1".to_string()]);
            assert_eq!(case.sources.len(), 2);

            let first = &case.sources[0];
            assert_eq!(first.sigla.as_deref(), Some("A"));
            assert!(first.capa.is_none());
            assert_eq!(first.parties[0].person.polo.as_deref(), Some("PASSIVO"));

            let second = &case.sources[1];
            let claim = second.capa.as_ref().unwrap().valor_causa.as_ref().unwrap();
            assert_eq!(claim.valor, Some(Decimal::new(1050, 2)));
            let attorney = &second.parties[0].attorneys[0];
            assert_eq!(attorney.person.nome.as_deref(), Some("João"));
            assert_eq!(attorney.oabs.len(), 2);
            assert_eq!(attorney.oabs[1].numero, Some(8));
        }

        #[test]
        fn details_columns_are_loaded() {
            let store = DuckStore::open().unwrap();
            let mut session = store.session().unwrap();
            persist_case(&mut session, &record("1", "TJSP")).unwrap();
            persist_case(&mut session, &record("2", "TJSP")).unwrap();
            drop(session);
            store
                .import_details(&[crate::DetailsRow {
                    numero: "1".into(),
                    tipo_regime: Some("Especial".into()),
                    ano_orcamentario: Some("2025".into()),
                    natureza_precatorio: Some("Alimentar".into()),
                    valor_deferido: Some("R$ 150.000,25".into()),
                    data_base_calculo: Some("07/2021".into()),
                    data_expedicao: Some("15/03/2022".into()),
                }])
                .unwrap();

            let cases = store.load_cases_by_tribunal("TJSP").unwrap();
            let with = &cases[0];
            assert_eq!(with.tipo_regime.as_deref(), Some("Especial"));
            assert_eq!(with.ano_orcamentario, Some(2025));
            assert_eq!(with.natureza_precatorio.as_deref(), Some("Alimentar"));
            assert_eq!(with.valor_deferido, Some(Decimal::new(15000025, 2)));
            assert_eq!(with.data_base_calculo.as_deref(), Some("2021-07-01"));
            assert_eq!(with.data_expedicao.as_deref(), Some("2022-03-15"));

            let without = &cases[1];
            assert_eq!(without.valor_deferido, None);
            assert_eq!(without.data_expedicao, None);
        }

        #[test]
        fn unknown_tribunal_is_empty() {
            let store = DuckStore::open().unwrap();
            assert!(store.load_cases_by_tribunal("TRF9").unwrap().is_empty());
        }
    }
}
