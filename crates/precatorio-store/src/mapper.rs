//! Maps one fetched [`CaseRecord`] into the entity tree and inserts it.
//!
//! The whole tree for a record goes in under a single transaction. Malformed
//! dates and money values become NULL with a warning; anything that fails at
//! the store rolls the record back and is returned to the caller.

use chrono::{NaiveDate, NaiveDateTime};
use precatorio_core::parse::{
    fits_money_column, int_from_json, money_from_json, parse_date, parse_datetime,
};
use precatorio_core::{
    AttorneyRecord, CaseRecord, CoverSheetRecord, PartyRecord, SourceRecord,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use crate::entity::*;
use crate::{CaseSession, StoreError};

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The tree was inserted and committed.
    Inserted { case_id: i64, rows: usize },
    /// A case with this number already exists; nothing was written.
    AlreadyStored { case_id: i64 },
}

/// Insert the full entity tree for `record`, or nothing at all.
pub fn persist_case<S>(session: &mut S, record: &CaseRecord) -> Result<PersistOutcome, StoreError>
where
    S: CaseSession + ?Sized,
{
    let numero = record
        .numero_cnj
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(StoreError::MissingCaseNumber)?;

    if let Some(case_id) = session.find_by_case_number(numero)? {
        debug!(numero, case_id, "case already stored, skipping");
        return Ok(PersistOutcome::AlreadyStored { case_id });
    }

    session.begin()?;
    let mut writer = TreeWriter {
        session: &mut *session,
        numero,
        rows: 0,
    };
    let result = writer.write_case(record).map(|case_id| (case_id, writer.rows));
    let result = result.and_then(|(case_id, rows)| {
        session.commit()?;
        Ok(PersistOutcome::Inserted { case_id, rows })
    });

    if result.is_err() {
        if let Err(rollback_err) = session.rollback() {
            warn!(numero, error = %rollback_err, "rollback failed");
        }
    }
    result
}

struct TreeWriter<'a, S: ?Sized> {
    session: &'a mut S,
    numero: &'a str,
    rows: usize,
}

impl<S: CaseSession + ?Sized> TreeWriter<'_, S> {
    fn insert(&mut self, entity: NewEntity) -> Result<i64, StoreError> {
        let id = self.session.insert_entity(entity)?;
        self.rows += 1;
        Ok(id)
    }

    fn write_case(&mut self, record: &CaseRecord) -> Result<i64, StoreError> {
        let unit = record.unidade_origem.clone().unwrap_or_default();
        let case = NewCase {
            numero_cnj: self.numero.to_string(),
            titulo_polo_ativo: record.titulo_polo_ativo.clone(),
            titulo_polo_passivo: record.titulo_polo_passivo.clone(),
            ano_inicio: record.ano_inicio,
            data_inicio: self.date("data_inicio", record.data_inicio.as_deref()),
            estado_origem: record
                .estado_origem
                .as_ref()
                .and_then(|s| s.code())
                .map(str::to_string),
            data_ultima_movimentacao: self.date(
                "data_ultima_movimentacao",
                record.data_ultima_movimentacao.as_deref(),
            ),
            quantidade_movimentacoes: record.quantidade_movimentacoes,
            fontes_tribunais_estao_arquivadas: record.fontes_tribunais_estao_arquivadas,
            tempo_desde_ultima_verificacao: record.tempo_desde_ultima_verificacao.clone(),
            data_ultima_verificacao: self.datetime(
                "data_ultima_verificacao",
                record.data_ultima_verificacao.as_deref(),
            ),
            unidade_origem_nome: unit.nome,
            unidade_origem_cidade: unit.cidade,
            unidade_origem_estado: unit.estado,
            unidade_origem_tribunal_sigla: unit.tribunal_sigla,
        };
        let case_id = self.insert(NewEntity::Case(case))?;

        for related in &record.processos_relacionados {
            self.insert(NewEntity::RelatedCase(NewRelatedCase {
                processo_id: case_id,
                numero: related.numero.clone(),
            }))?;
        }

        for source in &record.fontes {
            self.write_source(case_id, source)?;
        }
        Ok(case_id)
    }

    fn write_source(&mut self, case_id: i64, f: &SourceRecord) -> Result<(), StoreError> {
        let source = NewSource {
            processo_id: case_id,
            fonte_id: f.id,
            processo_fonte_id: f.processo_fonte_id,
            descricao: f.descricao.clone(),
            nome: f.nome.clone(),
            sigla: f.sigla.clone(),
            tipo: f.tipo.clone(),
            data_inicio: self.date("fonte.data_inicio", f.data_inicio.as_deref()),
            data_ultima_movimentacao: self.date(
                "fonte.data_ultima_movimentacao",
                f.data_ultima_movimentacao.as_deref(),
            ),
            segredo_justica: f.segredo_justica,
            arquivado: f.arquivado,
            status_predito: f.status_predito.clone(),
            grau: f.grau,
            grau_formatado: f.grau_formatado.clone(),
            fisico: f.fisico,
            sistema: f.sistema.clone(),
            url: f.url.clone(),
            quantidade_envolvidos: f.quantidade_envolvidos,
            data_ultima_verificacao: self.datetime(
                "fonte.data_ultima_verificacao",
                f.data_ultima_verificacao.as_deref(),
            ),
            quantidade_movimentacoes: f.quantidade_movimentacoes,
            outros_numeros: json_text(f.outros_numeros.as_ref())?,
        };
        let fonte_id = self.insert(NewEntity::Source(source))?;

        if let Some(capa) = &f.capa {
            self.write_cover_sheet(fonte_id, capa)?;
        }

        for hearing in &f.audiencias {
            let data_audiencia = self.date("audiencia.data", hearing.data_audiencia.as_deref());
            self.insert(NewEntity::Hearing(NewHearing {
                fonte_id,
                data_audiencia,
                descricao: hearing.descricao.clone(),
            }))?;
        }

        for party in &f.envolvidos {
            self.write_party(fonte_id, party)?;
        }
        Ok(())
    }

    fn write_cover_sheet(&mut self, fonte_id: i64, capa: &CoverSheetRecord) -> Result<(), StoreError> {
        let cover = NewCoverSheet {
            fonte_id,
            classe: capa.classe.clone(),
            assunto: capa.assunto.clone(),
            assuntos_normalizados: json_text(capa.assuntos_normalizados.as_ref())?,
            assunto_principal_normalizado: json_text(capa.assunto_principal_normalizado.as_ref())?,
            area: capa.area.clone(),
            orgao_julgador: capa.orgao_julgador.clone(),
            situacao: capa.situacao.clone(),
            data_distribuicao: self.date("capa.data_distribuicao", capa.data_distribuicao.as_deref()),
            data_arquivamento: self.date("capa.data_arquivamento", capa.data_arquivamento.as_deref()),
        };
        let capa_id = self.insert(NewEntity::CoverSheet(cover))?;

        if let Some(value) = &capa.valor_causa {
            let valor = self.money("valor_causa.valor", value.valor.as_ref());
            self.insert(NewEntity::ClaimValue(NewClaimValue {
                capa_id,
                valor,
                moeda: value.moeda.clone(),
                valor_formatado: value.valor_formatado.clone(),
            }))?;
        }

        for info in &capa.informacoes_complementares {
            self.insert(NewEntity::SupplementaryInfo(NewSupplementaryInfo {
                capa_id,
                tipo: info.tipo.clone(),
                valor: info.valor.clone(),
            }))?;
        }
        Ok(())
    }

    fn write_party(&mut self, fonte_id: i64, party: &PartyRecord) -> Result<(), StoreError> {
        let envolvido_id = self.insert(NewEntity::Party(NewParty {
            fonte_id,
            person: PersonFields {
                nome: party.nome.clone(),
                quantidade_processos: party.quantidade_processos,
                tipo_pessoa: party.tipo_pessoa.clone(),
                prefixo: party.prefixo.clone(),
                sufixo: party.sufixo.clone(),
                tipo: party.tipo.clone(),
                tipo_normalizado: party.tipo_normalizado.clone(),
                polo: party.polo.clone(),
                cpf: party.cpf.clone(),
                cnpj: party.cnpj.clone(),
            },
        }))?;

        for attorney in &party.advogados {
            self.write_attorney(envolvido_id, attorney)?;
        }
        Ok(())
    }

    fn write_attorney(&mut self, envolvido_id: i64, adv: &AttorneyRecord) -> Result<(), StoreError> {
        let advogado_id = self.insert(NewEntity::Attorney(NewAttorney {
            envolvido_id,
            person: PersonFields {
                nome: adv.nome.clone(),
                quantidade_processos: adv.quantidade_processos,
                tipo_pessoa: adv.tipo_pessoa.clone(),
                prefixo: adv.prefixo.clone(),
                sufixo: adv.sufixo.clone(),
                tipo: adv.tipo.clone(),
                tipo_normalizado: adv.tipo_normalizado.clone(),
                polo: adv.polo.clone(),
                cpf: adv.cpf.clone(),
                cnpj: adv.cnpj.clone(),
            },
        }))?;

        for oab in &adv.oabs {
            let numero = oab.numero.as_ref().and_then(|raw| {
                let parsed = int_from_json(raw);
                if parsed.is_none() && !raw.is_null() {
                    warn!(numero = self.numero, value = %raw, "unparseable OAB number stored as null");
                }
                parsed
            });
            self.insert(NewEntity::BarRegistration(NewBarRegistration {
                advogado_id,
                uf: oab.uf.clone(),
                tipo: oab.tipo.clone(),
                numero,
            }))?;
        }
        Ok(())
    }

    fn date(&self, field: &'static str, raw: Option<&str>) -> Option<NaiveDate> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
        let parsed = parse_date(raw);
        if parsed.is_none() {
            warn!(numero = self.numero, field, value = raw, "unparseable date stored as null");
        }
        parsed
    }

    fn datetime(&self, field: &'static str, raw: Option<&str>) -> Option<NaiveDateTime> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
        let parsed = parse_datetime(raw);
        if parsed.is_none() {
            warn!(numero = self.numero, field, value = raw, "unparseable timestamp stored as null");
        }
        parsed
    }

    fn money(&self, field: &'static str, raw: Option<&Value>) -> Option<Decimal> {
        let raw = raw.filter(|v| !v.is_null())?;
        let Some(parsed) = money_from_json(raw) else {
            warn!(numero = self.numero, field, value = %raw, "unparseable amount stored as null");
            return None;
        };
        if !fits_money_column(&parsed) {
            warn!(numero = self.numero, field, value = %raw, "amount out of range stored as null");
            return None;
        }
        Some(parsed)
    }
}

fn json_text(value: Option<&Value>) -> Result<Option<String>, StoreError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(serde_json::to_string(v)?)),
    }
}
