//! Insertable rows of the case tree, one struct per table.
//!
//! Parent keys are filled in by the mapper as each parent row is inserted.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCase {
    pub numero_cnj: String,
    pub titulo_polo_ativo: Option<String>,
    pub titulo_polo_passivo: Option<String>,
    pub ano_inicio: Option<i64>,
    pub data_inicio: Option<NaiveDate>,
    pub estado_origem: Option<String>,
    pub data_ultima_movimentacao: Option<NaiveDate>,
    pub quantidade_movimentacoes: Option<i64>,
    pub fontes_tribunais_estao_arquivadas: Option<bool>,
    pub tempo_desde_ultima_verificacao: Option<String>,
    pub data_ultima_verificacao: Option<NaiveDateTime>,
    pub unidade_origem_nome: Option<String>,
    pub unidade_origem_cidade: Option<String>,
    pub unidade_origem_estado: Option<String>,
    pub unidade_origem_tribunal_sigla: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRelatedCase {
    pub processo_id: i64,
    pub numero: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSource {
    pub processo_id: i64,
    pub fonte_id: Option<i64>,
    pub processo_fonte_id: Option<i64>,
    pub descricao: Option<String>,
    pub nome: Option<String>,
    pub sigla: Option<String>,
    pub tipo: Option<String>,
    pub data_inicio: Option<NaiveDate>,
    pub data_ultima_movimentacao: Option<NaiveDate>,
    pub segredo_justica: Option<bool>,
    pub arquivado: Option<bool>,
    pub status_predito: Option<String>,
    pub grau: Option<i64>,
    pub grau_formatado: Option<String>,
    pub fisico: Option<bool>,
    pub sistema: Option<String>,
    pub url: Option<String>,
    pub quantidade_envolvidos: Option<i64>,
    pub data_ultima_verificacao: Option<NaiveDateTime>,
    pub quantidade_movimentacoes: Option<i64>,
    /// JSON text.
    pub outros_numeros: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCoverSheet {
    pub fonte_id: i64,
    pub classe: Option<String>,
    pub assunto: Option<String>,
    /// JSON text.
    pub assuntos_normalizados: Option<String>,
    /// JSON text.
    pub assunto_principal_normalizado: Option<String>,
    pub area: Option<String>,
    pub orgao_julgador: Option<String>,
    pub situacao: Option<String>,
    pub data_distribuicao: Option<NaiveDate>,
    pub data_arquivamento: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewClaimValue {
    pub capa_id: i64,
    pub valor: Option<Decimal>,
    pub moeda: Option<String>,
    pub valor_formatado: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSupplementaryInfo {
    pub capa_id: i64,
    pub tipo: Option<String>,
    pub valor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewHearing {
    pub fonte_id: i64,
    pub data_audiencia: Option<NaiveDate>,
    pub descricao: Option<String>,
}

/// Columns shared by parties and attorneys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonFields {
    pub nome: Option<String>,
    pub quantidade_processos: Option<i64>,
    pub tipo_pessoa: Option<String>,
    pub prefixo: Option<String>,
    pub sufixo: Option<String>,
    pub tipo: Option<String>,
    pub tipo_normalizado: Option<String>,
    pub polo: Option<String>,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewParty {
    pub fonte_id: i64,
    pub person: PersonFields,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAttorney {
    pub envolvido_id: i64,
    pub person: PersonFields,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBarRegistration {
    pub advogado_id: i64,
    pub uf: Option<String>,
    pub tipo: Option<String>,
    pub numero: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPrecatorioDetails {
    pub processo_id: i64,
    pub tipo_regime: Option<String>,
    pub ano_orcamentario: Option<i64>,
    pub natureza_precatorio: Option<String>,
    pub valor_deferido: Option<Decimal>,
    pub data_base_calculo: Option<NaiveDate>,
    pub data_expedicao: Option<NaiveDate>,
}

/// Any row a session can insert.
#[derive(Debug, Clone, PartialEq)]
pub enum NewEntity {
    Case(NewCase),
    RelatedCase(NewRelatedCase),
    Source(NewSource),
    CoverSheet(NewCoverSheet),
    ClaimValue(NewClaimValue),
    SupplementaryInfo(NewSupplementaryInfo),
    Hearing(NewHearing),
    Party(NewParty),
    Attorney(NewAttorney),
    BarRegistration(NewBarRegistration),
    PrecatorioDetails(NewPrecatorioDetails),
}

impl NewEntity {
    /// Target table name.
    pub fn table(&self) -> &'static str {
        match self {
            NewEntity::Case(_) => "processos",
            NewEntity::RelatedCase(_) => "processos_relacionados",
            NewEntity::Source(_) => "fontes",
            NewEntity::CoverSheet(_) => "fontes_capas",
            NewEntity::ClaimValue(_) => "capa_valores_causa",
            NewEntity::SupplementaryInfo(_) => "capa_informacoes_complementares",
            NewEntity::Hearing(_) => "audiencias",
            NewEntity::Party(_) => "fontes_envolvidos",
            NewEntity::Attorney(_) => "envolvidos_advogados",
            NewEntity::BarRegistration(_) => "advogados_oabs",
            NewEntity::PrecatorioDetails(_) => "dados_precatorios",
        }
    }
}
