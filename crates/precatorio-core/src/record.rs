//! Case records as returned by the Escavador v2 `numero_cnj` endpoint.
//!
//! Every field is optional: the API omits or nulls whatever a court feed does
//! not publish. Collections that arrive as `null` deserialize to empty vectors.
//! Dates and money stay as raw JSON here; coercion happens when the record is
//! mapped into entity rows.
//!
//! Scalars are decoded leniently: a value of the wrong JSON type becomes
//! `None` with a warning instead of failing the whole record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use tracing::warn;

    use crate::parse::int_from_json;

    fn present<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.filter(|v| !v.is_null()))
    }

    /// Integer from a number or numeric text.
    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let Some(value) = present(d)? else {
            return Ok(None);
        };
        let parsed = int_from_json(&value);
        if parsed.is_none() {
            warn!(value = %value, "non-integer field decoded as null");
        }
        Ok(parsed)
    }

    /// Text; numbers and booleans keep their JSON spelling.
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match present(d)? {
            None => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            Some(other) => {
                warn!(value = %other, "non-text field decoded as null");
                None
            }
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        let Some(value) = present(d)? else {
            return Ok(None);
        };
        let parsed = match &value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        if parsed.is_none() {
            warn!(value = %value, "non-boolean field decoded as null");
        }
        Ok(parsed)
    }

    /// A nested object; anything that does not decode as `T` becomes `None`.
    pub fn nested<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let Some(value) = present(d)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                warn!(error = %e, "malformed object decoded as null");
                Ok(None)
            }
        }
    }

    /// A list; `null` is empty and undecodable elements are dropped.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let items = match present(d)? {
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                warn!(value = %other, "non-list field decoded as empty");
                return Ok(Vec::new());
            }
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(error = %e, "malformed list element dropped");
                    None
                }
            })
            .collect())
    }
}

/// Root of a fetched case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub numero_cnj: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub titulo_polo_ativo: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub titulo_polo_passivo: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub ano_inicio: Option<i64>,
    /// `YYYY-MM-DD`.
    #[serde(default, deserialize_with = "lenient::text")]
    pub data_inicio: Option<String>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub estado_origem: Option<StateRef>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub data_ultima_movimentacao: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub quantidade_movimentacoes: Option<i64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub fontes_tribunais_estao_arquivadas: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tempo_desde_ultima_verificacao: Option<String>,
    /// ISO 8601 timestamp string.
    #[serde(default, deserialize_with = "lenient::text")]
    pub data_ultima_verificacao: Option<String>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub unidade_origem: Option<OriginUnit>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub processos_relacionados: Vec<RelatedCaseRecord>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub fontes: Vec<SourceRecord>,
}

/// Origin state: the API sends either `{"nome": .., "sigla": ..}` or a bare code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateRef {
    Code(String),
    Detailed {
        sigla: Option<String>,
        nome: Option<String>,
    },
}

impl StateRef {
    pub fn code(&self) -> Option<&str> {
        match self {
            StateRef::Code(code) => Some(code.as_str()),
            StateRef::Detailed { sigla, .. } => sigla.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OriginUnit {
    #[serde(default, deserialize_with = "lenient::text")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cidade: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub estado: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tribunal_sigla: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelatedCaseRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub numero: Option<String>,
}

/// One court system's feed for the case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default, deserialize_with = "lenient::int")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub processo_fonte_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub descricao: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub sigla: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tipo: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub data_inicio: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub data_ultima_movimentacao: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub segredo_justica: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub arquivado: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status_predito: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub grau: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub grau_formatado: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub fisico: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub sistema: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub quantidade_envolvidos: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub data_ultima_verificacao: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub quantidade_movimentacoes: Option<i64>,
    pub outros_numeros: Option<Value>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub capa: Option<CoverSheetRecord>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub audiencias: Vec<HearingRecord>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub envolvidos: Vec<PartyRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverSheetRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub classe: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub assunto: Option<String>,
    pub assuntos_normalizados: Option<Value>,
    pub assunto_principal_normalizado: Option<Value>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub area: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub orgao_julgador: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub situacao: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub data_distribuicao: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub data_arquivamento: Option<String>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub valor_causa: Option<ClaimValueRecord>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub informacoes_complementares: Vec<SupplementaryInfoRecord>,
}

/// Claim value. `valor` arrives as a decimal string, occasionally as a number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimValueRecord {
    pub valor: Option<Value>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub moeda: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub valor_formatado: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplementaryInfoRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub tipo: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub valor: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HearingRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub data_audiencia: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub descricao: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartyRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub quantidade_processos: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tipo_pessoa: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tipo: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tipo_normalizado: Option<String>,
    /// `ATIVO`, `PASSIVO`, or another pole label.
    #[serde(default, deserialize_with = "lenient::text")]
    pub polo: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cnpj: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub prefixo: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub sufixo: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub advogados: Vec<AttorneyRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttorneyRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub quantidade_processos: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tipo_pessoa: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tipo: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tipo_normalizado: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub polo: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cnpj: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub prefixo: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub sufixo: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub oabs: Vec<BarRegistrationRecord>,
}

/// OAB registration. `numero` is usually an integer but some feeds send text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarRegistrationRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub uf: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tipo: Option<String>,
    pub numero: Option<Value>,
}
