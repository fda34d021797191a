//! Column layouts for the CSV exports, as Arrow schemas.

/// Arrow schemas for the tabular exports. Every export column is nullable text.
pub mod export {
    use arrow::datatypes::{DataType, Field, Schema};

    pub const CREDITOR_COLUMNS: &[&str] = &[
        "CNPJ / CPF do Credor",
        "Nome do Credor",
        "Tipo do Credor",
        "Nome do Réu",
        "CNPJ do Réu",
        "UF do Precatório",
        "Município do Precatório",
        "Número dos Autos do Precatório",
        "Tipo do Precatório",
        "Tipo do Regime",
        "Valor da Causa",
    ];

    /// Attorney-specific leading columns; the creditor columns follow.
    pub const CREDITOR_ATTORNEY_PREFIX: &[&str] = &[
        "Nome do Advogado",
        "CPF do Advogado",
        "OAB",
        "Estado da OAB",
    ];

    /// Creditor identification leading the precatório report's creditor sheet.
    pub const PRECATORIO_CREDITOR_COLUMNS: &[&str] = &[
        "CNPJ / CPF do Credor",
        "Nome do Credor",
        "Tipo do Credor",
    ];

    /// Precatório columns shared by both sheets of the precatório report.
    pub const PRECATORIO_COLUMNS: &[&str] = &[
        "Nome do Réu",
        "CNPJ do Réu",
        "UF do Precatório",
        "Município do Precatório",
        "Número dos Autos do Precatório",
        "Tipo do Precatório",
        "Tipo do Regime",
        "Ano orçamentário",
        "Natureza do Precatório",
        "Valor Deferido",
        "Data base do cálculo homologado",
        "Data de expedição do Precatório",
    ];

    /// Case-level columns shared by the party exports.
    pub const CASE_COLUMNS: &[&str] = &[
        "processo_numero_cnj",
        "processo_ano_inicio",
        "processo_data_inicio",
        "processo_estado_origem",
        "processo_unidade_origem_nome",
        "processo_unidade_origem_cidade",
        "processo_unidade_origem_estado",
        "processo_unidade_origem_tribunal_sigla",
        "processo_data_ultima_movimentacao",
        "processo_quantidade_movimentacoes",
        "processo_fontes_tribunais_estao_arquivadas",
        "processo_data_ultima_verificacao",
        "processo_tempo_desde_ultima_verificacao",
        "processo_relacionado_numero",
        "fonte_sigla",
        "fonte_data_inicio",
        "fonte_sistema",
        "fonte_quantidade_envolvidos",
        "capa_classe",
        "capa_assunto",
        "capa_valor_causa",
    ];

    pub const PARTY_COLUMNS: &[&str] = &[
        "envolvido_nome",
        "envolvido_tipo_normalizado",
        "envolvido_cpf",
        "envolvido_cnpj",
        "envolvido_tipo_pessoa",
    ];

    pub const ATTORNEY_COLUMNS: &[&str] = &[
        "advogado_nome",
        "advogado_tipo",
        "advogado_oab",
        "advogado_cpf",
        "advogado_cnpj",
        "advogado_tipo_pessoa",
    ];

    /// Build a schema of nullable `Utf8` fields in the given order.
    pub fn utf8_schema<'a>(columns: impl IntoIterator<Item = &'a str>) -> Schema {
        Schema::new(
            columns
                .into_iter()
                .map(|name| Field::new(name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        )
    }

    /// Creditor sheet of the creditor list.
    pub fn creditors_schema() -> Schema {
        utf8_schema(CREDITOR_COLUMNS.iter().copied())
    }

    /// Attorney sheet of the creditor list.
    pub fn creditor_attorneys_schema() -> Schema {
        utf8_schema(
            CREDITOR_ATTORNEY_PREFIX
                .iter()
                .chain(CREDITOR_COLUMNS)
                .copied(),
        )
    }

    /// Creditor sheet of the precatório report.
    pub fn precatorios_schema() -> Schema {
        utf8_schema(
            PRECATORIO_CREDITOR_COLUMNS
                .iter()
                .chain(PRECATORIO_COLUMNS)
                .copied(),
        )
    }

    /// Attorney sheet of the precatório report; no creditor columns.
    pub fn precatorio_attorneys_schema() -> Schema {
        utf8_schema(
            CREDITOR_ATTORNEY_PREFIX
                .iter()
                .chain(PRECATORIO_COLUMNS)
                .copied(),
        )
    }

    /// Claimants sheet: case number, party columns, then the remaining case columns.
    pub fn claimants_schema() -> Schema {
        utf8_schema(
            CASE_COLUMNS[..1]
                .iter()
                .chain(PARTY_COLUMNS)
                .chain(&CASE_COLUMNS[1..])
                .copied(),
        )
    }

    /// Attorneys sheet: attorney columns, then all case columns.
    pub fn attorneys_schema() -> Schema {
        utf8_schema(ATTORNEY_COLUMNS.iter().chain(CASE_COLUMNS).copied())
    }
}
