//! DuckDB storage for the case tree.

use std::collections::HashSet;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime};
use duckdb::{Connection, OptionalExt, params, params_from_iter};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::entity::*;
use crate::{CaseSession, CaseStore, StoreError};

/// Tables in parent-before-child order.
pub const TABLES: &[&str] = &[
    "processos",
    "processos_relacionados",
    "fontes",
    "fontes_capas",
    "capa_valores_causa",
    "capa_informacoes_complementares",
    "audiencias",
    "fontes_envolvidos",
    "envolvidos_advogados",
    "advogados_oabs",
    "dados_precatorios",
];

/// Bound on `IN (...)` placeholders per existence query.
const LOOKUP_CHUNK: usize = 1000;

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS processos_id_seq;
CREATE TABLE IF NOT EXISTS processos (
    id BIGINT PRIMARY KEY DEFAULT nextval('processos_id_seq'),
    numero_cnj VARCHAR NOT NULL UNIQUE,
    titulo_polo_ativo VARCHAR,
    titulo_polo_passivo VARCHAR,
    ano_inicio BIGINT,
    data_inicio DATE,
    estado_origem VARCHAR,
    data_ultima_movimentacao DATE,
    quantidade_movimentacoes BIGINT,
    fontes_tribunais_estao_arquivadas BOOLEAN,
    tempo_desde_ultima_verificacao VARCHAR,
    data_ultima_verificacao TIMESTAMP,
    unidade_origem_nome VARCHAR,
    unidade_origem_cidade VARCHAR,
    unidade_origem_estado VARCHAR,
    unidade_origem_tribunal_sigla VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS processos_relacionados_id_seq;
CREATE TABLE IF NOT EXISTS processos_relacionados (
    id BIGINT PRIMARY KEY DEFAULT nextval('processos_relacionados_id_seq'),
    processo_id BIGINT NOT NULL REFERENCES processos(id),
    numero VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS fontes_id_seq;
CREATE TABLE IF NOT EXISTS fontes (
    id BIGINT PRIMARY KEY DEFAULT nextval('fontes_id_seq'),
    processo_id BIGINT NOT NULL REFERENCES processos(id),
    fonte_id BIGINT,
    processo_fonte_id BIGINT,
    descricao VARCHAR,
    nome VARCHAR,
    sigla VARCHAR,
    tipo VARCHAR,
    data_inicio DATE,
    data_ultima_movimentacao DATE,
    segredo_justica BOOLEAN,
    arquivado BOOLEAN,
    status_predito VARCHAR,
    grau BIGINT,
    grau_formatado VARCHAR,
    fisico BOOLEAN,
    sistema VARCHAR,
    url VARCHAR,
    quantidade_envolvidos BIGINT,
    data_ultima_verificacao TIMESTAMP,
    quantidade_movimentacoes BIGINT,
    outros_numeros VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS fontes_capas_id_seq;
CREATE TABLE IF NOT EXISTS fontes_capas (
    id BIGINT PRIMARY KEY DEFAULT nextval('fontes_capas_id_seq'),
    fonte_id BIGINT NOT NULL REFERENCES fontes(id),
    classe VARCHAR,
    assunto VARCHAR,
    assuntos_normalizados VARCHAR,
    assunto_principal_normalizado VARCHAR,
    area VARCHAR,
    orgao_julgador VARCHAR,
    situacao VARCHAR,
    data_distribuicao DATE,
    data_arquivamento DATE
);

CREATE SEQUENCE IF NOT EXISTS capa_valores_causa_id_seq;
CREATE TABLE IF NOT EXISTS capa_valores_causa (
    id BIGINT PRIMARY KEY DEFAULT nextval('capa_valores_causa_id_seq'),
    capa_id BIGINT NOT NULL REFERENCES fontes_capas(id),
    valor DECIMAL(18, 2),
    moeda VARCHAR,
    valor_formatado VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS capa_informacoes_complementares_id_seq;
CREATE TABLE IF NOT EXISTS capa_informacoes_complementares (
    id BIGINT PRIMARY KEY DEFAULT nextval('capa_informacoes_complementares_id_seq'),
    capa_id BIGINT NOT NULL REFERENCES fontes_capas(id),
    tipo VARCHAR,
    valor VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS audiencias_id_seq;
CREATE TABLE IF NOT EXISTS audiencias (
    id BIGINT PRIMARY KEY DEFAULT nextval('audiencias_id_seq'),
    fonte_id BIGINT NOT NULL REFERENCES fontes(id),
    data_audiencia DATE,
    descricao VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS fontes_envolvidos_id_seq;
CREATE TABLE IF NOT EXISTS fontes_envolvidos (
    id BIGINT PRIMARY KEY DEFAULT nextval('fontes_envolvidos_id_seq'),
    fonte_id BIGINT NOT NULL REFERENCES fontes(id),
    nome VARCHAR,
    quantidade_processos BIGINT,
    tipo_pessoa VARCHAR,
    prefixo VARCHAR,
    sufixo VARCHAR,
    tipo VARCHAR,
    tipo_normalizado VARCHAR,
    polo VARCHAR,
    cpf VARCHAR,
    cnpj VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS envolvidos_advogados_id_seq;
CREATE TABLE IF NOT EXISTS envolvidos_advogados (
    id BIGINT PRIMARY KEY DEFAULT nextval('envolvidos_advogados_id_seq'),
    envolvido_id BIGINT NOT NULL REFERENCES fontes_envolvidos(id),
    nome VARCHAR,
    quantidade_processos BIGINT,
    tipo_pessoa VARCHAR,
    prefixo VARCHAR,
    sufixo VARCHAR,
    tipo VARCHAR,
    tipo_normalizado VARCHAR,
    polo VARCHAR,
    cpf VARCHAR,
    cnpj VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS advogados_oabs_id_seq;
CREATE TABLE IF NOT EXISTS advogados_oabs (
    id BIGINT PRIMARY KEY DEFAULT nextval('advogados_oabs_id_seq'),
    advogado_id BIGINT NOT NULL REFERENCES envolvidos_advogados(id),
    uf VARCHAR,
    tipo VARCHAR,
    numero BIGINT
);

CREATE SEQUENCE IF NOT EXISTS dados_precatorios_id_seq;
CREATE TABLE IF NOT EXISTS dados_precatorios (
    id BIGINT PRIMARY KEY DEFAULT nextval('dados_precatorios_id_seq'),
    processo_id BIGINT NOT NULL UNIQUE REFERENCES processos(id),
    tipo_regime VARCHAR,
    ano_orcamentario BIGINT,
    natureza_precatorio VARCHAR,
    valor_deferido DECIMAL(18, 2),
    data_base_calculo DATE,
    data_expedicao DATE
);
";

/// DuckDB store for precatório case trees.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for a database file that survives across runs. Both create the schema if
/// it is missing.
pub struct DuckStore {
    pub(crate) conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened case database");
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // ── Counts ──

    /// Row count for every table, parents first.
    pub fn table_counts(&self) -> Result<Vec<(&'static str, usize)>, StoreError> {
        TABLES
            .iter()
            .map(|table| Ok((*table, self.count_table(table)?)))
            .collect()
    }

    pub fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let mut stmt = self.conn.prepare(&sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    // ── Lookups ──

    /// Primary key of the case with this number.
    pub fn case_id(&self, numero_cnj: &str) -> Result<Option<i64>, StoreError> {
        find_case(&self.conn, numero_cnj)
    }

    /// The stored case row, its sources and its parties, as Arrow tables.
    pub fn case_overview(&self, numero_cnj: &str) -> Result<CaseOverview, StoreError> {
        if self.case_id(numero_cnj)?.is_none() {
            return Err(StoreError::NoResults);
        }
        let case = self.query_case_arrow("SELECT * FROM processos WHERE numero_cnj = ?", numero_cnj)?;
        let sources = self.query_case_arrow(
            "SELECT f.id, f.sigla, f.sistema, f.grau_formatado, c.classe, c.assunto,
                    v.valor, v.valor_formatado
             FROM fontes f
             JOIN processos p ON p.id = f.processo_id
             LEFT JOIN fontes_capas c ON c.fonte_id = f.id
             LEFT JOIN capa_valores_causa v ON v.capa_id = c.id
             WHERE p.numero_cnj = ?
             ORDER BY f.id",
            numero_cnj,
        )?;
        let parties = self.query_case_arrow(
            "SELECT e.fonte_id, e.polo, e.tipo_normalizado, e.nome, e.cpf, e.cnpj,
                    string_agg(a.nome, '; ' ORDER BY a.id) AS advogados
             FROM fontes_envolvidos e
             JOIN fontes f ON f.id = e.fonte_id
             JOIN processos p ON p.id = f.processo_id
             LEFT JOIN envolvidos_advogados a ON a.envolvido_id = e.id
             WHERE p.numero_cnj = ?
             GROUP BY e.id, e.fonte_id, e.polo, e.tipo_normalizado, e.nome, e.cpf, e.cnpj
             ORDER BY e.id",
            numero_cnj,
        )?;
        Ok(CaseOverview {
            case,
            sources,
            parties,
        })
    }

    fn query_case_arrow(&self, sql: &str, numero_cnj: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([numero_cnj])?.collect();
        Ok(batches)
    }

    // ── Escape hatch ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }

    /// Open a session on a cloned connection.
    pub fn duck_session(&self) -> Result<DuckSession, StoreError> {
        Ok(DuckSession {
            conn: self.conn.try_clone()?,
            in_tx: false,
        })
    }
}

/// Arrow views of one stored case for display.
pub struct CaseOverview {
    pub case: Vec<RecordBatch>,
    pub sources: Vec<RecordBatch>,
    pub parties: Vec<RecordBatch>,
}

impl CaseStore for DuckStore {
    type Session = DuckSession;

    fn session(&self) -> Result<DuckSession, StoreError> {
        self.duck_session()
    }

    fn existing_case_numbers(&self, numbers: &[String]) -> Result<HashSet<String>, StoreError> {
        let mut found = HashSet::new();
        for chunk in numbers.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT numero_cnj FROM processos WHERE numero_cnj IN ({placeholders})");
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?;
            for numero in rows {
                found.insert(numero?);
            }
        }
        debug!(requested = numbers.len(), found = found.len(), "checked stored case numbers");
        Ok(found)
    }
}

/// One connection with at most one open transaction.
///
/// An open transaction is rolled back when the session is dropped.
pub struct DuckSession {
    conn: Connection,
    in_tx: bool,
}

impl DuckSession {
    /// Whether this case already carries a details row.
    pub fn has_details(&mut self, processo_id: i64) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM dados_precatorios WHERE processo_id = ?",
                [processo_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl CaseSession for DuckSession {
    fn find_by_case_number(&mut self, numero_cnj: &str) -> Result<Option<i64>, StoreError> {
        find_case(&self.conn, numero_cnj)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        self.in_tx = true;
        Ok(())
    }

    fn insert_entity(&mut self, entity: NewEntity) -> Result<i64, StoreError> {
        let id = insert(&self.conn, &entity)?;
        Ok(id)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        // A failed COMMIT leaves no transaction open in DuckDB.
        self.in_tx = false;
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.in_tx {
            return Ok(());
        }
        self.in_tx = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for DuckSession {
    fn drop(&mut self) {
        if self.in_tx {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

fn find_case(conn: &Connection, numero_cnj: &str) -> Result<Option<i64>, StoreError> {
    let id = conn
        .query_row(
            "SELECT id FROM processos WHERE numero_cnj = ?",
            [numero_cnj],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn date_text(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d").to_string())
}

fn timestamp_text(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(|t| t.format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

fn decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

// ── Inserts ──

fn insert(conn: &Connection, entity: &NewEntity) -> Result<i64, duckdb::Error> {
    match entity {
        NewEntity::Case(c) => conn.query_row(
            "INSERT INTO processos (
                numero_cnj, titulo_polo_ativo, titulo_polo_passivo, ano_inicio, data_inicio,
                estado_origem, data_ultima_movimentacao, quantidade_movimentacoes,
                fontes_tribunais_estao_arquivadas, tempo_desde_ultima_verificacao,
                data_ultima_verificacao, unidade_origem_nome, unidade_origem_cidade,
                unidade_origem_estado, unidade_origem_tribunal_sigla
             ) VALUES (?, ?, ?, ?, CAST(? AS DATE), ?, CAST(? AS DATE), ?, ?, ?,
                       CAST(? AS TIMESTAMP), ?, ?, ?, ?)
             RETURNING id",
            params![
                c.numero_cnj,
                c.titulo_polo_ativo,
                c.titulo_polo_passivo,
                c.ano_inicio,
                date_text(c.data_inicio),
                c.estado_origem,
                date_text(c.data_ultima_movimentacao),
                c.quantidade_movimentacoes,
                c.fontes_tribunais_estao_arquivadas,
                c.tempo_desde_ultima_verificacao,
                timestamp_text(c.data_ultima_verificacao),
                c.unidade_origem_nome,
                c.unidade_origem_cidade,
                c.unidade_origem_estado,
                c.unidade_origem_tribunal_sigla,
            ],
            |row| row.get(0),
        ),
        NewEntity::RelatedCase(r) => conn.query_row(
            "INSERT INTO processos_relacionados (processo_id, numero) VALUES (?, ?) RETURNING id",
            params![r.processo_id, r.numero],
            |row| row.get(0),
        ),
        NewEntity::Source(f) => conn.query_row(
            "INSERT INTO fontes (
                processo_id, fonte_id, processo_fonte_id, descricao, nome, sigla, tipo,
                data_inicio, data_ultima_movimentacao, segredo_justica, arquivado,
                status_predito, grau, grau_formatado, fisico, sistema, url,
                quantidade_envolvidos, data_ultima_verificacao, quantidade_movimentacoes,
                outros_numeros
             ) VALUES (?, ?, ?, ?, ?, ?, ?, CAST(? AS DATE), CAST(? AS DATE), ?, ?, ?, ?, ?, ?,
                       ?, ?, ?, CAST(? AS TIMESTAMP), ?, ?)
             RETURNING id",
            params![
                f.processo_id,
                f.fonte_id,
                f.processo_fonte_id,
                f.descricao,
                f.nome,
                f.sigla,
                f.tipo,
                date_text(f.data_inicio),
                date_text(f.data_ultima_movimentacao),
                f.segredo_justica,
                f.arquivado,
                f.status_predito,
                f.grau,
                f.grau_formatado,
                f.fisico,
                f.sistema,
                f.url,
                f.quantidade_envolvidos,
                timestamp_text(f.data_ultima_verificacao),
                f.quantidade_movimentacoes,
                f.outros_numeros,
            ],
            |row| row.get(0),
        ),
        NewEntity::CoverSheet(c) => conn.query_row(
            "INSERT INTO fontes_capas (
                fonte_id, classe, assunto, assuntos_normalizados, assunto_principal_normalizado,
                area, orgao_julgador, situacao, data_distribuicao, data_arquivamento
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS DATE), CAST(? AS DATE))
             RETURNING id",
            params![
                c.fonte_id,
                c.classe,
                c.assunto,
                c.assuntos_normalizados,
                c.assunto_principal_normalizado,
                c.area,
                c.orgao_julgador,
                c.situacao,
                date_text(c.data_distribuicao),
                date_text(c.data_arquivamento),
            ],
            |row| row.get(0),
        ),
        NewEntity::ClaimValue(v) => conn.query_row(
            "INSERT INTO capa_valores_causa (capa_id, valor, moeda, valor_formatado)
             VALUES (?, CAST(? AS DECIMAL(18, 2)), ?, ?)
             RETURNING id",
            params![v.capa_id, decimal_text(v.valor), v.moeda, v.valor_formatado],
            |row| row.get(0),
        ),
        NewEntity::SupplementaryInfo(i) => conn.query_row(
            "INSERT INTO capa_informacoes_complementares (capa_id, tipo, valor)
             VALUES (?, ?, ?)
             RETURNING id",
            params![i.capa_id, i.tipo, i.valor],
            |row| row.get(0),
        ),
        NewEntity::Hearing(h) => conn.query_row(
            "INSERT INTO audiencias (fonte_id, data_audiencia, descricao)
             VALUES (?, CAST(? AS DATE), ?)
             RETURNING id",
            params![h.fonte_id, date_text(h.data_audiencia), h.descricao],
            |row| row.get(0),
        ),
        NewEntity::Party(p) => insert_person(conn, "fontes_envolvidos", "fonte_id", p.fonte_id, &p.person),
        NewEntity::Attorney(a) => insert_person(
            conn,
            "envolvidos_advogados",
            "envolvido_id",
            a.envolvido_id,
            &a.person,
        ),
        NewEntity::BarRegistration(o) => conn.query_row(
            "INSERT INTO advogados_oabs (advogado_id, uf, tipo, numero)
             VALUES (?, ?, ?, ?)
             RETURNING id",
            params![o.advogado_id, o.uf, o.tipo, o.numero],
            |row| row.get(0),
        ),
        NewEntity::PrecatorioDetails(d) => conn.query_row(
            "INSERT INTO dados_precatorios (
                processo_id, tipo_regime, ano_orcamentario, natureza_precatorio,
                valor_deferido, data_base_calculo, data_expedicao
             ) VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(18, 2)), CAST(? AS DATE), CAST(? AS DATE))
             RETURNING id",
            params![
                d.processo_id,
                d.tipo_regime,
                d.ano_orcamentario,
                d.natureza_precatorio,
                decimal_text(d.valor_deferido),
                date_text(d.data_base_calculo),
                date_text(d.data_expedicao),
            ],
            |row| row.get(0),
        ),
    }
}

fn insert_person(
    conn: &Connection,
    table: &str,
    parent_column: &str,
    parent_id: i64,
    p: &PersonFields,
) -> Result<i64, duckdb::Error> {
    let sql = format!(
        "INSERT INTO {table} (
            {parent_column}, nome, quantidade_processos, tipo_pessoa, prefixo, sufixo,
            tipo, tipo_normalizado, polo, cpf, cnpj
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id"
    );
    conn.query_row(
        &sql,
        params![
            parent_id,
            p.nome,
            p.quantidade_processos,
            p.tipo_pessoa,
            p.prefixo,
            p.sufixo,
            p.tipo,
            p.tipo_normalizado,
            p.polo,
            p.cpf,
            p.cnpj,
        ],
        |row| row.get(0),
    )
}
