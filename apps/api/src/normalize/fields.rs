//! Ordered field-name fallback tables for the upstream's inconsistent
//! record shapes. Each table is tried in order; the first present field
//! wins. New upstream variants get a new table entry, not new control flow.

pub const ID_FIELDS: &[&str] = &["gtin", "codigo_barras", "id_produto", "id"];

pub const DESCRIPTION_FIELDS: &[&str] = &["desc_produto", "descricao", "produto", "nome_produto"];

pub const NAME_FIELDS: &[&str] = &[
    "nome_fantasia",
    "razao_social",
    "estabelecimento",
    "nome_estabelecimento",
];

pub const TAX_ID_FIELDS: &[&str] = &["cnpj", "nr_cnpj", "documento"];

pub const ADDRESS_FIELDS: &[&str] = &["endereco", "logradouro", "nm_logradouro"];

pub const PRICE_FIELDS: &[&str] = &["valor", "preco", "valor_unitario", "pmc"];

/// Single "lat,lon" string fields, tried before the split pairs.
pub const COMBINED_COORD_FIELDS: &[&str] = &["coordenadas", "posicao"];

pub const LAT_FIELDS: &[&str] = &["lat", "latitude", "nu_latitude"];

pub const LON_FIELDS: &[&str] = &["lon", "lng", "longitude", "nu_longitude"];

/// Spatial-hash fields, decoded as a last-resort coordinate source.
pub const GEOHASH_FIELDS: &[&str] = &["geohash", "local"];

pub const DISTANCE_FIELDS: &[&str] = &["distancia", "distancia_km", "dist"];

pub const TIMESTAMP_FIELDS: &[&str] = &[
    "datahora",
    "data_coleta",
    "dt_atualizacao",
    "atualizado_em",
];
