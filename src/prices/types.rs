use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

/// Ответ на запрос одного символа или пачки
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TickerResponse {
    Many(Vec<TickerPrice>),
    One(TickerPrice),
}

impl TickerResponse {
    pub fn into_vec(self) -> Vec<TickerPrice> {
        match self {
            TickerResponse::Many(items) => items,
            TickerResponse::One(item) => vec![item],
        }
    }
}
