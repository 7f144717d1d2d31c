use crate::extract::AuthUser;
use axum::Json;
use banca_core::catalog::PERMISSIONS;
use banca_core::BetType;
use serde_json::{json, Value};

pub async fn bet_types(_user: AuthUser) -> Json<Value> {
    let types: Vec<Value> = BetType::ALL
        .iter()
        .map(|bt| {
            json!({
                "code": bt.code(),
                "name": bt.display_name(),
                "digits": bt.digits(),
                "isBox": bt.is_box(),
                "defaultPayouts": bt.default_payouts(),
            })
        })
        .collect();
    Json(Value::Array(types))
}

pub async fn permissions(_user: AuthUser) -> Json<Value> {
    Json(json!(PERMISSIONS))
}
