mod auth;
mod catalog;
mod contacts;
mod hot_numbers;
mod limits;
mod lotteries;
mod pools;
mod reports;
mod results;
mod tickets;
mod transactions;
mod users;
mod zones;

use crate::error::ApiResult;
use crate::openapi;
use crate::state::AppState;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use banca_core::CoreError;
use serde_json::{json, Value};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Ids from a comma-separated query value. Blank input means no filter.
pub(crate) fn parse_ids(raw: Option<&str>, field: &str) -> ApiResult<Vec<i64>> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| CoreError::invalid(field, "must be a comma-separated list of ids").into())
}

async fn openapi_document() -> Json<Value> {
    Json(openapi::document())
}

/// Every `/api/v1` route. Keep in step with [`openapi::ROUTES`].
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/openapi.json", get(openapi_document))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/bet-types", get(catalog::bet_types))
        .route("/permissions", get(catalog::permissions))
        .route("/lotteries", get(lotteries::list_lotteries).post(lotteries::create_lottery))
        .route("/lotteries/:id", get(lotteries::get_lottery).put(lotteries::update_lottery))
        .route("/draws", get(lotteries::list_draws).post(lotteries::create_draw))
        .route(
            "/draws/:id",
            get(lotteries::get_draw)
                .put(lotteries::update_draw)
                .delete(lotteries::deactivate_draw),
        )
        .route("/zones", get(zones::list_zones).post(zones::create_zone))
        .route(
            "/zones/:id",
            get(zones::get_zone).put(zones::update_zone).delete(zones::deactivate_zone),
        )
        .route("/betting-pools", get(pools::list_pools).post(pools::create_pool))
        .route("/betting-pools/next-code", get(pools::next_code))
        .route(
            "/betting-pools/:id",
            get(pools::get_pool).put(pools::update_pool).delete(pools::deactivate_pool),
        )
        .route("/betting-pools/:id/config", get(pools::get_config).put(pools::update_config))
        .route(
            "/betting-pools/:id/prizes-commissions",
            get(pools::list_prizes).put(pools::upsert_prize),
        )
        .route("/betting-pools/:id/draws", get(pools::list_draws).put(pools::upsert_draw))
        .route(
            "/betting-pools/:id/draws/:draw_id/prize-config",
            get(pools::list_draw_prizes)
                .post(pools::save_draw_prizes)
                .delete(pools::delete_draw_prizes),
        )
        .route(
            "/betting-pools/:id/draws/:draw_id/prize-config/resolved",
            get(pools::resolved_draw_prizes),
        )
        .route(
            "/betting-pools/:id/draws/prize-config/batch",
            post(pools::batch_draw_prizes),
        )
        .route("/contacts", get(contacts::list_contacts).post(contacts::create_contact))
        .route(
            "/contacts/:id",
            put(contacts::update_contact).delete(contacts::delete_contact),
        )
        .route("/contacts/by-betting-pool/:id", delete(contacts::delete_pool_contacts))
        .route("/tickets", post(tickets::create_ticket).patch(tickets::filter_tickets))
        .route("/tickets/by-barcode/:barcode", get(tickets::get_by_barcode))
        .route("/tickets/:id", get(tickets::get_ticket))
        .route("/tickets/:id/cancel", patch(tickets::cancel_ticket))
        .route("/tickets/:id/pay", patch(tickets::pay_ticket))
        .route("/plays/expand", post(tickets::expand_plays))
        .route("/limits", get(limits::list_limits).post(limits::create_limit))
        .route("/limits/consumption", get(limits::consumption))
        .route(
            "/limits/:id",
            get(limits::get_limit).put(limits::update_limit).delete(limits::delete_limit),
        )
        .route("/limits/:id/toggle", patch(limits::toggle_limit))
        .route("/limit-reservations/reserve", post(limits::reserve))
        .route("/limit-reservations/:id", delete(limits::release))
        .route(
            "/automatic-limits",
            get(limits::get_automatic).put(limits::save_automatic),
        )
        .route("/automatic-limits/random-block/execute", post(limits::random_block))
        .route("/automatic-limits/reset", post(limits::reset_automatic))
        .route(
            "/hot-numbers",
            get(hot_numbers::get_hot_numbers).put(hot_numbers::update_hot_numbers),
        )
        .route(
            "/hot-numbers/limits",
            get(hot_numbers::list_limits)
                .post(hot_numbers::create_limit)
                .delete(hot_numbers::delete_all_limits),
        )
        .route(
            "/hot-numbers/limits/:id",
            get(hot_numbers::get_limit)
                .put(hot_numbers::update_limit)
                .delete(hot_numbers::delete_limit),
        )
        .route("/results", get(results::list_results).post(results::publish_result))
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::record_transaction),
        )
        .route("/reports/sales/by-betting-pool", post(reports::by_betting_pool))
        .route("/reports/sales/daily-summary", get(reports::daily_summary))
        .route("/reports/sales/by-zone", post(reports::by_zone))
        .route("/winning-plays", get(reports::winning_plays))
        .route("/winning-plays/params", get(reports::winning_play_params))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::deactivate_user),
        )
        .route("/users/:id/permissions", put(users::set_permissions))
        .route("/users/:id/password", put(users::change_password))
}
