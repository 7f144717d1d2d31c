//! OpenAPI 3.0 description built from the route table.

use serde_json::{json, Map, Value};

pub struct RouteDoc {
    pub method: &'static str,
    /// Path under `/api/v1`, in router syntax (`/:id`).
    pub path: &'static str,
    pub tag: &'static str,
    pub summary: &'static str,
    pub auth: bool,
}

const fn route(method: &'static str, path: &'static str, tag: &'static str, summary: &'static str) -> RouteDoc {
    RouteDoc {
        method,
        path,
        tag,
        summary,
        auth: true,
    }
}

const fn public(method: &'static str, path: &'static str, tag: &'static str, summary: &'static str) -> RouteDoc {
    RouteDoc {
        method,
        path,
        tag,
        summary,
        auth: false,
    }
}

pub const ROUTES: &[RouteDoc] = &[
    public("get", "/health", "system", "Liveness check"),
    public("get", "/openapi.json", "system", "This document"),
    public("post", "/auth/login", "auth", "Exchange credentials for a bearer token"),
    route("get", "/auth/me", "auth", "Claims of the current token"),
    route("get", "/bet-types", "catalog", "Bet type catalog with default payouts"),
    route("get", "/permissions", "catalog", "Permission catalog"),
    route("get", "/lotteries", "lotteries", "List lotteries"),
    route("post", "/lotteries", "lotteries", "Create a lottery"),
    route("get", "/lotteries/:id", "lotteries", "Get a lottery"),
    route("put", "/lotteries/:id", "lotteries", "Update a lottery"),
    route("get", "/draws", "draws", "List draws"),
    route("post", "/draws", "draws", "Create a draw"),
    route("get", "/draws/:id", "draws", "Get a draw"),
    route("put", "/draws/:id", "draws", "Update a draw"),
    route("delete", "/draws/:id", "draws", "Deactivate a draw"),
    route("get", "/zones", "zones", "List zones (active only by default)"),
    route("post", "/zones", "zones", "Create a zone"),
    route("get", "/zones/:id", "zones", "Get a zone"),
    route("put", "/zones/:id", "zones", "Update a zone"),
    route("delete", "/zones/:id", "zones", "Deactivate a zone"),
    route("get", "/betting-pools", "betting-pools", "List betting pools"),
    route("post", "/betting-pools", "betting-pools", "Create a betting pool"),
    route("get", "/betting-pools/next-code", "betting-pools", "Suggest the next pool code"),
    route("get", "/betting-pools/:id", "betting-pools", "Get a betting pool"),
    route("put", "/betting-pools/:id", "betting-pools", "Update a betting pool"),
    route("delete", "/betting-pools/:id", "betting-pools", "Deactivate a betting pool"),
    route("get", "/betting-pools/:id/config", "betting-pools", "Get pool configuration"),
    route("put", "/betting-pools/:id/config", "betting-pools", "Replace pool configuration"),
    route("get", "/betting-pools/:id/prizes-commissions", "betting-pools", "List prize and commission settings"),
    route("put", "/betting-pools/:id/prizes-commissions", "betting-pools", "Upsert a prize and commission setting"),
    route("get", "/betting-pools/:id/draws", "betting-pools", "List per-draw pool settings"),
    route("put", "/betting-pools/:id/draws", "betting-pools", "Upsert a per-draw pool setting"),
    route("get", "/betting-pools/:id/draws/:draw_id/prize-config", "betting-pools", "List draw prize overrides"),
    route("post", "/betting-pools/:id/draws/:draw_id/prize-config", "betting-pools", "Save draw prize overrides"),
    route("delete", "/betting-pools/:id/draws/:draw_id/prize-config", "betting-pools", "Remove draw prize overrides"),
    route("get", "/betting-pools/:id/draws/:draw_id/prize-config/resolved", "betting-pools", "Payouts used for grading, with their source"),
    route("post", "/betting-pools/:id/draws/prize-config/batch", "betting-pools", "Save prize overrides for several draws"),
    route("get", "/contacts", "contacts", "List contacts"),
    route("post", "/contacts", "contacts", "Create a contact"),
    route("put", "/contacts/:id", "contacts", "Update a contact"),
    route("delete", "/contacts/:id", "contacts", "Delete a contact"),
    route("delete", "/contacts/by-betting-pool/:id", "contacts", "Delete every contact of a pool"),
    route("post", "/tickets", "tickets", "Sell a ticket"),
    route("patch", "/tickets", "tickets", "Filter tickets with totals"),
    route("get", "/tickets/by-barcode/:barcode", "tickets", "Find a ticket by barcode"),
    route("get", "/tickets/:id", "tickets", "Get a ticket"),
    route("patch", "/tickets/:id/cancel", "tickets", "Cancel a ticket"),
    route("patch", "/tickets/:id/pay", "tickets", "Pay a winning ticket"),
    route("post", "/plays/expand", "tickets", "Expand terminal play notation"),
    route("get", "/limits", "limits", "List limit rules"),
    route("post", "/limits", "limits", "Create a limit rule"),
    route("get", "/limits/consumption", "limits", "Per-number consumption of a draw"),
    route("get", "/limits/:id", "limits", "Get a limit rule"),
    route("put", "/limits/:id", "limits", "Update a limit rule"),
    route("delete", "/limits/:id", "limits", "Delete a limit rule"),
    route("patch", "/limits/:id/toggle", "limits", "Activate or deactivate a limit rule"),
    route("post", "/limit-reservations/reserve", "limits", "Hold limit capacity for a play"),
    route("delete", "/limit-reservations/:id", "limits", "Release a reservation"),
    route("get", "/automatic-limits", "limits", "Get automatic limit configuration"),
    route("put", "/automatic-limits", "limits", "Save automatic limit configuration"),
    route("post", "/automatic-limits/random-block/execute", "limits", "Block random pales"),
    route("post", "/automatic-limits/reset", "limits", "Reset automatic limits"),
    route("get", "/hot-numbers", "hot-numbers", "Active hot numbers"),
    route("put", "/hot-numbers", "hot-numbers", "Replace the hot number selection"),
    route("get", "/hot-numbers/limits", "hot-numbers", "List hot number limits"),
    route("post", "/hot-numbers/limits", "hot-numbers", "Create a hot number limit"),
    route("delete", "/hot-numbers/limits", "hot-numbers", "Deactivate every hot number limit"),
    route("get", "/hot-numbers/limits/:id", "hot-numbers", "Get a hot number limit"),
    route("put", "/hot-numbers/limits/:id", "hot-numbers", "Update a hot number limit"),
    route("delete", "/hot-numbers/limits/:id", "hot-numbers", "Deactivate a hot number limit"),
    route("get", "/results", "results", "List published results"),
    route("post", "/results", "results", "Publish a result and grade tickets"),
    route("get", "/transactions", "transactions", "List balance transactions"),
    route("post", "/transactions", "transactions", "Record a debit or credit"),
    route("post", "/reports/sales/by-betting-pool", "reports", "Sales by betting pool"),
    route("get", "/reports/sales/daily-summary", "reports", "Daily sales summary"),
    route("post", "/reports/sales/by-zone", "reports", "Sales by zone"),
    route("get", "/winning-plays", "reports", "Winning plays with sale and prize totals"),
    route("get", "/winning-plays/params", "reports", "Draws and zones for the winning plays filter"),
    route("get", "/users", "users", "List users"),
    route("post", "/users", "users", "Create a user"),
    route("get", "/users/:id", "users", "Get a user"),
    route("put", "/users/:id", "users", "Update a user"),
    route("delete", "/users/:id", "users", "Deactivate a user"),
    route("put", "/users/:id/permissions", "users", "Replace a user's permissions"),
    route("put", "/users/:id/password", "users", "Change a user's password"),
];

/// `/draws/:id` → (`/draws/{id}`, `["id"]`)
fn openapi_path(path: &str) -> (String, Vec<&str>) {
    let mut params = Vec::new();
    let segments: Vec<String> = path
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => {
                params.push(name);
                format!("{{{}}}", name)
            }
            None => segment.to_string(),
        })
        .collect();
    (segments.join("/"), params)
}

pub fn document() -> Value {
    let mut paths = Map::new();
    for doc in ROUTES {
        let (path, params) = openapi_path(doc.path);
        let mut operation = json!({
            "tags": [doc.tag],
            "summary": doc.summary,
            "responses": {
                "200": { "description": "Success" },
                "400": { "description": "Validation failed" },
            },
        });
        if doc.auth {
            operation["security"] = json!([{ "bearerAuth": [] }]);
            operation["responses"]["401"] = json!({ "description": "Missing or invalid token" });
        }
        if !params.is_empty() {
            operation["parameters"] = params
                .iter()
                .map(|name| {
                    json!({
                        "name": name,
                        "in": "path",
                        "required": true,
                        "schema": { "type": "string" },
                    })
                })
                .collect();
        }

        let item = paths.entry(format!("/api/v1{}", path)).or_insert_with(|| json!({}));
        item[doc.method] = operation;
    }

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Banca API",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": paths,
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" },
            },
        },
    })
}
