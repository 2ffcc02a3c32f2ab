use std::collections::BTreeMap;

use actix_web::{HttpResponse, Responder, get};

/// Describes the search routes, keyed by what they are for.
#[get("/")]
pub async fn index() -> impl Responder {
    let routes = BTreeMap::from([
        (
            "To search for projects created by a particular user visit",
            "/search/user/{userID}",
        ),
        (
            "To search for projects that use specific hashtags visit",
            "/search/hashtags/{hashtag}",
        ),
        (
            "To do full-text fuzzy search for projects visit",
            "/search/fuzzy/{query}",
        ),
    ]);

    HttpResponse::Ok().json(routes)
}
