use rocket::Route;

pub mod auth;
mod common;
mod public;
mod voting;

pub use public::QuestionPage;
pub use voting::Selection;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}
