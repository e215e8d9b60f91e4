use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Serialize, Debug, PartialEq)]
pub struct Health {
    status: &'static str,
    fruit_classes: usize,
    leaf_classes: usize,
}

pub async fn healthcheck(State(state): State<SharedState>) -> Json<Health> {
    Json(Health {
        status: "Available",
        fruit_classes: state.fruit.labels().len(),
        leaf_classes: state.leaf.labels().len(),
    })
}
