use serde::Serialize;

/// A named store and the provider resource backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub name: String,
    pub resource: String,
}
