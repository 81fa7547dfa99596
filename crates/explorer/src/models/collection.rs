/// A user-defined bookshelf ("collection" in the device UI).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Collection {
    pub id: i64,
    pub name: String,
}
