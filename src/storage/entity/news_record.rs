use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "news_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub time_bucket: String, // YYYYMMDDHHMMSS
    #[sea_orm(primary_key, auto_increment = false)]
    pub record_id: String,
    #[sea_orm(nullable)]
    pub organizations: Option<String>, // ';' 分隔
    #[sea_orm(nullable)]
    pub themes: Option<String>,
    #[sea_orm(nullable)]
    pub document_url: Option<String>,
    #[sea_orm(nullable)]
    pub title: Option<String>,
    #[sea_orm(nullable)]
    pub snippet: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
