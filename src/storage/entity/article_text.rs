use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 按 URL 缓存的文章正文摘要；fetch_error 非空表示该 URL 抓取失败过
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_texts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub article_url: String,
    #[sea_orm(nullable)]
    pub title: Option<String>,
    #[sea_orm(nullable)]
    pub snippet: Option<String>,
    pub last_fetched_at: i64,
    #[sea_orm(nullable)]
    pub fetch_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
