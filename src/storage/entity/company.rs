use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 公司主数据（由外部 ticker 同步写入，核心流程只读）
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "companies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub cik: i64,
    pub title: String,
    #[sea_orm(nullable)]
    pub ticker: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
